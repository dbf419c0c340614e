use gg_core::config::{AtlasConfig, EffectParameters};
use gg_core::frame::AsciiGrid;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::canvas;
use crate::fps::FpsCounter;

/// Largeur de la sidebar de paramètres.
pub const SIDEBAR_WIDTH: u16 = 24;

/// Application state mirrored for rendering decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderState {
    /// Normal running state.
    Running,
    /// Time frozen, last frame kept on screen.
    Paused,
    /// Help overlay visible.
    Help,
    /// Character set editor open.
    EditingCharset,
    /// Quitting (should not reach draw).
    Quitting,
}

/// Contenu de l'éditeur de jeu de caractères.
pub struct CharsetEditView<'a> {
    pub buffer: &'a str,
    /// Cursor position, in chars.
    pub cursor: usize,
}

/// Everything the sidebar shows.
pub struct Hud<'a> {
    pub params: &'a EffectParameters,
    pub atlas: &'a AtlasConfig,
    /// Lifecycle of the atlas ("Ready", "Building"...).
    pub atlas_status: &'a str,
    pub atlas_generation: u64,
    pub scene: &'a str,
    pub effect: &'a str,
    /// Last atlas error, shown until the next successful build.
    pub error: Option<String>,
}

/// Zone du canvas pour un écran de taille `area` (sans la sidebar).
#[must_use]
pub fn canvas_area(area: Rect) -> Rect {
    let [canvas, _] = Layout::horizontal([Constraint::Min(10), Constraint::Length(SIDEBAR_WIDTH)]).areas(area);
    canvas
}

/// Draw the full UI: canvas + sidebar, then overlays.
pub fn draw(
    frame: &mut Frame,
    grid: &AsciiGrid,
    hud: &Hud<'_>,
    fps_counter: &FpsCounter,
    state: RenderState,
    charset_edit: Option<&CharsetEditView<'_>>,
) {
    let area = frame.area();
    let [canvas_area, sidebar_area] =
        Layout::horizontal([Constraint::Min(10), Constraint::Length(SIDEBAR_WIDTH)]).areas(area);

    canvas::render_grid(frame.buffer_mut(), canvas_area, grid);
    draw_sidebar(frame, sidebar_area, hud, fps_counter, state);

    match state {
        RenderState::Help => draw_help_overlay(frame, area),
        RenderState::EditingCharset => {
            if let Some(edit) = charset_edit {
                draw_charset_editor(frame, area, edit);
            }
        }
        RenderState::Running | RenderState::Paused | RenderState::Quitting => {}
    }
}

fn on_off(v: bool) -> &'static str {
    if v { "ON" } else { "OFF" }
}

fn draw_sidebar(frame: &mut Frame, area: Rect, hud: &Hud<'_>, fps_counter: &FpsCounter, state: RenderState) {
    let state_str = match state {
        RenderState::Running => "▶ RUN",
        RenderState::Paused => "⏸ PAUSE",
        RenderState::Help => "? HELP",
        RenderState::EditingCharset => "✎ EDIT",
        RenderState::Quitting => "⏹ QUIT",
    };
    let p = hud.params;
    let a = hud.atlas;
    let section = |title: &'static str| Line::from(Span::styled(title, Style::default().fg(Color::Yellow)));

    let mut lines = vec![
        Line::from(Span::styled(state_str, Style::default().fg(Color::Green))),
        Line::from(""),
        section("─ Effet ───────"),
        Line::from(format!(" Gran: {:.0}px", p.granularity)),
        Line::from(format!(" Limit: {}", p.characters_limit)),
        Line::from(format!(" Fit: {}", on_off(p.fit))),
        Line::from(format!(" Fill: {}", on_off(p.fill_pixels))),
        Line::from(format!(" Grey: {}", on_off(p.greyscale))),
        Line::from(format!(" Invert: {}", on_off(p.invert))),
        Line::from(format!(" Matrix: {}", on_off(p.matrix))),
        Line::from(format!(" Color: {}", p.color)),
        Line::from(format!(" BG: {}", p.background)),
        Line::from(format!(" Time: {:.1}s{}", p.time, if p.animate_time { " ▶" } else { "" })),
        Line::from(""),
        section("─ Atlas ───────"),
        Line::from(format!(" Chars: \"{}\"", a.characters)),
        Line::from(format!(" Font: {}px", a.font_size)),
        Line::from(format!(" Grid: {0}x{0} / {1}px", a.grid_columns, a.texture_size)),
        Line::from(format!(" g{} {}", hud.atlas_generation, hud.atlas_status)),
    ];

    if let Some(err) = &hud.error {
        lines.push(Line::from(Span::styled(format!(" ⚠ {err}"), Style::default().fg(Color::Red))));
    }

    lines.push(Line::from(""));
    lines.push(section("─ Info ────────"));
    lines.push(Line::from(format!(" {} → {}", hud.scene, hud.effect)));
    lines.push(Line::from(format!(" {:.0} FPS", fps_counter.fps())));
    lines.push(Line::from(format!(" {:.1}ms", fps_counter.frame_time_ms)));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(" ? = help", Style::default().fg(Color::DarkGray))));

    let sidebar = Paragraph::new(lines).block(Block::default().borders(Borders::LEFT).title(" Params "));
    frame.render_widget(sidebar, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

/// Overlay listant toutes les touches.
fn draw_help_overlay(frame: &mut Frame, area: Rect) {
    let help_text = vec![
        Line::from(Span::styled(" glyphgrid : contrôles ", Style::default().fg(Color::Yellow))),
        Line::from(""),
        Line::from(" q/Esc    Quit"),
        Line::from(" Space    Pause"),
        Line::from(" g/G      Granularity ±"),
        Line::from(" l/L      Characters limit ±"),
        Line::from(" s/S      Font size ±"),
        Line::from(" f        Toggle fit"),
        Line::from(" p        Toggle fill pixels"),
        Line::from(" y        Toggle greyscale"),
        Line::from(" i        Toggle invert"),
        Line::from(" m        Toggle matrix"),
        Line::from(" t        Toggle animated time"),
        Line::from(" 1-4      Charset preset"),
        Line::from(" C        Edit characters"),
        Line::from(" ?        Toggle help"),
        Line::from(""),
        Line::from(Span::styled(" Press ? or Esc to close ", Style::default().fg(Color::DarkGray))),
    ];

    let help_area = centered(area, 38, help_text.len() as u16 + 2);
    let help = Paragraph::new(help_text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Help ")
            .style(Style::default().bg(Color::Black).fg(Color::White)),
    );
    frame.render_widget(Clear, help_area);
    frame.render_widget(help, help_area);
}

/// Champ d'édition du jeu de caractères, curseur en vidéo inverse.
fn draw_charset_editor(frame: &mut Frame, area: Rect, edit: &CharsetEditView<'_>) {
    let chars: Vec<char> = edit.buffer.chars().collect();
    let cursor = edit.cursor.min(chars.len());
    let before: String = chars[..cursor].iter().collect();
    let at: String = chars.get(cursor).map_or_else(|| " ".to_string(), ToString::to_string);
    let after: String = chars.get(cursor + 1..).map(|s| s.iter().collect()).unwrap_or_default();

    let lines = vec![
        Line::from(vec![
            Span::raw(" "),
            Span::raw(before),
            Span::styled(at, Style::default().add_modifier(Modifier::REVERSED)),
            Span::raw(after),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " Enter valider · Esc annuler · ←/→ Home/End ",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let width = (chars.len() as u16).saturating_add(6).max(48);
    let edit_area = centered(area, width, 5);
    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Characters ")
            .style(Style::default().bg(Color::Black).fg(Color::White)),
    );
    frame.render_widget(Clear, edit_area);
    frame.render_widget(widget, edit_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(ratatui::buffer::Cell::symbol)
            .collect()
    }

    #[test]
    fn sidebar_shows_live_parameters() {
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        let params = EffectParameters {
            granularity: 12.0,
            ..EffectParameters::default()
        };
        let atlas = AtlasConfig::default();
        let hud = Hud {
            params: &params,
            atlas: &atlas,
            atlas_status: "Ready",
            atlas_generation: 3,
            scene: "orbit",
            effect: "block-glyph",
            error: None,
        };
        let grid = AsciiGrid::new(56, 30);
        let fps = FpsCounter::new(10);
        terminal
            .draw(|f| draw(f, &grid, &hud, &fps, RenderState::Running, None))
            .unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("Gran: 12px"));
        assert!(text.contains("g3 Ready"));
    }

    #[test]
    fn charset_editor_overlay_shows_the_buffer() {
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        let params = EffectParameters::default();
        let atlas = AtlasConfig::default();
        let hud = Hud {
            params: &params,
            atlas: &atlas,
            atlas_status: "Ready",
            atlas_generation: 1,
            scene: "orbit",
            effect: "block-glyph",
            error: None,
        };
        let grid = AsciiGrid::new(56, 30);
        let fps = FpsCounter::new(10);
        let edit = CharsetEditView {
            buffer: "@#*.",
            cursor: 2,
        };
        terminal
            .draw(|f| draw(f, &grid, &hud, &fps, RenderState::EditingCharset, Some(&edit)))
            .unwrap();
        assert!(buffer_text(&terminal).contains("@#*."));
    }

    #[test]
    fn canvas_leaves_room_for_the_sidebar() {
        let area = canvas_area(Rect::new(0, 0, 100, 40));
        assert_eq!(area.width, 100 - SIDEBAR_WIDTH);
        assert_eq!(area.height, 40);
    }
}
