use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use gg_core::charset::PRESETS;
use gg_core::config::FONT_SIZE_RANGE;
use gg_core::frame::AsciiGrid;
use gg_core::state::EffectUpdate;
use gg_core::traits::{ImageEffect, Scene};
use gg_render::fps::FpsCounter;
use gg_render::preview::{downsample_halfblock, frame_size_for};
use gg_render::ui::{self, CharsetEditView, Hud, RenderState};
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;

use crate::session::Session;

/// Pixels de surface par colonne terminal (×2 en hauteur, demi-blocs).
const PREVIEW_SCALE: u32 = 4;

/// État de l'application.
///
/// # Example
/// ```
/// use gg_app::app::AppState;
/// let state = AppState::Running;
/// assert!(matches!(state, AppState::Running));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppState {
    /// Rendu normal.
    Running,
    /// Temps gelé, dernière frame affichée.
    Paused,
    /// Overlay d'aide (touche ?).
    Help,
    /// Éditeur de jeu de caractères (touche C).
    CharsetEdit,
    /// Fermeture au prochain tour de boucle.
    Quitting,
}

/// Interactive editor: drives a [`Session`] and previews its output.
pub struct App<S: Scene, E: ImageEffect> {
    /// Current application state.
    pub state: AppState,
    session: Session<S, E>,
    /// Grille terminal pré-allouée, réutilisée chaque frame.
    grid: AsciiGrid,
    fps_counter: FpsCounter,
    terminal_size: (u16, u16),
    /// Buffer local pour l'édition du jeu de caractères en live.
    charset_edit_buf: String,
    charset_edit_cursor: usize,
    /// Jeu de caractères à restaurer si l'édition est annulée.
    charset_before_edit: String,
}

impl<S: Scene, E: ImageEffect> App<S, E> {
    #[must_use]
    pub fn new(session: Session<S, E>) -> Self {
        Self {
            state: AppState::Running,
            session,
            grid: AsciiGrid::new(0, 0),
            fps_counter: FpsCounter::new(30),
            terminal_size: (0, 0),
            charset_edit_buf: String::new(),
            charset_edit_cursor: 0,
            charset_before_edit: String::new(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session<S, E> {
        &self.session
    }

    /// Consume the app and hand the session back (disposal, final export).
    #[must_use]
    pub fn into_session(self) -> Session<S, E> {
        self.session
    }

    /// Boucle principale : événements, tick de session, dessin.
    ///
    /// # Errors
    /// Returns an error on terminal I/O failure.
    pub fn run(&mut self, mut terminal: DefaultTerminal) -> Result<()> {
        let mut last_frame = Instant::now();

        loop {
            if self.state == AppState::Quitting {
                break;
            }

            let fps = self.session.render_settings().target_fps.max(1);
            let frame_duration = Duration::from_secs_f64(1.0 / f64::from(fps));
            let now = Instant::now();
            let elapsed = now - last_frame;

            if elapsed < frame_duration {
                // Dormir le temps restant, mais rester réactif aux événements
                if event::poll(frame_duration.saturating_sub(elapsed))? {
                    self.handle_event(&event::read()?);
                }
                continue;
            }
            last_frame = now;

            while event::poll(Duration::ZERO)? {
                self.handle_event(&event::read()?);
            }

            let size = crossterm::terminal::size()?;
            self.check_resize(size);

            self.session.tick();
            downsample_halfblock(self.session.output(), &mut self.grid);
            self.fps_counter.tick();

            self.draw(&mut terminal)?;
        }

        Ok(())
    }

    fn draw(&self, terminal: &mut DefaultTerminal) -> Result<()> {
        let snap = self.session.state().snapshot();
        let editor = self.session.editor();
        let status = format!("{:?}", editor.lifecycle());
        let hud = Hud {
            params: &snap.params,
            atlas: editor.config(),
            atlas_status: &status,
            atlas_generation: editor.published_generation(),
            scene: self.session.renderer().scene().name(),
            effect: self.session.stage().effect().name(),
            error: editor.last_error().map(ToString::to_string),
        };
        let state = self.render_state();
        let charset_edit = (state == RenderState::EditingCharset).then(|| CharsetEditView {
            buffer: &self.charset_edit_buf,
            cursor: self.charset_edit_cursor,
        });

        terminal.draw(|frame| {
            ui::draw(frame, &self.grid, &hud, &self.fps_counter, state, charset_edit.as_ref());
        })?;
        Ok(())
    }

    /// Réalloue la grille et la surface quand le terminal change de taille.
    fn check_resize(&mut self, size: (u16, u16)) {
        if size == self.terminal_size {
            return;
        }
        self.terminal_size = size;
        let canvas = ui::canvas_area(Rect::new(0, 0, size.0, size.1));
        self.grid = AsciiGrid::new(canvas.width, canvas.height);
        let (w, h) = frame_size_for(canvas.width, canvas.height, PREVIEW_SCALE);
        self.session.set_surface_size(w, h);
        log::debug!("Terminal {}×{} → surface {w}×{h}", size.0, size.1);
    }

    fn render_state(&self) -> RenderState {
        match self.state {
            AppState::Running => RenderState::Running,
            AppState::Paused => RenderState::Paused,
            AppState::Help => RenderState::Help,
            AppState::CharsetEdit => RenderState::EditingCharset,
            AppState::Quitting => RenderState::Quitting,
        }
    }

    /// Dispatch a terminal event to the focused handler.
    pub fn handle_event(&mut self, event: &Event) {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = *event
        else {
            return;
        };

        if modifiers.contains(KeyModifiers::CONTROL) {
            if code == KeyCode::Char('c') {
                self.state = AppState::Quitting;
            }
            return;
        }

        match self.state {
            AppState::CharsetEdit => self.handle_charset_edit_key(code),
            AppState::Help => {
                if matches!(code, KeyCode::Char('?' | 'q') | KeyCode::Esc) {
                    self.state = self.resume_state();
                }
            }
            AppState::Running | AppState::Paused => match code {
                KeyCode::Char('q') | KeyCode::Esc => self.state = AppState::Quitting,
                KeyCode::Char('?') => self.state = AppState::Help,
                KeyCode::Char(' ') => {
                    let paused = !self.session.paused();
                    self.session.set_paused(paused);
                    self.state = self.resume_state();
                }
                KeyCode::Char('C') => self.open_charset_editor(),
                KeyCode::Char(c @ '1'..='9') => {
                    let index = c as usize - '1' as usize;
                    if let Some((name, chars)) = PRESETS.get(index) {
                        log::info!("Preset de caractères : {name}");
                        self.set_characters(chars);
                    }
                }
                KeyCode::Char(c) => self.handle_param_key(c),
                _ => {}
            },
            AppState::Quitting => {}
        }
    }

    fn resume_state(&self) -> AppState {
        if self.session.paused() {
            AppState::Paused
        } else {
            AppState::Running
        }
    }

    /// Touches de paramètres : effet via l'état partagé, atlas via l'éditeur.
    fn handle_param_key(&mut self, key: char) {
        let params = self.session.state().snapshot().params.clone();
        let update = match key {
            'g' => EffectUpdate::new().granularity(params.granularity - 1.0),
            'G' => EffectUpdate::new().granularity(params.granularity + 1.0),
            'f' => EffectUpdate::new().fit(!params.fit),
            'p' => EffectUpdate::new().fill_pixels(!params.fill_pixels),
            'y' => EffectUpdate::new().greyscale(!params.greyscale),
            'm' => EffectUpdate::new().matrix(!params.matrix),
            't' => EffectUpdate::new().animate_time(!params.animate_time),
            'l' | 'L' | 's' | 'S' | 'i' => {
                self.handle_atlas_key(key);
                return;
            }
            _ => return,
        };
        self.session.state().update(update);
    }

    fn handle_atlas_key(&mut self, key: char) {
        let config = self.session.editor().config().clone();
        let cells = config.grid_columns * config.grid_columns;
        let editor = self.session.editor_mut();
        let result = match key {
            'l' => editor.set_characters_limit(config.characters_limit.saturating_sub(1).max(1)),
            'L' => editor.set_characters_limit((config.characters_limit + 1).min(cells)),
            's' => editor.set_font_size(config.font_size.saturating_sub(4).max(FONT_SIZE_RANGE.0)),
            'S' => editor.set_font_size((config.font_size + 4).min(FONT_SIZE_RANGE.1)),
            'i' => editor.set_invert(!config.invert),
            _ => Ok(()),
        };
        if let Err(e) = result {
            log::warn!("Édition d'atlas refusée : {e}");
        }
    }

    fn set_characters(&mut self, text: &str) {
        if let Err(e) = self.session.editor_mut().set_characters(text) {
            log::warn!("Jeu de caractères refusé : {e}");
        }
    }

    fn open_charset_editor(&mut self) {
        self.charset_before_edit = self.session.editor().config().characters.to_string();
        self.charset_edit_buf.clone_from(&self.charset_before_edit);
        self.charset_edit_cursor = self.charset_edit_buf.chars().count();
        self.state = AppState::CharsetEdit;
    }

    /// Éditeur de jeu de caractères : chaque frappe reconstruit l'atlas.
    #[allow(clippy::assigning_clones)]
    fn handle_charset_edit_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                let original = std::mem::take(&mut self.charset_before_edit);
                self.set_characters(&original);
                self.state = self.resume_state();
            }
            KeyCode::Enter => {
                if !self.charset_edit_buf.is_empty() {
                    self.state = self.resume_state();
                }
            }
            KeyCode::Backspace => {
                if self.charset_edit_cursor > 0 {
                    let mut chars: Vec<char> = self.charset_edit_buf.chars().collect();
                    chars.remove(self.charset_edit_cursor - 1);
                    self.charset_edit_buf = chars.into_iter().collect();
                    self.charset_edit_cursor -= 1;
                    self.apply_charset_preview();
                }
            }
            KeyCode::Delete => {
                let mut chars: Vec<char> = self.charset_edit_buf.chars().collect();
                if self.charset_edit_cursor < chars.len() {
                    chars.remove(self.charset_edit_cursor);
                    self.charset_edit_buf = chars.into_iter().collect();
                    self.apply_charset_preview();
                }
            }
            KeyCode::Left => {
                self.charset_edit_cursor = self.charset_edit_cursor.saturating_sub(1);
            }
            KeyCode::Right => {
                if self.charset_edit_cursor < self.charset_edit_buf.chars().count() {
                    self.charset_edit_cursor += 1;
                }
            }
            KeyCode::Home => self.charset_edit_cursor = 0,
            KeyCode::End => self.charset_edit_cursor = self.charset_edit_buf.chars().count(),
            KeyCode::Char(ch) => {
                let mut chars: Vec<char> = self.charset_edit_buf.chars().collect();
                chars.insert(self.charset_edit_cursor, ch);
                self.charset_edit_buf = chars.into_iter().collect();
                self.charset_edit_cursor += 1;
                self.apply_charset_preview();
            }
            _ => {}
        }
    }

    fn apply_charset_preview(&mut self) {
        // Un jeu vide est refusé par l'éditeur : on garde l'atlas courant.
        if !self.charset_edit_buf.is_empty() {
            let buf = self.charset_edit_buf.clone();
            self.set_characters(&buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use gg_atlas::{GlyphAtlasBuilder, GlyphBitmap, GlyphRasterizer};
    use gg_core::config::AppConfig;
    use gg_core::frame::FrameBuffer;
    use gg_core::traits::EffectUniforms;
    use gg_core::{CharacterSet, Rgba};

    struct Dot;

    impl GlyphRasterizer for Dot {
        fn rasterize(&self, _ch: char, _font_size: f32) -> Option<GlyphBitmap> {
            Some(GlyphBitmap {
                width: 1,
                height: 1,
                left: 0,
                top: 0,
                coverage: vec![255],
            })
        }

        fn name(&self) -> &'static str {
            "dot"
        }
    }

    struct Black;

    impl Scene for Black {
        fn render(&mut self, _time: f32, target: &mut FrameBuffer) {
            target.fill(Rgba::BLACK);
        }

        fn name(&self) -> &'static str {
            "black"
        }
    }

    struct Passthrough;

    impl ImageEffect for Passthrough {
        fn apply(&mut self, input: &FrameBuffer, _u: &EffectUniforms, output: &mut FrameBuffer) {
            output.data.copy_from_slice(&input.data);
        }

        fn name(&self) -> &'static str {
            "passthrough"
        }
    }

    fn app() -> App<Black, Passthrough> {
        let mut config = AppConfig::default();
        config.atlas.characters = CharacterSet::new(" .#").unwrap();
        config.atlas.grid_columns = 4;
        config.atlas.texture_size = 64;
        config.effect.characters_limit = 4;
        let session = Session::new(
            config,
            Black,
            Passthrough,
            GlyphAtlasBuilder::with_rasterizer(Arc::new(Dot)),
            false,
        )
        .unwrap();
        App::new(session)
    }

    fn press(app: &mut App<Black, Passthrough>, code: KeyCode) {
        app.handle_event(&Event::Key(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    fn published_characters(app: &App<Black, Passthrough>) -> String {
        app.session()
            .state()
            .snapshot()
            .atlas
            .as_ref()
            .map(|a| a.characters().to_string())
            .unwrap_or_default()
    }

    #[test]
    fn granularity_keys_update_only_granularity() {
        let mut app = app();
        let before = app.session().state().snapshot().params.clone();
        press(&mut app, KeyCode::Char('G'));
        press(&mut app, KeyCode::Char('G'));
        let after = app.session().state().snapshot().params.clone();
        assert_eq!(after.granularity, before.granularity + 2.0);
        assert_eq!(after.color, before.color);
        assert_eq!(after.fit, before.fit);
    }

    #[test]
    fn toggles_flip_effect_flags() {
        let mut app = app();
        press(&mut app, KeyCode::Char('m'));
        press(&mut app, KeyCode::Char('y'));
        press(&mut app, KeyCode::Char('f'));
        let p = app.session().state().snapshot().params.clone();
        assert!(p.matrix);
        assert!(p.greyscale);
        assert!(!p.fit);
    }

    #[test]
    fn limit_and_invert_go_through_the_atlas() {
        let mut app = app();
        press(&mut app, KeyCode::Char('l'));
        press(&mut app, KeyCode::Char('i'));
        let snap = app.session().state().snapshot();
        assert_eq!(snap.params.characters_limit, 3);
        assert!(snap.params.invert);
        assert_eq!(app.session().editor().published_generation(), 3);
    }

    #[test]
    fn charset_editor_previews_each_keystroke() {
        let mut app = app();
        press(&mut app, KeyCode::Char('C'));
        assert_eq!(app.state, AppState::CharsetEdit);

        press(&mut app, KeyCode::Backspace);
        assert_eq!(published_characters(&app), " .");
        press(&mut app, KeyCode::Home);
        press(&mut app, KeyCode::Char('@'));
        assert_eq!(published_characters(&app), "@ .");

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state, AppState::Running);
        assert_eq!(app.session().editor().config().characters.to_string(), "@ .");
    }

    #[test]
    fn cancelled_edit_restores_the_characters() {
        let mut app = app();
        press(&mut app, KeyCode::Char('C'));
        press(&mut app, KeyCode::Char('x'));
        assert_eq!(published_characters(&app), " .#x");
        press(&mut app, KeyCode::Esc);
        assert_eq!(published_characters(&app), " .#");
        assert_eq!(app.state, AppState::Running);
    }

    #[test]
    fn emptied_buffer_keeps_the_last_atlas() {
        let mut app = app();
        press(&mut app, KeyCode::Char('C'));
        for _ in 0..3 {
            press(&mut app, KeyCode::Backspace);
        }
        assert_eq!(published_characters(&app), " ");
        // Enter sur buffer vide : l'éditeur reste ouvert.
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state, AppState::CharsetEdit);
    }

    #[test]
    fn presets_replace_the_characters() {
        let mut app = app();
        press(&mut app, KeyCode::Char('2'));
        assert_eq!(app.session().editor().config().characters.to_string(), PRESETS[1].1);
    }

    #[test]
    fn pause_help_and_quit() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' '));
        assert_eq!(app.state, AppState::Paused);
        assert!(app.session().paused());
        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.state, AppState::Help);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.state, AppState::Paused);
        press(&mut app, KeyCode::Char('q'));
        assert_eq!(app.state, AppState::Quitting);
    }

    #[test]
    fn resize_pins_the_surface_to_the_canvas() {
        let mut app = app();
        app.check_resize((80, 24));
        let canvas_w = 80 - ui::SIDEBAR_WIDTH;
        assert_eq!(app.grid.width, canvas_w);
        app.session.tick();
        assert_eq!(app.session().output().width, u32::from(canvas_w) * PREVIEW_SCALE);
        assert_eq!(app.session().output().height, 24 * 2 * PREVIEW_SCALE);
    }
}
