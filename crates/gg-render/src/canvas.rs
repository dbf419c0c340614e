use gg_core::frame::AsciiGrid;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;

/// Écrit directement une `AsciiGrid` dans un `ratatui::Buffer`.
///
/// Pas de widget Canvas ratatui : écriture directe, la grille est déjà à la
/// taille de la zone. Ce qui dépasse `area` est ignoré.
///
/// # Example
/// ```
/// use gg_core::frame::{AsciiCell, AsciiGrid};
/// use gg_render::canvas::render_grid;
/// use ratatui::buffer::Buffer;
/// use ratatui::layout::Rect;
///
/// let area = Rect::new(0, 0, 2, 1);
/// let mut buf = Buffer::empty(area);
/// let mut grid = AsciiGrid::new(2, 1);
/// grid.set(1, 0, AsciiCell { ch: '#', fg: (255, 255, 255), bg: (0, 0, 0) });
/// render_grid(&mut buf, area, &grid);
/// assert_eq!(buf[(1, 0)].symbol(), "#");
/// ```
pub fn render_grid(buf: &mut Buffer, area: Rect, grid: &AsciiGrid) {
    for cy in 0..grid.height.min(area.height) {
        for cx in 0..grid.width.min(area.width) {
            let cell = grid.get(cx, cy);
            if let Some(buf_cell) = buf.cell_mut((area.x + cx, area.y + cy)) {
                buf_cell
                    .set_char(cell.ch)
                    .set_fg(Color::Rgb(cell.fg.0, cell.fg.1, cell.fg.2))
                    .set_bg(Color::Rgb(cell.bg.0, cell.bg.1, cell.bg.2));
            }
        }
    }
}
