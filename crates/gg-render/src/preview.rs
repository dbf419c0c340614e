use gg_core::frame::{AsciiCell, AsciiGrid, FrameBuffer};

/// Réduit une frame en grille terminal, mode demi-bloc (`▄`).
///
/// Chaque cellule couvre 2 pixels verticaux : le pixel du haut va au fond,
/// celui du bas au premier plan. La frame est échantillonnée au plus proche,
/// sans filtrage, pour garder les glyphes de l'effet lisibles.
///
/// # Example
/// ```
/// use gg_core::frame::{AsciiGrid, FrameBuffer};
/// use gg_core::Rgba;
/// use gg_render::preview::downsample_halfblock;
///
/// let mut frame = FrameBuffer::new(4, 4);
/// frame.fill(Rgba::new(10, 20, 30, 255));
/// let mut grid = AsciiGrid::new(4, 2);
/// downsample_halfblock(&frame, &mut grid);
/// assert_eq!(grid.get(0, 0).ch, '▄');
/// assert_eq!(grid.get(3, 1).fg, (10, 20, 30));
/// ```
pub fn downsample_halfblock(frame: &FrameBuffer, grid: &mut AsciiGrid) {
    if frame.width == 0 || frame.height == 0 {
        grid.cells.fill(AsciiCell::default());
        return;
    }
    let pixel_w = u32::from(grid.width).max(1);
    let pixel_h = (u32::from(grid.height) * 2).max(1);
    let max_x = frame.width - 1;
    let max_y = frame.height - 1;

    for cy in 0..grid.height {
        let top = (u32::from(cy) * 2 * frame.height / pixel_h).min(max_y);
        let bottom = ((u32::from(cy) * 2 + 1) * frame.height / pixel_h).min(max_y);
        for cx in 0..grid.width {
            let px = (u32::from(cx) * frame.width / pixel_w).min(max_x);
            let (tr, tg, tb, _) = frame.pixel(px, top);
            let (br, bg, bb, _) = frame.pixel(px, bottom);
            grid.set(
                cx,
                cy,
                AsciiCell {
                    ch: '▄',
                    fg: (br, bg, bb),
                    bg: (tr, tg, tb),
                },
            );
        }
    }
}

/// Taille de frame à rendre pour remplir `columns × rows` cellules en demi-bloc,
/// mise à l'échelle par `scale` (≥ 1) pour que les blocs de glyphes restent
/// plus grands qu'une cellule.
#[must_use]
pub fn frame_size_for(columns: u16, rows: u16, scale: u32) -> (u32, u32) {
    let scale = scale.max(1);
    (
        u32::from(columns.max(1)) * scale,
        u32::from(rows.max(1)) * 2 * scale,
    )
}
