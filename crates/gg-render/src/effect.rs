use gg_core::color::{Rgba, blend, luminance};
use gg_core::frame::FrameBuffer;
use gg_core::traits::{EffectUniforms, ImageEffect};
use rayon::prelude::*;

/// Vert du mode matrix.
pub const MATRIX_GREEN: Rgba = Rgba::new(0, 255, 70, 255);

/// Index de glyphe pour une luminosité `brightness` dans [0, 1].
///
/// `min(floor(b * limit), limit - 1)`, renversé (`limit - 1 - i`) si `invert`.
///
/// # Example
/// ```
/// use gg_render::effect::glyph_index;
/// assert_eq!(glyph_index(0.0, 16, false), 0);
/// assert_eq!(glyph_index(1.0, 16, false), 15);
/// assert_eq!(glyph_index(1.0, 16, true), 0);
/// assert_eq!(glyph_index(0.5, 4, false), 2);
/// ```
#[inline]
#[must_use]
pub fn glyph_index(brightness: f32, limit: u32, invert: bool) -> u32 {
    let limit = limit.max(1);
    let b = if brightness.is_finite() { brightness.clamp(0.0, 1.0) } else { 0.0 };
    let i = ((b * limit as f32) as u32).min(limit - 1);
    if invert { limit - 1 - i } else { i }
}

/// Découpage de l'image en blocs.
///
/// `fit` : blocs carrés de `granularity` px, grille centrée (les blocs de
/// bord débordent). Sinon : nombre de blocs arrondi, étirés pour couvrir
/// exactement l'image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockGrid {
    pub columns: u32,
    pub rows: u32,
    block_w: f32,
    block_h: f32,
    offset_x: f32,
    offset_y: f32,
}

impl BlockGrid {
    #[must_use]
    pub fn new(width: u32, height: u32, granularity: f32, fit: bool) -> Self {
        let g = if granularity.is_finite() { granularity.max(1.0) } else { 1.0 };
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        if fit {
            let columns = (w / g).ceil().max(1.0) as u32;
            let rows = (h / g).ceil().max(1.0) as u32;
            Self {
                columns,
                rows,
                block_w: g,
                block_h: g,
                offset_x: (columns as f32 * g - w) / 2.0,
                offset_y: (rows as f32 * g - h) / 2.0,
            }
        } else {
            let columns = (w / g).round().max(1.0) as u32;
            let rows = (h / g).round().max(1.0) as u32;
            Self {
                columns,
                rows,
                block_w: w / columns as f32,
                block_h: h / rows as f32,
                offset_x: 0.0,
                offset_y: 0.0,
            }
        }
    }

    /// Block (column, row) of pixel (x, y) and the local position inside it,
    /// both in [0, 1).
    #[inline(always)]
    #[must_use]
    pub fn locate(&self, x: u32, y: u32) -> (u32, u32, f32, f32) {
        let fx = (x as f32 + 0.5 + self.offset_x) / self.block_w;
        let fy = (y as f32 + 0.5 + self.offset_y) / self.block_h;
        let col = (fx.floor().max(0.0) as u32).min(self.columns - 1);
        let row = (fy.floor().max(0.0) as u32).min(self.rows - 1);
        let u = (fx - col as f32).clamp(0.0, 0.999);
        let v = (fy - row as f32).clamp(0.0, 0.999);
        (col, row, u, v)
    }

    /// Pixels `[start, end)` dont le centre tombe dans le bloc `index`,
    /// bornés à `limit`. Les blocs de bord absorbent le reste.
    fn span(size: f32, offset: f32, index: u32, count: u32, limit: u32) -> (u32, u32) {
        let lo = if index == 0 {
            0.0
        } else {
            (index as f32 * size - offset - 0.5).ceil().max(0.0)
        };
        let hi = if index + 1 == count {
            limit as f32
        } else {
            ((index + 1) as f32 * size - offset - 0.5).ceil().max(0.0)
        };
        ((lo as u32).min(limit), (hi as u32).min(limit))
    }

    fn columns_span(&self, col: u32, width: u32) -> (u32, u32) {
        Self::span(self.block_w, self.offset_x, col, self.columns, width)
    }

    fn rows_span(&self, row: u32, height: u32) -> (u32, u32) {
        Self::span(self.block_h, self.offset_y, row, self.rows, height)
    }
}

/// Ce qu'un bloc dessine : quel glyphe, de quelle couleur, sur quel fond.
#[derive(Clone, Copy, Debug, Default)]
struct BlockShade {
    glyph: u32,
    fg: Rgba,
    bg: Rgba,
}

/// Effet de référence sur CPU : chaque bloc de pixels devient un glyphe de
/// l'atlas, choisi par la luminosité moyenne du bloc.
///
/// - couleur : `color` modulée par la couleur du bloc, ou par sa luminosité
///   seule en `greyscale` ;
/// - fond : `background`, ou la couleur moyenne du bloc avec `fill_pixels` ;
/// - `matrix` : pluie verte, index décalé par colonne au fil de `time`.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use gg_core::{CharacterSet, FrameBuffer, GlyphAtlas, Rgba};
/// use gg_core::traits::{EffectUniforms, ImageEffect};
/// use gg_render::effect::BlockGlyphEffect;
///
/// // Atlas 2x2 : cellule 0 vide, cellule 1 pleine.
/// let mut coverage = vec![0u8; 16];
/// for y in 0..2 { for x in 2..4 { coverage[y * 4 + x] = 255; } }
/// let atlas = GlyphAtlas::from_raw(coverage, 4, 2, CharacterSet::new(" #").unwrap()).unwrap();
///
/// let mut input = FrameBuffer::new(4, 4);
/// input.fill(Rgba::WHITE);
/// let uniforms = EffectUniforms {
///     atlas: Arc::new(atlas), granularity: 4.0, characters_limit: 2,
///     fill_pixels: false, color: Rgba::WHITE, fit: true, greyscale: false,
///     invert: false, matrix: false, time: 0.0, background: Rgba::BLACK,
/// };
/// let mut output = FrameBuffer::new(4, 4);
/// BlockGlyphEffect::new().apply(&input, &uniforms, &mut output);
/// assert_eq!(output.pixel(1, 1), (255, 255, 255, 255));
/// ```
#[derive(Default)]
pub struct BlockGlyphEffect {
    blocks: Vec<BlockShade>,
}

impl BlockGlyphEffect {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn shade_blocks(&mut self, input: &FrameBuffer, u: &EffectUniforms, grid: &BlockGrid) {
        let limit = u.characters_limit.clamp(1, u.atlas.cell_count().max(1));
        let columns = grid.columns;
        self.blocks.clear();
        self.blocks.resize((grid.columns * grid.rows) as usize, BlockShade::default());

        self.blocks
            .par_chunks_exact_mut(columns as usize)
            .enumerate()
            .for_each(|(row, out)| {
                let row = row as u32;
                let (y0, y1) = grid.rows_span(row, input.height);
                for (col, shade) in (0..columns).zip(out.iter_mut()) {
                    let (x0, x1) = grid.columns_span(col, input.width);
                    let avg = average(input, x0, x1, y0, y1);
                    let brightness = f32::from(avg.luminance()) / 255.0;
                    *shade = shade_for(avg, brightness, col, row, limit, u);
                }
            });
    }
}

fn shade_for(avg: Rgba, brightness: f32, col: u32, row: u32, limit: u32, u: &EffectUniforms) -> BlockShade {
    let mut glyph = glyph_index(brightness, limit, u.invert);
    let bg = if u.fill_pixels {
        Rgba { a: 255, ..avg }
    } else {
        u.background
    };

    let fg = if u.matrix {
        glyph = glyph.wrapping_add(matrix_shift(col, u.time)) % limit;
        MATRIX_GREEN.scaled(matrix_trail(col, row, u.time) * brightness.max(0.2))
    } else if u.greyscale {
        u.color.scaled(brightness)
    } else {
        u.color.modulate(Rgba { a: 255, ..avg })
    };

    BlockShade {
        glyph,
        fg: Rgba { a: 255, ..fg },
        bg,
    }
}

/// Pseudo-aléatoire stable par colonne.
#[inline]
fn column_hash(col: u32) -> u32 {
    col.wrapping_mul(2_654_435_761).rotate_left(13) ^ 0x9e37_79b9
}

fn matrix_shift(col: u32, time: f32) -> u32 {
    let speed = 4.0 + (column_hash(col) % 7) as f32;
    ((time.max(0.0) * speed) as u32).wrapping_add(column_hash(col) % 97)
}

/// Intensité de la traînée : 1 sur la tête de chute, décroît vers le haut.
fn matrix_trail(col: u32, row: u32, time: f32) -> f32 {
    const PERIOD: f32 = 48.0;
    let speed = 6.0 + (column_hash(col) % 11) as f32;
    let head = (time.max(0.0) * speed + (column_hash(col) % 48) as f32).rem_euclid(PERIOD);
    let dist = (head - row as f32).rem_euclid(PERIOD);
    (1.0 - dist / PERIOD).powi(2)
}

fn average(input: &FrameBuffer, x0: u32, x1: u32, y0: u32, y1: u32) -> Rgba {
    if input.width == 0 || input.height == 0 {
        return Rgba::BLACK;
    }
    if x0 >= x1 || y0 >= y1 {
        let x = x0.min(input.width - 1);
        let y = y0.min(input.height - 1);
        return input.rgba(x, y);
    }
    let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);
    for y in y0..y1 {
        for x in x0..x1 {
            let (pr, pg, pb, _) = input.pixel(x, y);
            r += u64::from(pr);
            g += u64::from(pg);
            b += u64::from(pb);
        }
    }
    let n = u64::from(x1 - x0) * u64::from(y1 - y0);
    Rgba::new((r / n) as u8, (g / n) as u8, (b / n) as u8, 255)
}

impl ImageEffect for BlockGlyphEffect {
    fn apply(&mut self, input: &FrameBuffer, uniforms: &EffectUniforms, output: &mut FrameBuffer) {
        output.ensure_size(input.width, input.height);
        if input.width == 0 || input.height == 0 {
            return;
        }
        let grid = BlockGrid::new(input.width, input.height, uniforms.granularity, uniforms.fit);
        self.shade_blocks(input, uniforms, &grid);

        let atlas = &uniforms.atlas;
        let cell = atlas.cell_size() as f32;
        let blocks = &self.blocks;
        let stride = (input.width * 4) as usize;

        output
            .data
            .par_chunks_exact_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let (col, brow, u, v) = grid.locate(x as u32, y as u32);
                    let shade = blocks[(brow * grid.columns + col) as usize];
                    let a = atlas.cell_alpha(shade.glyph, (u * cell) as u32, (v * cell) as u32);
                    let c = blend(shade.bg, shade.fg, a);
                    px.copy_from_slice(&[c.r, c.g, c.b, c.a]);
                }
            });
    }

    fn name(&self) -> &'static str {
        "block-glyph"
    }
}

/// Luminosité moyenne d'une frame, sur [0, 1]. Utile aux tests et au HUD.
#[must_use]
pub fn mean_brightness(frame: &FrameBuffer) -> f32 {
    let n = frame.data.len() / 4;
    if n == 0 {
        return 0.0;
    }
    let sum: u64 = frame
        .data
        .chunks_exact(4)
        .map(|p| u64::from(luminance(p[0], p[1], p[2])))
        .sum();
    sum as f32 / (n as f32 * 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gg_core::{CharacterSet, GlyphAtlas};
    use std::sync::Arc;

    /// Atlas 8x8, 2 colonnes : cellule i remplie à i/3 (0, 1/3, 2/3, plein).
    fn ramp_atlas() -> Arc<GlyphAtlas> {
        let size = 8u32;
        let mut coverage = vec![0u8; (size * size) as usize];
        for i in 0..4u32 {
            let level = (i * 255 / 3) as u8;
            let (cx, cy) = ((i % 2) * 4, (i / 2) * 4);
            for y in cy..cy + 4 {
                for x in cx..cx + 4 {
                    coverage[(y * size + x) as usize] = level;
                }
            }
        }
        Arc::new(GlyphAtlas::from_raw(coverage, size, 2, CharacterSet::new(" .o@").unwrap()).unwrap())
    }

    fn uniforms(atlas: Arc<GlyphAtlas>) -> EffectUniforms {
        EffectUniforms {
            atlas,
            granularity: 4.0,
            characters_limit: 4,
            fill_pixels: false,
            color: Rgba::WHITE,
            fit: true,
            greyscale: false,
            invert: false,
            matrix: false,
            time: 0.0,
            background: Rgba::BLACK,
        }
    }

    fn solid(w: u32, h: u32, c: Rgba) -> FrameBuffer {
        let mut fb = FrameBuffer::new(w, h);
        fb.fill(c);
        fb
    }

    #[test]
    fn black_input_selects_the_first_glyph() {
        let input = solid(8, 8, Rgba::BLACK);
        let mut out = FrameBuffer::new(8, 8);
        BlockGlyphEffect::new().apply(&input, &uniforms(ramp_atlas()), &mut out);
        // Glyphe 0 vide sur fond noir.
        assert!(out.data.chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn invert_swaps_ends_of_the_ramp() {
        let input = solid(8, 8, Rgba::BLACK);
        let mut out = FrameBuffer::new(8, 8);
        let u = EffectUniforms {
            invert: true,
            ..uniforms(ramp_atlas())
        };
        BlockGlyphEffect::new().apply(&input, &u, &mut out);
        // Noir + invert → glyphe 3 (plein), teinté par la source noire.
        assert!(out.data.chunks_exact(4).all(|p| p == [0, 0, 0, 255]));

        let u = EffectUniforms {
            invert: true,
            greyscale: true,
            ..uniforms(ramp_atlas())
        };
        let white = solid(8, 8, Rgba::WHITE);
        BlockGlyphEffect::new().apply(&white, &u, &mut out);
        // Blanc + invert → glyphe 0 (vide) : seul le fond reste.
        assert!(out.data.chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn white_input_draws_the_full_glyph_in_colour() {
        let input = solid(8, 8, Rgba::WHITE);
        let mut out = FrameBuffer::new(8, 8);
        let u = EffectUniforms {
            color: Rgba::new(255, 0, 0, 255),
            ..uniforms(ramp_atlas())
        };
        BlockGlyphEffect::new().apply(&input, &u, &mut out);
        assert!(out.data.chunks_exact(4).all(|p| p == [255, 0, 0, 255]));
    }

    #[test]
    fn fill_pixels_uses_the_block_colour_as_background() {
        let grey = Rgba::new(100, 100, 100, 255);
        let input = solid(8, 8, grey);
        let mut out = FrameBuffer::new(8, 8);
        let u = EffectUniforms {
            fill_pixels: true,
            characters_limit: 1,
            ..uniforms(ramp_atlas())
        };
        BlockGlyphEffect::new().apply(&input, &u, &mut out);
        // Limite 1 → glyphe 0, vide : on ne voit que le fond.
        assert!(out.data.chunks_exact(4).all(|p| p == [100, 100, 100, 255]));
    }

    #[test]
    fn fit_grid_is_centred_with_square_blocks() {
        let grid = BlockGrid::new(10, 4, 4.0, true);
        assert_eq!((grid.columns, grid.rows), (3, 1));
        // 12 px de blocs pour 10 px d'image : 1 px de débord de chaque côté.
        assert_eq!(grid.locate(0, 0).0, 0);
        assert_eq!(grid.locate(3, 0).0, 1);
        assert_eq!(grid.locate(9, 0).0, 2);
    }

    #[test]
    fn stretched_grid_covers_the_image_exactly() {
        let grid = BlockGrid::new(10, 4, 4.0, false);
        assert_eq!((grid.columns, grid.rows), (3, 1));
        assert_eq!(grid.locate(9, 3).0, 2);
        assert_eq!(grid.columns_span(0, 10).0, 0);
        assert_eq!(grid.columns_span(2, 10).1, 10);
    }

    #[test]
    fn matrix_mode_is_green_and_moves_with_time() {
        let input = solid(16, 16, Rgba::WHITE);
        let u0 = EffectUniforms {
            matrix: true,
            ..uniforms(ramp_atlas())
        };
        let u1 = EffectUniforms { time: 7.3, ..u0.clone() };
        let mut a = FrameBuffer::new(16, 16);
        let mut b = FrameBuffer::new(16, 16);
        let mut effect = BlockGlyphEffect::new();
        effect.apply(&input, &u0, &mut a);
        effect.apply(&input, &u1, &mut b);
        assert!(a.data.chunks_exact(4).all(|p| p[0] == 0 && p[2] <= p[1]));
        assert_ne!(a, b);
    }

    #[test]
    fn output_follows_input_size() {
        let input = solid(6, 3, Rgba::WHITE);
        let mut out = FrameBuffer::new(1, 1);
        BlockGlyphEffect::new().apply(&input, &uniforms(ramp_atlas()), &mut out);
        assert_eq!((out.width, out.height), (6, 3));
        assert!(mean_brightness(&out) > 0.5);
    }
}
