use ab_glyph::{Font, FontVec, PxScale, ScaleFont, point};
use gg_core::CoreError;

/// Bitmap de couverture d'un glyphe isolé.
///
/// `left`/`top` positionnent le coin haut-gauche du bitmap par rapport au
/// point d'ancrage : centre horizontal de l'avance, milieu vertical du carré
/// em (équivalent de `textAlign = center` + `textBaseline = middle`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlyphBitmap {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// X offset of the bitmap from the anchor.
    pub left: i32,
    /// Y offset of the bitmap from the anchor (y grows downward).
    pub top: i32,
    /// Alpha coverage, row-major, `width * height` bytes.
    pub coverage: Vec<u8>,
}

impl GlyphBitmap {
    /// Glyph with no ink (space, or glyph missing from the font).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// `true` if nothing would be drawn.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coverage.iter().all(|&a| a == 0)
    }

    /// Coverage at (x, y) inside the bitmap.
    #[inline(always)]
    #[must_use]
    pub fn at(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.coverage[(y * self.width + x) as usize]
    }
}

/// Backend de rasterisation des glyphes.
///
/// Implémenté par [`AbGlyphRasterizer`] ; les tests fournissent leurs propres
/// backends déterministes.
pub trait GlyphRasterizer: Send + Sync {
    /// Rasterize `ch` at `font_size` pixels.
    ///
    /// Returns `None` when the font has no glyph for `ch`.
    fn rasterize(&self, ch: char, font_size: f32) -> Option<GlyphBitmap>;

    /// Nom lisible pour le debug/UI.
    fn name(&self) -> &'static str;
}

/// Rasterizer logiciel basé sur `ab_glyph`.
pub struct AbGlyphRasterizer {
    font: FontVec,
    label: String,
}

impl AbGlyphRasterizer {
    /// Parse a TTF/OTF font from memory.
    ///
    /// # Errors
    /// Returns [`CoreError::RenderBackend`] if the data is not a valid font.
    pub fn from_bytes(data: Vec<u8>, label: impl Into<String>) -> Result<Self, CoreError> {
        let label = label.into();
        let font = FontVec::try_from_vec(data)
            .map_err(|e| CoreError::backend(format!("police invalide {label} : {e}")))?;
        Ok(Self { font, label })
    }

    /// Where the font came from (path or description).
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl GlyphRasterizer for AbGlyphRasterizer {
    fn rasterize(&self, ch: char, font_size: f32) -> Option<GlyphBitmap> {
        // glyph_id 0 = .notdef : on ne dessine pas la boîte "?" de remplacement.
        let gid = self.font.glyph_id(ch);
        if gid.0 == 0 {
            return None;
        }

        let scale = PxScale::from(font_size);
        let scaled = self.font.as_scaled(scale);
        let advance = scaled.h_advance(gid);
        let baseline = (scaled.ascent() + scaled.descent()) / 2.0;
        let glyph = gid.with_scale_and_position(scale, point(-advance / 2.0, baseline));

        let Some(outline) = self.font.outline_glyph(glyph) else {
            return Some(GlyphBitmap::empty());
        };

        let bounds = outline.px_bounds();
        let width = bounds.width() as u32;
        let height = bounds.height() as u32;
        let mut coverage = vec![0u8; (width * height) as usize];
        outline.draw(|x, y, v| {
            let idx = (y * width + x) as usize;
            if let Some(px) = coverage.get_mut(idx) {
                *px = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        });

        Some(GlyphBitmap {
            width,
            height,
            left: bounds.min.x as i32,
            top: bounds.min.y as i32,
            coverage,
        })
    }

    fn name(&self) -> &'static str {
        "ab_glyph"
    }
}
