use std::collections::HashMap;
use std::sync::Arc;

use gg_core::{AtlasConfig, CharacterSet, CoreError, FontSource, GlyphAtlas};
use rayon::prelude::*;

use crate::font;
use crate::raster::{GlyphBitmap, GlyphRasterizer};

/// Signature d'un chargeur de police (remplaçable en test).
pub type FontLoader = fn(&FontSource) -> Result<Arc<dyn GlyphRasterizer>, CoreError>;

enum Backend {
    /// Police chargée à la demande, gardée tant que la source ne change pas.
    Loader {
        load: FontLoader,
        cached: Option<(FontSource, Arc<dyn GlyphRasterizer>)>,
    },
    /// Rasterizer imposé, la source de police de la config est ignorée.
    Fixed(Arc<dyn GlyphRasterizer>),
}

/// Construit un [`GlyphAtlas`] à partir d'une [`AtlasConfig`].
///
/// Chaque glyphe est centré dans sa cellule (centre horizontal de l'avance,
/// milieu vertical du carré em), en blanc sur fond transparent, et clippé aux
/// bords de la cellule. La construction est déterministe : même config, même
/// police, même raster.
pub struct GlyphAtlasBuilder {
    backend: Backend,
}

impl GlyphAtlasBuilder {
    /// Builder using [`font::load_rasterizer`] for the configured font.
    #[must_use]
    pub fn new() -> Self {
        Self::with_loader(font::load_rasterizer)
    }

    /// Builder with a custom font loader.
    #[must_use]
    pub fn with_loader(load: FontLoader) -> Self {
        Self {
            backend: Backend::Loader { load, cached: None },
        }
    }

    /// Builder that always draws with `rasterizer`.
    #[must_use]
    pub fn with_rasterizer(rasterizer: Arc<dyn GlyphRasterizer>) -> Self {
        Self {
            backend: Backend::Fixed(rasterizer),
        }
    }

    /// Rasterize the atlas described by `config`.
    ///
    /// Only the first `characters_limit` characters are drawn; the rest are
    /// dropped with a warning. `invert` does not change the raster.
    ///
    /// # Errors
    /// [`CoreError::Config`] for an invalid config, [`CoreError::FileNotFound`]
    /// or [`CoreError::RenderBackend`] if the font cannot be loaded.
    pub fn build(&mut self, config: &AtlasConfig) -> Result<GlyphAtlas, CoreError> {
        config.validate()?;
        let rasterizer = self.rasterizer_for(&config.font)?;

        let drawn = config.drawn_characters();
        if drawn.len() < config.characters.len() {
            log::warn!(
                "{} caractères au-delà de la limite {} ignorés",
                config.characters.len() - drawn.len(),
                config.characters_limit
            );
        }

        let start = std::time::Instant::now();
        let atlas = rasterize_atlas(rasterizer.as_ref(), config, drawn)?;
        log::debug!(
            "atlas {}px / {} glyphes rasterisé en {:.1?} ({})",
            config.texture_size,
            atlas.glyph_count(),
            start.elapsed(),
            rasterizer.name()
        );
        Ok(atlas)
    }

    fn rasterizer_for(&mut self, source: &FontSource) -> Result<Arc<dyn GlyphRasterizer>, CoreError> {
        match &mut self.backend {
            Backend::Fixed(r) => Ok(Arc::clone(r)),
            Backend::Loader { load, cached } => {
                if let Some((cached_source, r)) = cached
                    && cached_source == source
                {
                    return Ok(Arc::clone(r));
                }
                let r = load(source)?;
                *cached = Some((source.clone(), Arc::clone(&r)));
                Ok(r)
            }
        }
    }
}

impl Default for GlyphAtlasBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn rasterize_atlas(
    rasterizer: &dyn GlyphRasterizer,
    config: &AtlasConfig,
    drawn: CharacterSet,
) -> Result<GlyphAtlas, CoreError> {
    let size = config.texture_size;
    let columns = config.grid_columns;
    let cell = config.cell_size();
    let font_size = config.font_size as f32;

    // Un seul rendu par caractère distinct (les espaces se répètent souvent).
    let mut cache: HashMap<char, GlyphBitmap> = HashMap::new();
    for &ch in drawn.as_slice() {
        cache.entry(ch).or_insert_with(|| {
            rasterizer.rasterize(ch, font_size).unwrap_or_else(|| {
                log::debug!("glyphe absent de la police : {ch:?}");
                GlyphBitmap::empty()
            })
        });
    }

    let mut coverage = vec![0u8; size as usize * size as usize];
    let glyphs = drawn.as_slice();
    let band_len = cell as usize * size as usize;

    // Une bande = une rangée de cellules, rendue en parallèle.
    coverage
        .par_chunks_exact_mut(band_len)
        .enumerate()
        .for_each(|(row, band)| {
            for col in 0..columns {
                let index = row as u32 * columns + col;
                let Some(ch) = glyphs.get(index as usize) else {
                    return;
                };
                if let Some(bitmap) = cache.get(ch) {
                    blit_centered(band, size, col * cell, cell, bitmap);
                }
            }
        });

    GlyphAtlas::from_raw(coverage, size, columns, drawn)
}

/// Copie `bitmap` centré dans la cellule démarrant à `cell_x` de la bande.
/// Tout pixel hors de la cellule est ignoré.
fn blit_centered(band: &mut [u8], stride: u32, cell_x: u32, cell: u32, bitmap: &GlyphBitmap) {
    let anchor_x = (cell_x + cell / 2) as i32;
    let anchor_y = (cell / 2) as i32;
    let (min_x, max_x) = (cell_x as i32, (cell_x + cell) as i32);

    for by in 0..bitmap.height {
        let y = anchor_y + bitmap.top + by as i32;
        if y < 0 || y >= cell as i32 {
            continue;
        }
        for bx in 0..bitmap.width {
            let x = anchor_x + bitmap.left + bx as i32;
            if x < min_x || x >= max_x {
                continue;
            }
            let a = bitmap.at(bx, by);
            if a == 0 {
                continue;
            }
            let idx = y as usize * stride as usize + x as usize;
            if let Some(px) = band.get_mut(idx) {
                *px = (*px).max(a);
            }
        }
    }
}
