use std::fmt;

use crate::charset::CharacterSet;
use crate::error::CoreError;
use crate::frame::FrameBuffer;

/// Texture de glyphes : une image carrée découpée en `grid_columns²` cellules.
///
/// Cellule `i` (row-major) contient `characters[i]`, ou reste vide si
/// `i >= glyph_count`. Le raster stocke une couverture alpha (0 = vide,
/// 255 = plein), un octet par pixel. Une fois construite, l'atlas n'est jamais
/// modifié : toute édition produit un nouvel atlas complet.
#[derive(Clone, PartialEq, Eq)]
pub struct GlyphAtlas {
    coverage: Vec<u8>,
    texture_size: u32,
    grid_columns: u32,
    characters: CharacterSet,
    generation: u64,
}

impl GlyphAtlas {
    /// Assemble an atlas from a finished coverage raster.
    ///
    /// `characters` lists the glyphs actually drawn, in cell order.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidDimensions`] if the raster does not match
    /// `texture_size²`, and [`CoreError::Config`] if the grid cannot hold the
    /// glyphs or does not divide the texture evenly.
    pub fn from_raw(
        coverage: Vec<u8>,
        texture_size: u32,
        grid_columns: u32,
        characters: CharacterSet,
    ) -> Result<Self, CoreError> {
        let side = texture_size as usize;
        if side == 0 || side.checked_mul(side) != Some(coverage.len()) {
            return Err(CoreError::InvalidDimensions {
                width: texture_size,
                height: (coverage.len() / texture_size.max(1) as usize) as u32,
            });
        }
        if grid_columns == 0 || texture_size % grid_columns != 0 {
            return Err(CoreError::config(format!(
                "texture {texture_size}px non divisible en {grid_columns} colonnes"
            )));
        }
        let cells = grid_columns as usize * grid_columns as usize;
        if characters.len() > cells {
            return Err(CoreError::config(format!(
                "{} glyphes pour {} cellules",
                characters.len(),
                cells
            )));
        }
        Ok(Self {
            coverage,
            texture_size,
            grid_columns,
            characters,
            generation: 0,
        })
    }

    /// Stamp the build generation (set by whoever requested the build).
    #[must_use]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Build generation; strictly increases across edits of one session.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Side of the square texture in pixels.
    #[must_use]
    pub fn texture_size(&self) -> u32 {
        self.texture_size
    }

    /// Cells per row (and per column).
    #[must_use]
    pub fn grid_columns(&self) -> u32 {
        self.grid_columns
    }

    /// Side of one cell in pixels.
    #[must_use]
    pub fn cell_size(&self) -> u32 {
        self.texture_size / self.grid_columns
    }

    /// Total number of cells, blank or not.
    #[must_use]
    pub fn cell_count(&self) -> u32 {
        self.grid_columns * self.grid_columns
    }

    /// Number of drawn glyphs; cells at or past this index are blank.
    #[must_use]
    pub fn glyph_count(&self) -> u32 {
        self.characters.len() as u32
    }

    /// Glyphs drawn into the atlas, in cell order.
    #[must_use]
    pub fn characters(&self) -> &CharacterSet {
        &self.characters
    }

    /// Raw alpha coverage, row-major.
    #[must_use]
    pub fn coverage(&self) -> &[u8] {
        &self.coverage
    }

    /// (column, row) of cell `index`.
    ///
    /// # Example
    /// ```
    /// use gg_core::atlas::cell_coords;
    /// assert_eq!(cell_coords(17, 16), (1, 1));
    /// ```
    #[inline(always)]
    #[must_use]
    pub fn cell_coords(&self, index: u32) -> (u32, u32) {
        cell_coords(index, self.grid_columns)
    }

    /// Pixel centre of cell `index`.
    #[must_use]
    pub fn cell_center(&self, index: u32) -> (u32, u32) {
        let (x, y) = self.cell_coords(index);
        let cell = self.cell_size();
        (x * cell + cell / 2, y * cell + cell / 2)
    }

    /// Alpha at absolute texture coordinates. Out of range reads as 0.
    #[inline(always)]
    #[must_use]
    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        if x >= self.texture_size || y >= self.texture_size {
            return 0;
        }
        self.coverage[(y * self.texture_size + x) as usize]
    }

    /// Alpha inside cell `index` at local offset (dx, dy).
    #[inline(always)]
    #[must_use]
    pub fn cell_alpha(&self, index: u32, dx: u32, dy: u32) -> u8 {
        if index >= self.cell_count() {
            return 0;
        }
        let cell = self.cell_size();
        let (x, y) = self.cell_coords(index);
        self.alpha(x * cell + dx.min(cell - 1), y * cell + dy.min(cell - 1))
    }

    /// Copy of the coverage of one cell, row-major.
    #[must_use]
    pub fn cell_pixels(&self, index: u32) -> Vec<u8> {
        let cell = self.cell_size();
        let mut out = Vec::with_capacity((cell * cell) as usize);
        for dy in 0..cell {
            for dx in 0..cell {
                out.push(self.cell_alpha(index, dx, dy));
            }
        }
        out
    }

    /// `true` if every pixel of cell `index` is transparent.
    #[must_use]
    pub fn cell_is_blank(&self, index: u32) -> bool {
        if index >= self.cell_count() {
            return true;
        }
        let cell = self.cell_size();
        let (x, y) = self.cell_coords(index);
        (0..cell).all(|dy| {
            let start = ((y * cell + dy) * self.texture_size + x * cell) as usize;
            self.coverage[start..start + cell as usize]
                .iter()
                .all(|&a| a == 0)
        })
    }

    /// White glyphs on transparent black, for export or debugging.
    #[must_use]
    pub fn to_frame(&self) -> FrameBuffer {
        let mut fb = FrameBuffer::new(self.texture_size, self.texture_size);
        for (px, &a) in fb.data.chunks_exact_mut(4).zip(&self.coverage) {
            px.copy_from_slice(&[255, 255, 255, a]);
        }
        fb
    }
}

impl fmt::Debug for GlyphAtlas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlyphAtlas")
            .field("texture_size", &self.texture_size)
            .field("grid_columns", &self.grid_columns)
            .field("characters", &self.characters.to_string())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// (column, row) of a row-major cell index.
#[inline(always)]
#[must_use]
pub fn cell_coords(index: u32, grid_columns: u32) -> (u32, u32) {
    (index % grid_columns, index / grid_columns)
}
