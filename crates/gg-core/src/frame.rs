use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::color::{self, Rgba};

/// Buffer de pixels réutilisable. Pré-alloué, jamais redimensionné en hot path.
///
/// Stocke les pixels en RGBA row-major, 4 bytes par pixel.
///
/// # Example
/// ```
/// use gg_core::frame::FrameBuffer;
/// let fb = FrameBuffer::new(10, 10);
/// assert_eq!(fb.data.len(), 400);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Pixels RGBA, row-major, 4 bytes par pixel.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameBuffer {
    /// Crée un buffer pré-alloué aux dimensions données.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0u8; (width * height * 4) as usize],
            width,
            height,
        }
    }

    /// Accès au pixel (x, y) → (r, g, b, a).
    ///
    /// # Example
    /// ```
    /// use gg_core::frame::FrameBuffer;
    /// let fb = FrameBuffer::new(10, 10);
    /// assert_eq!(fb.pixel(0, 0), (0, 0, 0, 0));
    /// ```
    #[inline(always)]
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8, u8) {
        debug_assert!(x < self.width && y < self.height, "pixel out of bounds");
        let idx = ((y * self.width + x) * 4) as usize;
        if idx + 3 >= self.data.len() {
            return (0, 0, 0, 0);
        }
        (
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        )
    }

    /// Pixel (x, y) as an [`Rgba`].
    #[inline(always)]
    #[must_use]
    pub fn rgba(&self, x: u32, y: u32) -> Rgba {
        let (r, g, b, a) = self.pixel(x, y);
        Rgba::new(r, g, b, a)
    }

    /// Écrit le pixel (x, y). Hors limites : ignoré.
    #[inline(always)]
    pub fn set_pixel(&mut self, x: u32, y: u32, c: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        self.data[idx..idx + 4].copy_from_slice(&[c.r, c.g, c.b, c.a]);
    }

    /// Luminance perceptuelle BT.709.
    ///
    /// # Example
    /// ```
    /// use gg_core::frame::FrameBuffer;
    /// let mut fb = FrameBuffer::new(1, 1);
    /// fb.data.copy_from_slice(&[255, 255, 255, 255]);
    /// assert_eq!(fb.luminance(0, 0), 255);
    /// ```
    #[inline(always)]
    #[must_use]
    pub fn luminance(&self, x: u32, y: u32) -> u8 {
        let (r, g, b, _) = self.pixel(x, y);
        color::luminance(r, g, b)
    }

    /// Fill every pixel with `c`.
    pub fn fill(&mut self, c: Rgba) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[c.r, c.g, c.b, c.a]);
        }
    }

    /// Reallocate only when the dimensions actually change.
    pub fn ensure_size(&mut self, width: u32, height: u32) {
        if self.width != width || self.height != height {
            *self = Self::new(width, height);
        }
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Référence opaque vers la surface produite par le rendu de scène.
///
/// Cloner le handle partage la même surface. Le producteur remplace la frame
/// entière via [`present`](Self::present) ; les lecteurs obtiennent la
/// dernière frame complète sans verrou.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use gg_core::frame::{FrameBuffer, RenderTargetHandle};
/// let target = RenderTargetHandle::new(4, 2);
/// let reader = target.clone();
/// target.present(Arc::new(FrameBuffer::new(4, 2)));
/// assert_eq!(reader.latest().width, 4);
/// assert_eq!(reader.id(), target.id());
/// ```
#[derive(Clone)]
pub struct RenderTargetHandle {
    id: u64,
    width: u32,
    height: u32,
    surface: Arc<ArcSwap<FrameBuffer>>,
}

impl RenderTargetHandle {
    /// Allocate a new surface with a fresh id.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            surface: Arc::new(ArcSwap::from_pointee(FrameBuffer::new(width, height))),
        }
    }

    /// Identifiant unique de la surface ; change à chaque remplacement.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Surface dimensions.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Dernière frame présentée.
    #[must_use]
    pub fn latest(&self) -> Arc<FrameBuffer> {
        self.surface.load_full()
    }

    /// Replace the visible frame. Only the scene renderer calls this.
    pub fn present(&self, frame: Arc<FrameBuffer>) {
        self.surface.store(frame);
    }

    /// `true` if both handles point at the same surface.
    #[must_use]
    pub fn same_surface(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.surface, &other.surface)
    }
}

impl fmt::Debug for RenderTargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTargetHandle")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Grille de cellules terminal. Pré-allouée, réutilisée chaque frame.
///
/// # Example
/// ```
/// use gg_core::frame::{AsciiGrid, AsciiCell};
/// let mut grid = AsciiGrid::new(80, 24);
/// grid.set(0, 0, AsciiCell { ch: '@', fg: (255, 0, 0), bg: (0, 0, 0) });
/// assert_eq!(grid.get(0, 0).ch, '@');
/// ```
#[derive(Clone)]
pub struct AsciiGrid {
    /// Flat array of cells, row-major.
    pub cells: Vec<AsciiCell>,
    /// Width in characters.
    pub width: u16,
    /// Height in characters.
    pub height: u16,
}

/// Single cell in the terminal grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AsciiCell {
    /// Caractère à afficher.
    pub ch: char,
    /// Couleur foreground (RGB).
    pub fg: (u8, u8, u8),
    /// Couleur background (RGB).
    pub bg: (u8, u8, u8),
}

impl Default for AsciiCell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: (0, 0, 0),
            bg: (0, 0, 0),
        }
    }
}

impl AsciiGrid {
    /// Crée une grille pré-allouée.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            cells: vec![AsciiCell::default(); width as usize * height as usize],
            width,
            height,
        }
    }

    /// Set a cell at position (x, y).
    #[inline(always)]
    pub fn set(&mut self, x: u16, y: u16, cell: AsciiCell) {
        self.cells[y as usize * self.width as usize + x as usize] = cell;
    }

    /// Get a cell reference at position (x, y).
    #[inline(always)]
    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> &AsciiCell {
        &self.cells[y as usize * self.width as usize + x as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_pixel_ignores_out_of_bounds() {
        let mut fb = FrameBuffer::new(2, 2);
        fb.set_pixel(5, 0, Rgba::WHITE);
        assert!(fb.data.iter().all(|&b| b == 0));
        fb.set_pixel(1, 1, Rgba::WHITE);
        assert_eq!(fb.pixel(1, 1), (255, 255, 255, 255));
    }

    #[test]
    fn ensure_size_keeps_matching_buffer() {
        let mut fb = FrameBuffer::new(3, 3);
        fb.fill(Rgba::WHITE);
        fb.ensure_size(3, 3);
        assert_eq!(fb.pixel(2, 2), (255, 255, 255, 255));
        fb.ensure_size(4, 1);
        assert_eq!(fb.data.len(), 16);
        assert_eq!(fb.pixel(0, 0), (0, 0, 0, 0));
    }

    #[test]
    fn surfaces_get_distinct_ids() {
        let a = RenderTargetHandle::new(1, 1);
        let b = RenderTargetHandle::new(1, 1);
        assert_ne!(a.id(), b.id());
        assert!(a.same_surface(&a.clone()));
        assert!(!a.same_surface(&b));
    }
}
