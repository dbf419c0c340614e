/// Glyph atlas rasterization and the atlas editor.
///
/// - [`raster`] : backend de rasterisation (`ab_glyph`) et bitmaps de glyphes.
/// - [`font`] : résolution de la police (fichier ou police système).
/// - [`builder`] : assemblage déterministe de l'atlas, cellules en parallèle.
/// - [`worker`] : thread de construction en arrière-plan.
/// - [`editor`] : propriétaire de la config, publie chaque atlas dans l'état partagé.

pub mod builder;
pub mod editor;
pub mod font;
pub mod raster;
pub mod worker;

pub use builder::GlyphAtlasBuilder;
pub use editor::{AtlasEditor, AtlasLifecycle};
pub use raster::{AbGlyphRasterizer, GlyphBitmap, GlyphRasterizer};
