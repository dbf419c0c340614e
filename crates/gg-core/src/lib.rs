/// Configuration, types, and shared effect state for glyphgrid.
///
/// This crate contains the data model used across the workspace: character
/// sets, atlas and effect configuration, the glyph atlas raster, the shared
/// effect state and the traits implemented by the 3D engine and the
/// image-space effect.

pub mod atlas;
pub mod charset;
pub mod clock;
pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod state;
pub mod traits;

pub use atlas::GlyphAtlas;
pub use charset::CharacterSet;
pub use color::Rgba;
pub use config::{AppConfig, AtlasConfig, EffectParameters, FontSource};
pub use error::CoreError;
pub use frame::{FrameBuffer, RenderTargetHandle};
pub use state::{EffectSnapshot, EffectUpdate, SharedEffectState};
