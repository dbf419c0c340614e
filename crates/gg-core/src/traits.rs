use std::sync::Arc;

use crate::atlas::GlyphAtlas;
use crate::color::Rgba;
use crate::frame::FrameBuffer;

/// Moteur 3D externe : rend la scène dans la surface fournie.
///
/// # Example
/// ```
/// use gg_core::traits::Scene;
/// use gg_core::frame::FrameBuffer;
///
/// struct Flat;
/// impl Scene for Flat {
///     fn render(&mut self, _time: f32, target: &mut FrameBuffer) {
///         target.data.fill(255);
///     }
///     fn name(&self) -> &'static str { "flat" }
/// }
/// ```
pub trait Scene: Send {
    /// Draw the scene at `time` seconds into `target`, overwriting every pixel.
    fn render(&mut self, time: f32, target: &mut FrameBuffer);

    /// Nom lisible pour le debug/UI.
    fn name(&self) -> &'static str;
}

/// Exactly what the image-space effect receives each frame.
#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Debug)]
pub struct EffectUniforms {
    /// Atlas raster (`charactersTexture`).
    pub atlas: Arc<GlyphAtlas>,
    /// Block size in device pixels (already scaled by the pixel ratio).
    pub granularity: f32,
    pub characters_limit: u32,
    pub fill_pixels: bool,
    pub color: Rgba,
    pub fit: bool,
    pub greyscale: bool,
    pub invert: bool,
    pub matrix: bool,
    pub time: f32,
    pub background: Rgba,
}

/// Effet image externe : remplace chaque bloc de pixels par un glyphe de l'atlas.
///
/// # Example
/// ```
/// use gg_core::traits::{EffectUniforms, ImageEffect};
/// use gg_core::frame::FrameBuffer;
///
/// struct Passthrough;
/// impl ImageEffect for Passthrough {
///     fn apply(&mut self, input: &FrameBuffer, _u: &EffectUniforms, output: &mut FrameBuffer) {
///         output.data.copy_from_slice(&input.data);
///     }
///     fn name(&self) -> &'static str { "passthrough" }
/// }
/// ```
pub trait ImageEffect: Send {
    /// Shade `input` into `output`. Both buffers have the same dimensions.
    fn apply(&mut self, input: &FrameBuffer, uniforms: &EffectUniforms, output: &mut FrameBuffer);

    /// Nom lisible pour le debug/UI.
    fn name(&self) -> &'static str;
}
