use std::sync::Arc;

use gg_core::atlas::GlyphAtlas;
use gg_core::config::EffectParameters;
use gg_core::frame::FrameBuffer;
use gg_core::state::SharedEffectState;
use gg_core::traits::{EffectUniforms, ImageEffect};

/// Pourquoi une frame n'a pas été traitée.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No atlas has been published yet.
    NoAtlas,
    /// The scene has not registered its surface yet.
    NoRenderTarget,
}

/// Résultat d'un passage de l'étage d'effet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    /// The effect ran and [`EffectStage::output`] holds the new frame.
    Rendered,
    /// Missing inputs: the effect was not called.
    Skipped(SkipReason),
}

/// Build the uniforms handed to the effect from a parameter snapshot.
///
/// `granularity` is multiplied by `device_pixel_ratio`; nothing else is
/// transformed.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use gg_core::{CharacterSet, EffectParameters, GlyphAtlas};
/// use gg_render::stage::uniforms_from;
///
/// let atlas = GlyphAtlas::from_raw(vec![0; 16], 4, 2, CharacterSet::new("ab").unwrap()).unwrap();
/// let u = uniforms_from(&EffectParameters::default(), Arc::new(atlas), 2.0);
/// assert_eq!(u.granularity, 16.0);
/// assert_eq!(u.characters_limit, 16);
/// ```
#[must_use]
pub fn uniforms_from(params: &EffectParameters, atlas: Arc<GlyphAtlas>, device_pixel_ratio: f32) -> EffectUniforms {
    EffectUniforms {
        atlas,
        granularity: params.granularity * device_pixel_ratio,
        characters_limit: params.characters_limit,
        fill_pixels: params.fill_pixels,
        color: params.color,
        fit: params.fit,
        greyscale: params.greyscale,
        invert: params.invert,
        matrix: params.matrix,
        time: params.time,
        background: params.background,
    }
}

/// Relie l'état partagé à l'effet image : une lecture de snapshot par frame.
pub struct EffectStage<E: ImageEffect> {
    effect: E,
    state: Arc<SharedEffectState>,
    device_pixel_ratio: f32,
    output: FrameBuffer,
    rendered: u64,
    skipped: u64,
    last_skip: Option<SkipReason>,
}

impl<E: ImageEffect> EffectStage<E> {
    #[must_use]
    pub fn new(effect: E, state: Arc<SharedEffectState>, device_pixel_ratio: f32) -> Self {
        Self {
            effect,
            state,
            device_pixel_ratio: sanitize_ratio(device_pixel_ratio),
            output: FrameBuffer::new(0, 0),
            rendered: 0,
            skipped: 0,
            last_skip: None,
        }
    }

    /// Process the latest scene frame with the current snapshot.
    pub fn run(&mut self) -> StageOutcome {
        let snap = self.state.snapshot();
        let Some(atlas) = snap.atlas.as_ref() else {
            return self.skip(SkipReason::NoAtlas);
        };
        let Some(target) = snap.render_target.as_ref() else {
            return self.skip(SkipReason::NoRenderTarget);
        };

        let input = target.latest();
        let uniforms = uniforms_from(&snap.params, Arc::clone(atlas), self.device_pixel_ratio);
        self.output.ensure_size(input.width, input.height);
        self.effect.apply(&input, &uniforms, &mut self.output);

        if self.last_skip.take().is_some() {
            log::info!("Effet {} actif (atlas g{})", self.effect.name(), atlas.generation());
        }
        self.rendered += 1;
        StageOutcome::Rendered
    }

    fn skip(&mut self, reason: SkipReason) -> StageOutcome {
        // Log à la première occurrence seulement, pas à chaque frame.
        if self.last_skip != Some(reason) {
            log::debug!("frame sautée : {reason:?}");
            self.last_skip = Some(reason);
        }
        self.skipped += 1;
        StageOutcome::Skipped(reason)
    }

    /// Last frame produced by the effect.
    #[must_use]
    pub fn output(&self) -> &FrameBuffer {
        &self.output
    }

    #[must_use]
    pub fn effect(&self) -> &E {
        &self.effect
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        self.device_pixel_ratio = sanitize_ratio(ratio);
    }

    #[must_use]
    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    #[must_use]
    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

fn sanitize_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() && ratio > 0.0 { ratio } else { 1.0 }
}
