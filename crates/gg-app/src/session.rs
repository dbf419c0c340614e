use std::sync::Arc;
use std::time::Duration;

use gg_atlas::{AtlasEditor, GlyphAtlasBuilder};
use gg_core::clock::FrameClock;
use gg_core::config::{AppConfig, RenderSettings};
use gg_core::frame::FrameBuffer;
use gg_core::state::{EffectUpdate, SharedEffectState};
use gg_core::traits::{ImageEffect, Scene};
use gg_core::CoreError;
use gg_render::scene::SceneRenderer;
use gg_render::stage::{EffectStage, StageOutcome};

/// Une session de rendu complète : état partagé, éditeur d'atlas, scène et
/// étage d'effet, cadencés par une seule boucle coopérative.
///
/// Ordre d'un tick : rechargements en attente, publication des atlas
/// construits en fond, avance du temps, rendu de la scène, effet.
pub struct Session<S: Scene, E: ImageEffect> {
    state: Arc<SharedEffectState>,
    editor: AtlasEditor,
    renderer: SceneRenderer<S>,
    stage: EffectStage<E>,
    reloads: Option<flume::Receiver<AppConfig>>,
    clock: FrameClock,
    render: RenderSettings,
    surface_override: Option<(u32, u32)>,
    scene_time: f32,
    paused: bool,
}

impl<S: Scene, E: ImageEffect> Session<S, E> {
    /// Wire everything together and request the first atlas.
    ///
    /// A failing first build is not fatal: frames are skipped until an edit
    /// or a reload produces a valid atlas.
    ///
    /// # Errors
    /// [`CoreError::RenderBackend`] if `background` is set and the worker
    /// thread cannot be spawned.
    pub fn new(
        mut config: AppConfig,
        scene: S,
        effect: E,
        builder: GlyphAtlasBuilder,
        background: bool,
    ) -> Result<Self, CoreError> {
        config.clamp_all();
        let state = Arc::new(SharedEffectState::new(config.effect.clone()));

        let mut editor = if background {
            AtlasEditor::in_background(config.atlas.clone(), Arc::clone(&state), builder)?
        } else {
            AtlasEditor::new(config.atlas.clone(), Arc::clone(&state), builder)
        };
        if let Err(e) = editor.rebuild() {
            log::debug!("pas d'atlas au démarrage : {e}");
        }

        let render = config.render;
        let renderer = SceneRenderer::new(scene, Arc::clone(&state), render.width, render.height);
        let stage = EffectStage::new(effect, Arc::clone(&state), render.device_pixel_ratio);

        Ok(Self {
            state,
            editor,
            renderer,
            stage,
            reloads: None,
            clock: FrameClock::new(),
            render,
            surface_override: None,
            scene_time: 0.0,
            paused: false,
        })
    }

    /// Attach the receiving end of the config watcher.
    pub fn watch_reloads(&mut self, rx: flume::Receiver<AppConfig>) {
        self.reloads = Some(rx);
    }

    /// Run one frame with the wall-clock delta.
    pub fn tick(&mut self) -> StageOutcome {
        let dt = self.clock.tick();
        self.advance(dt)
    }

    /// Run one frame with an explicit delta (headless export, tests).
    pub fn advance(&mut self, dt: Duration) -> StageOutcome {
        // Seule la dernière config reçue compte.
        let reload = self.reloads.as_ref().and_then(|rx| rx.try_iter().last());
        if let Some(config) = reload {
            self.apply_config(config);
        }

        self.editor.poll();

        if !self.paused {
            let dt = dt.as_secs_f32();
            self.scene_time += dt;
            let snap = self.state.snapshot();
            if snap.params.animate_time {
                self.state.update(EffectUpdate::new().time(snap.params.time + dt));
            }
        }

        self.renderer.tick(self.scene_time);
        self.stage.run()
    }

    /// Apply a full config (hot reload).
    ///
    /// Effect parameters are published immediately, except the ones tied to
    /// the atlas (`characters_limit`, `invert`): those are published by the
    /// editor together with the atlas they belong to. An invalid atlas
    /// section is logged and the previous atlas stays in place.
    pub fn apply_config(&mut self, mut config: AppConfig) {
        config.clamp_all();

        let mut update = EffectUpdate::from_parameters(&config.effect);
        update.characters_limit = None;
        update.invert = None;
        if config.effect.animate_time {
            // Le temps animé continue depuis sa valeur courante.
            update.time = None;
        }
        self.state.update(update);

        if let Err(e) = self.editor.apply_config(config.atlas) {
            log::warn!("Config d'atlas rejetée, atlas précédent conservé : {e}");
        }

        let (w, h) = self
            .surface_override
            .unwrap_or((config.render.width, config.render.height));
        self.renderer.resize(w, h);
        self.stage.set_device_pixel_ratio(config.render.device_pixel_ratio);
        self.render = config.render;
    }

    /// Pin the surface size (terminal preview). Reloaded `[render]` sizes
    /// are ignored from then on.
    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface_override = Some((width, height));
        self.renderer.resize(width, height);
    }

    /// Freeze or resume scene and effect time.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    #[must_use]
    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Scene clock in seconds.
    #[must_use]
    pub fn scene_time(&self) -> f32 {
        self.scene_time
    }

    #[must_use]
    pub fn state(&self) -> &Arc<SharedEffectState> {
        &self.state
    }

    #[must_use]
    pub fn editor(&self) -> &AtlasEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut AtlasEditor {
        &mut self.editor
    }

    #[must_use]
    pub fn renderer(&self) -> &SceneRenderer<S> {
        &self.renderer
    }

    #[must_use]
    pub fn stage(&self) -> &EffectStage<E> {
        &self.stage
    }

    /// Last frame produced by the effect.
    #[must_use]
    pub fn output(&self) -> &FrameBuffer {
        self.stage.output()
    }

    /// Render settings of the last applied config.
    #[must_use]
    pub fn render_settings(&self) -> &RenderSettings {
        &self.render
    }

    /// Stop the atlas worker. The session keeps rendering with the last atlas.
    pub fn dispose(&mut self) {
        self.editor.dispose();
        self.reloads = None;
    }
}
