use std::sync::Arc;

use gg_core::frame::{FrameBuffer, RenderTargetHandle};
use gg_core::state::{EffectUpdate, SharedEffectState};
use gg_core::traits::Scene;

/// Nombre de buffers en rotation : un présenté, un lu par l'effet, un libre.
const POOL_SIZE: usize = 3;

/// Rend une [`Scene`] dans la cible de rendu partagée.
///
/// La cible est créée au premier tick et remplacée à chaque changement de
/// taille ; chaque nouvelle cible est enregistrée dans l'état partagé. Les
/// frames sont prises dans un pool d'`Arc<FrameBuffer>` recyclés
/// (`Arc::get_mut` sur un slot que plus personne ne lit).
pub struct SceneRenderer<S: Scene> {
    scene: S,
    state: Arc<SharedEffectState>,
    size: (u32, u32),
    target: Option<RenderTargetHandle>,
    pool: Vec<Arc<FrameBuffer>>,
    frames: u64,
    dropped: u64,
}

impl<S: Scene> SceneRenderer<S> {
    /// Create a renderer; nothing is allocated until the first tick.
    #[must_use]
    pub fn new(scene: S, state: Arc<SharedEffectState>, width: u32, height: u32) -> Self {
        Self {
            scene,
            state,
            size: (width.max(1), height.max(1)),
            target: None,
            pool: Vec::new(),
            frames: 0,
            dropped: 0,
        }
    }

    /// Request a new surface size. Applied on the next tick.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width.max(1), height.max(1));
    }

    /// Render one frame at `time` seconds and present it.
    ///
    /// Returns `false` if every pooled buffer is still in use (frame dropped).
    pub fn tick(&mut self, time: f32) -> bool {
        let target = self.ensure_target();

        let Some(slot) = self.pool.iter().position(|fb| Arc::strong_count(fb) == 1) else {
            self.dropped += 1;
            log::trace!("pool de frames saturé, frame {} sautée", self.frames);
            return false;
        };
        let Some(fb) = Arc::get_mut(&mut self.pool[slot]) else {
            self.dropped += 1;
            return false;
        };

        self.scene.render(time, fb);
        target.present(Arc::clone(&self.pool[slot]));
        self.frames += 1;
        true
    }

    fn ensure_target(&mut self) -> RenderTargetHandle {
        if let Some(target) = &self.target
            && target.size() == self.size
        {
            return target.clone();
        }

        let (w, h) = self.size;
        let target = RenderTargetHandle::new(w, h);
        self.pool = (0..POOL_SIZE).map(|_| Arc::new(FrameBuffer::new(w, h))).collect();
        if self.target.is_some() {
            log::info!("Surface redimensionnée : {w}x{h} (#{})", target.id());
        } else {
            log::info!("Surface de rendu créée : {w}x{h} (#{}, scène {})", target.id(), self.scene.name());
        }
        self.state.update(EffectUpdate::new().render_target(target.clone()));
        self.target = Some(target.clone());
        target
    }

    /// Current surface, if the first frame has been rendered.
    #[must_use]
    pub fn target(&self) -> Option<&RenderTargetHandle> {
        self.target.as_ref()
    }

    #[must_use]
    pub fn scene(&self) -> &S {
        &self.scene
    }

    /// Frames rendered since start.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames skipped because the pool was saturated.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gg_core::color::Rgba;

    /// Remplit la surface d'un gris qui dépend du temps.
    struct Flat;

    impl Scene for Flat {
        fn render(&mut self, time: f32, target: &mut FrameBuffer) {
            let v = (time * 10.0) as u8;
            target.fill(Rgba::new(v, v, v, 255));
        }

        fn name(&self) -> &'static str {
            "flat"
        }
    }

    #[test]
    fn first_tick_registers_the_target() {
        let state = Arc::new(SharedEffectState::default());
        let mut renderer = SceneRenderer::new(Flat, Arc::clone(&state), 8, 4);
        assert!(state.snapshot().render_target.is_none());

        assert!(renderer.tick(1.0));
        let snap = state.snapshot();
        let target = snap.render_target.as_ref().unwrap();
        assert!(target.same_surface(renderer.target().unwrap()));
        assert_eq!(target.latest().pixel(0, 0), (10, 10, 10, 255));
    }

    #[test]
    fn later_ticks_do_not_republish() {
        let state = Arc::new(SharedEffectState::default());
        let mut renderer = SceneRenderer::new(Flat, Arc::clone(&state), 8, 4);
        renderer.tick(0.0);
        let version = state.version();
        renderer.tick(0.1);
        renderer.tick(0.2);
        assert_eq!(state.version(), version);
        assert_eq!(renderer.frames(), 3);
    }

    #[test]
    fn resize_replaces_and_registers_a_new_surface() {
        let state = Arc::new(SharedEffectState::default());
        let mut renderer = SceneRenderer::new(Flat, Arc::clone(&state), 8, 4);
        renderer.tick(0.0);
        let first = state.snapshot().render_target.clone().unwrap();

        renderer.resize(16, 8);
        renderer.tick(0.0);
        let second = state.snapshot().render_target.clone().unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(second.size(), (16, 8));
        assert_eq!(second.latest().width, 16);
    }

    #[test]
    fn held_frames_are_not_overwritten() {
        let state = Arc::new(SharedEffectState::default());
        let mut renderer = SceneRenderer::new(Flat, Arc::clone(&state), 2, 2);
        renderer.tick(1.0);
        let held = renderer.target().unwrap().latest();
        renderer.tick(2.0);
        renderer.tick(3.0);
        assert_eq!(held.pixel(0, 0), (10, 10, 10, 255));
    }
}
