use std::sync::Arc;
use std::time::{Duration, Instant};

use gg_core::{AtlasConfig, CharacterSet, CoreError, EffectUpdate, FontSource, GlyphAtlas, SharedEffectState};

use crate::builder::GlyphAtlasBuilder;
use crate::worker::{AtlasWorker, BuildOutcome};

/// Cycle de vie de l'atlas géré par l'[`AtlasEditor`].
///
/// ```text
/// Uninitialized ──build──▶ Building ──ok──▶ Ready ──edit──▶ Building
///        ▲                     │                              │
///        └──────échec──────────┘ (Ready si un atlas existe) ◀─┘
/// ```
/// `Disposed` est terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtlasLifecycle {
    /// No atlas published yet.
    Uninitialized,
    /// A build is in flight.
    Building,
    /// An atlas is published and up to date (or the last build failed and
    /// the previous atlas is still in use).
    Ready,
    /// Session torn down.
    Disposed,
}

enum Mode {
    Inline(GlyphAtlasBuilder),
    Background(AtlasWorker),
    Closed,
}

enum Dispatch {
    Built(Result<GlyphAtlas, CoreError>),
    Queued(Result<(), CoreError>),
}

/// Propriétaire de la config d'atlas : chaque édition reconstruit un atlas
/// complet et le publie dans l'état partagé.
///
/// En mode inline la construction a lieu dans l'appel d'édition. En mode
/// background elle part sur un [`AtlasWorker`] et [`AtlasEditor::poll`]
/// publie le résultat : seul le résultat de la génération la plus récente
/// est publié, les autres sont jetés.
pub struct AtlasEditor {
    config: AtlasConfig,
    /// Config de l'atlas actuellement publié.
    published_config: Option<AtlasConfig>,
    state: Arc<SharedEffectState>,
    mode: Mode,
    lifecycle: AtlasLifecycle,
    has_atlas: bool,
    requested: u64,
    published: u64,
    discarded: u64,
    last_error: Option<CoreError>,
}

impl AtlasEditor {
    /// Editor building synchronously inside each edit call.
    ///
    /// Nothing is built until the first edit or [`AtlasEditor::rebuild`].
    #[must_use]
    pub fn new(config: AtlasConfig, state: Arc<SharedEffectState>, builder: GlyphAtlasBuilder) -> Self {
        Self::with_mode(config, state, Mode::Inline(builder))
    }

    /// Editor building on a dedicated thread.
    ///
    /// # Errors
    /// [`CoreError::RenderBackend`] if the worker thread cannot be spawned.
    pub fn in_background(
        config: AtlasConfig,
        state: Arc<SharedEffectState>,
        builder: GlyphAtlasBuilder,
    ) -> Result<Self, CoreError> {
        let worker = AtlasWorker::spawn(builder)
            .map_err(|e| CoreError::backend(format!("thread atlas : {e}")))?;
        Ok(Self::with_mode(config, state, Mode::Background(worker)))
    }

    fn with_mode(config: AtlasConfig, state: Arc<SharedEffectState>, mode: Mode) -> Self {
        Self {
            config,
            published_config: None,
            state,
            mode,
            lifecycle: AtlasLifecycle::Uninitialized,
            has_atlas: false,
            requested: 0,
            published: 0,
            discarded: 0,
            last_error: None,
        }
    }

    /// Config of the most recent accepted edit. Rolled back to the published
    /// config when that edit's build fails.
    #[must_use]
    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    #[must_use]
    pub fn lifecycle(&self) -> AtlasLifecycle {
        self.lifecycle
    }

    /// `true` when builds run on the worker thread.
    #[must_use]
    pub fn is_background(&self) -> bool {
        matches!(self.mode, Mode::Background(_))
    }

    /// Generation of the last accepted edit.
    #[must_use]
    pub fn requested_generation(&self) -> u64 {
        self.requested
    }

    /// Generation of the atlas currently published (0 = none).
    #[must_use]
    pub fn published_generation(&self) -> u64 {
        self.published
    }

    /// Results thrown away because a newer edit superseded them.
    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Error of the last failed build, cleared by the next success.
    #[must_use]
    pub fn last_error(&self) -> Option<&CoreError> {
        self.last_error.as_ref()
    }

    /// Build (or rebuild) the atlas from the current config.
    ///
    /// # Errors
    /// Same as the setters.
    pub fn rebuild(&mut self) -> Result<(), CoreError> {
        let config = self.config.clone();
        self.submit(config)
    }

    /// Remplace le jeu de caractères.
    ///
    /// # Errors
    /// [`CoreError::Config`] if `text` is empty or the editor is disposed;
    /// in inline mode, any build error.
    pub fn set_characters(&mut self, text: &str) -> Result<(), CoreError> {
        let characters = CharacterSet::new(text)?;
        self.edit(|c| c.characters = characters)
    }

    /// # Errors
    /// See [`AtlasEditor::set_characters`].
    pub fn set_font_size(&mut self, font_size: u32) -> Result<(), CoreError> {
        self.edit(|c| c.font_size = font_size)
    }

    /// # Errors
    /// See [`AtlasEditor::set_characters`].
    pub fn set_characters_limit(&mut self, limit: u32) -> Result<(), CoreError> {
        self.edit(|c| c.characters_limit = limit)
    }

    /// Inverse l'ordre de sélection. Reconstruit l'atlas comme toute édition.
    ///
    /// # Errors
    /// See [`AtlasEditor::set_characters`].
    pub fn set_invert(&mut self, invert: bool) -> Result<(), CoreError> {
        self.edit(|c| c.invert = invert)
    }

    /// # Errors
    /// See [`AtlasEditor::set_characters`].
    pub fn set_font(&mut self, font: FontSource) -> Result<(), CoreError> {
        self.edit(|c| c.font = font)
    }

    /// Replace the whole config (hot reload). No-op if nothing changed, an
    /// atlas already exists and the last build succeeded.
    ///
    /// # Errors
    /// See [`AtlasEditor::set_characters`].
    pub fn apply_config(&mut self, config: AtlasConfig) -> Result<(), CoreError> {
        self.ensure_open()?;
        if self.is_current(&config) {
            return Ok(());
        }
        self.submit(config)
    }

    fn edit(&mut self, mutate: impl FnOnce(&mut AtlasConfig)) -> Result<(), CoreError> {
        self.ensure_open()?;
        let mut next = self.config.clone();
        mutate(&mut next);
        if self.is_current(&next) {
            return Ok(());
        }
        self.submit(next)
    }

    /// `true` if `config` is already published, or queued behind a build
    /// that has not failed.
    fn is_current(&self, config: &AtlasConfig) -> bool {
        self.has_atlas && self.last_error.is_none() && *config == self.config
    }

    fn ensure_open(&self) -> Result<(), CoreError> {
        if self.lifecycle == AtlasLifecycle::Disposed {
            return Err(CoreError::config("éditeur d'atlas fermé"));
        }
        Ok(())
    }

    fn submit(&mut self, config: AtlasConfig) -> Result<(), CoreError> {
        self.ensure_open()?;
        config.validate()?;

        self.config = config.clone();
        self.requested += 1;
        let generation = self.requested;
        self.lifecycle = AtlasLifecycle::Building;

        let dispatch = match &mut self.mode {
            Mode::Inline(builder) => Dispatch::Built(
                builder
                    .build(&config)
                    .map(|atlas| atlas.with_generation(generation)),
            ),
            Mode::Background(worker) => Dispatch::Queued(worker.request(generation, config.clone())),
            Mode::Closed => Dispatch::Queued(Err(CoreError::config("éditeur d'atlas fermé"))),
        };

        match dispatch {
            Dispatch::Built(result) => self.finish(generation, &config, result),
            Dispatch::Queued(Ok(())) => Ok(()),
            Dispatch::Queued(Err(e)) => self.finish(generation, &config, Err(e)),
        }
    }

    /// Publish finished background builds. Call once per frame.
    ///
    /// Returns `true` if a new atlas was published.
    pub fn poll(&mut self) -> bool {
        let outcomes = match &self.mode {
            Mode::Background(worker) => worker.drain(),
            Mode::Inline(_) | Mode::Closed => return false,
        };
        let mut published = false;
        for outcome in outcomes {
            published |= self.handle(outcome);
        }
        published
    }

    /// Bloque jusqu'à ce que la dernière génération demandée soit traitée.
    ///
    /// Returns `true` if the latest requested generation is published.
    pub fn wait_until_settled(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.lifecycle == AtlasLifecycle::Building {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let outcome = match &self.mode {
                Mode::Background(worker) => worker.recv_timeout(remaining),
                Mode::Inline(_) | Mode::Closed => None,
            };
            match outcome {
                Some(outcome) => {
                    self.handle(outcome);
                }
                None => break,
            }
        }
        self.published == self.requested && self.has_atlas
    }

    fn handle(&mut self, outcome: BuildOutcome) -> bool {
        if self.lifecycle == AtlasLifecycle::Disposed {
            return false;
        }
        if outcome.generation < self.requested {
            self.discarded += 1;
            log::debug!(
                "atlas g{} jeté (g{} demandé)",
                outcome.generation,
                self.requested
            );
            return false;
        }
        self.finish(outcome.generation, &outcome.config, outcome.result)
            .is_ok()
    }

    fn finish(
        &mut self,
        generation: u64,
        config: &AtlasConfig,
        result: Result<GlyphAtlas, CoreError>,
    ) -> Result<(), CoreError> {
        match result {
            Ok(atlas) => {
                let glyphs = atlas.glyph_count();
                // Limite et inversion publiées avec l'atlas qui leur correspond.
                self.state.update(
                    EffectUpdate::new()
                        .atlas(Arc::new(atlas))
                        .characters_limit(config.characters_limit)
                        .invert(config.invert),
                );
                self.published = generation;
                self.published_config = Some(config.clone());
                self.has_atlas = true;
                self.lifecycle = AtlasLifecycle::Ready;
                self.last_error = None;
                log::info!("Atlas g{generation} publié : {glyphs} glyphes");
                Ok(())
            }
            Err(err) => {
                if self.last_error.as_ref() != Some(&err) {
                    log::error!("Échec de construction de l'atlas g{generation} : {err}");
                }
                self.last_error = Some(err.clone());
                // La config exposée reste celle de l'atlas visible.
                if let Some(published) = &self.published_config {
                    self.config.clone_from(published);
                }
                self.lifecycle = if self.has_atlas {
                    AtlasLifecycle::Ready
                } else {
                    AtlasLifecycle::Uninitialized
                };
                Err(err)
            }
        }
    }

    /// Tear down: stop the worker and refuse further edits.
    ///
    /// The last published atlas stays in the shared state for readers that
    /// still hold it.
    pub fn dispose(&mut self) {
        if self.lifecycle == AtlasLifecycle::Disposed {
            return;
        }
        self.mode = Mode::Closed;
        self.lifecycle = AtlasLifecycle::Disposed;
        log::debug!("éditeur d'atlas fermé");
    }
}

impl Drop for AtlasEditor {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::raster::{GlyphBitmap, GlyphRasterizer};
    use gg_core::EffectParameters;

    /// Un pixel plein au centre de chaque glyphe non blanc.
    struct DotRasterizer;

    impl GlyphRasterizer for DotRasterizer {
        fn rasterize(&self, ch: char, _font_size: f32) -> Option<GlyphBitmap> {
            if ch == ' ' {
                return Some(GlyphBitmap::empty());
            }
            Some(GlyphBitmap {
                width: 1,
                height: 1,
                left: 0,
                top: 0,
                coverage: vec![255],
            })
        }

        fn name(&self) -> &'static str {
            "dot"
        }
    }

    /// Police système = points, fichier = introuvable.
    fn dot_or_missing(source: &FontSource) -> Result<Arc<dyn GlyphRasterizer>, CoreError> {
        match source {
            FontSource::System => Ok(Arc::new(DotRasterizer)),
            FontSource::File(path) => Err(CoreError::FileNotFound {
                path: path.display().to_string(),
            }),
        }
    }

    fn small_config() -> AtlasConfig {
        AtlasConfig {
            characters: CharacterSet::new("AB").unwrap(),
            texture_size: 64,
            grid_columns: 4,
            characters_limit: 4,
            ..AtlasConfig::default()
        }
    }

    fn inline_editor() -> (AtlasEditor, Arc<SharedEffectState>) {
        let state = Arc::new(SharedEffectState::new(EffectParameters::default()));
        let editor = AtlasEditor::new(
            small_config(),
            Arc::clone(&state),
            GlyphAtlasBuilder::with_loader(dot_or_missing),
        );
        (editor, state)
    }

    fn published_characters(state: &SharedEffectState) -> Option<String> {
        state
            .snapshot()
            .atlas
            .as_ref()
            .map(|a| a.characters().to_string())
    }

    #[test]
    fn nothing_is_published_before_the_first_build() {
        let (editor, state) = inline_editor();
        assert_eq!(editor.lifecycle(), AtlasLifecycle::Uninitialized);
        assert!(state.snapshot().atlas.is_none());
    }

    #[test]
    fn edit_publishes_atlas_with_linked_parameters() {
        let (mut editor, state) = inline_editor();
        editor.rebuild().unwrap();
        editor.set_characters_limit(2).unwrap();
        editor.set_invert(true).unwrap();

        let snap = state.snapshot();
        let atlas = snap.atlas.as_ref().unwrap();
        assert_eq!(atlas.generation(), 3);
        assert_eq!(snap.params.characters_limit, 2);
        assert!(snap.params.invert);
        assert_eq!(editor.lifecycle(), AtlasLifecycle::Ready);
        assert_eq!(editor.published_generation(), 3);
    }

    #[test]
    fn unchanged_edit_does_not_rebuild() {
        let (mut editor, state) = inline_editor();
        editor.set_characters("XY").unwrap();
        let version = state.version();
        editor.set_characters("XY").unwrap();
        assert_eq!(state.version(), version);
        assert_eq!(editor.requested_generation(), 1);
    }

    #[test]
    fn invalid_edit_is_rejected_without_side_effects() {
        let (mut editor, state) = inline_editor();
        editor.rebuild().unwrap();
        let version = state.version();

        assert!(matches!(editor.set_characters(""), Err(CoreError::Config(_))));
        assert!(matches!(editor.set_characters_limit(0), Err(CoreError::Config(_))));
        assert_eq!(editor.config(), &small_config());
        assert_eq!(state.version(), version);
        assert_eq!(editor.lifecycle(), AtlasLifecycle::Ready);
    }

    #[test]
    fn failed_build_keeps_the_last_good_atlas() {
        let (mut editor, state) = inline_editor();
        editor.set_characters("ok").unwrap();

        let err = editor.set_font(FontSource::File("/absent/font.ttf".into()));
        assert!(matches!(err, Err(CoreError::FileNotFound { .. })));
        assert_eq!(editor.lifecycle(), AtlasLifecycle::Ready);
        assert_eq!(published_characters(&state).as_deref(), Some("ok"));
        assert!(editor.last_error().is_some());

        editor.set_font(FontSource::System).unwrap();
        assert!(editor.last_error().is_none());
    }

    static FLAKY_FAILED: AtomicBool = AtomicBool::new(false);

    /// Le premier chargement d'un fichier échoue, les suivants réussissent.
    fn flaky_file(source: &FontSource) -> Result<Arc<dyn GlyphRasterizer>, CoreError> {
        match source {
            FontSource::File(_) if !FLAKY_FAILED.swap(true, Ordering::SeqCst) => {
                Err(CoreError::backend("lecture interrompue"))
            }
            _ => Ok(Arc::new(DotRasterizer)),
        }
    }

    #[test]
    fn retrying_a_failed_edit_rebuilds() {
        let state = Arc::new(SharedEffectState::default());
        let mut editor = AtlasEditor::new(small_config(), Arc::clone(&state), GlyphAtlasBuilder::with_loader(flaky_file));
        editor.rebuild().unwrap();

        let font = FontSource::File("/fonts/mono.ttf".into());
        assert!(matches!(editor.set_font(font.clone()), Err(CoreError::RenderBackend(_))));
        // La config exposée est celle de l'atlas encore visible.
        assert_eq!(editor.config(), &small_config());
        assert_eq!(editor.published_generation(), 1);

        editor.set_font(font.clone()).unwrap();
        assert_eq!(editor.requested_generation(), 3);
        assert_eq!(editor.published_generation(), 3);
        assert_eq!(editor.config().font, font);
        assert!(editor.last_error().is_none());
        assert_eq!(editor.lifecycle(), AtlasLifecycle::Ready);
    }

    #[test]
    fn failed_first_build_stays_uninitialized() {
        let state = Arc::new(SharedEffectState::default());
        let config = AtlasConfig {
            font: FontSource::File("/absent/font.ttf".into()),
            ..small_config()
        };
        let mut editor = AtlasEditor::new(config, Arc::clone(&state), GlyphAtlasBuilder::with_loader(dot_or_missing));
        assert!(editor.rebuild().is_err());
        assert_eq!(editor.lifecycle(), AtlasLifecycle::Uninitialized);
        assert!(state.snapshot().atlas.is_none());
    }

    #[test]
    fn disposed_editor_refuses_edits() {
        let (mut editor, state) = inline_editor();
        editor.rebuild().unwrap();
        editor.dispose();
        assert_eq!(editor.lifecycle(), AtlasLifecycle::Disposed);
        assert!(editor.set_characters("Z").is_err());
        // Le dernier atlas reste lisible.
        assert!(state.snapshot().atlas.is_some());
    }

    #[test]
    fn disposed_editor_rejects_unchanged_edits() {
        let (mut editor, state) = inline_editor();
        editor.rebuild().unwrap();
        let version = state.version();
        editor.dispose();
        assert!(matches!(editor.set_characters("AB"), Err(CoreError::Config(_))));
        assert!(matches!(editor.apply_config(small_config()), Err(CoreError::Config(_))));
        assert_eq!(state.version(), version);
    }

    /// Bloque chaque rasterisation jusqu'à réception d'un jeton.
    struct GatedRasterizer {
        entered: flume::Sender<char>,
        release: flume::Receiver<()>,
    }

    impl GlyphRasterizer for GatedRasterizer {
        fn rasterize(&self, ch: char, font_size: f32) -> Option<GlyphBitmap> {
            let _ = self.entered.send(ch);
            let _ = self.release.recv();
            DotRasterizer.rasterize(ch, font_size)
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    #[test]
    fn background_build_publishes_only_the_latest_generation() {
        let (entered_tx, entered_rx) = flume::unbounded();
        let (release_tx, release_rx) = flume::unbounded();
        let gated = GatedRasterizer {
            entered: entered_tx,
            release: release_rx,
        };
        let state = Arc::new(SharedEffectState::default());
        let mut editor = AtlasEditor::in_background(
            small_config(),
            Arc::clone(&state),
            GlyphAtlasBuilder::with_rasterizer(Arc::new(gated)),
        )
        .unwrap();
        assert!(editor.is_background());

        editor.set_characters("A").unwrap();
        // g1 est en cours de rasterisation quand g2 est demandée.
        assert_eq!(entered_rx.recv_timeout(Duration::from_secs(5)), Ok('A'));
        editor.set_characters("B").unwrap();
        assert_eq!(editor.lifecycle(), AtlasLifecycle::Building);

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while editor.published_generation() < 2 && Instant::now() < deadline {
            editor.poll();
            // g1 ne doit jamais être visible.
            assert_ne!(published_characters(&state).as_deref(), Some("A"));
            std::thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(editor.published_generation(), 2);
        assert_eq!(editor.discarded(), 1);
        assert_eq!(published_characters(&state).as_deref(), Some("B"));
        assert_eq!(editor.lifecycle(), AtlasLifecycle::Ready);
    }

    #[test]
    fn wait_until_settled_blocks_for_the_worker() {
        let state = Arc::new(SharedEffectState::default());
        let mut editor = AtlasEditor::in_background(
            small_config(),
            Arc::clone(&state),
            GlyphAtlasBuilder::with_rasterizer(Arc::new(DotRasterizer)),
        )
        .unwrap();
        editor.rebuild().unwrap();
        assert!(editor.wait_until_settled(Duration::from_secs(5)));
        assert_eq!(published_characters(&state).as_deref(), Some("AB"));
    }
}
