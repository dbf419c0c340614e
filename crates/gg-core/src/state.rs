use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::atlas::GlyphAtlas;
use crate::color::Rgba;
use crate::config::{EffectParameters, clamp_characters_limit, clamp_granularity, clamp_time};
use crate::frame::RenderTargetHandle;

/// Vue immuable et cohérente de l'état partagé.
///
/// Un snapshot n'est jamais modifié : chaque `update` en publie un nouveau.
#[derive(Clone, Debug)]
pub struct EffectSnapshot {
    /// Paramètres d'effet courants.
    pub params: EffectParameters,
    /// Dernier atlas publié (absent au démarrage).
    pub atlas: Option<Arc<GlyphAtlas>>,
    /// Surface de rendu de la scène (absente tant que le rendu n'a pas démarré).
    pub render_target: Option<RenderTargetHandle>,
    /// Incrémenté à chaque publication.
    pub version: u64,
}

/// Mise à jour partielle : seuls les champs `Some` sont fusionnés.
///
/// # Example
/// ```
/// use gg_core::state::{EffectUpdate, SharedEffectState};
/// let state = SharedEffectState::default();
/// state.update(EffectUpdate::new().granularity(12.0).matrix(true));
/// let snap = state.snapshot();
/// assert_eq!(snap.params.granularity, 12.0);
/// assert!(snap.params.matrix);
/// ```
#[derive(Clone, Debug, Default)]
pub struct EffectUpdate {
    pub granularity: Option<f32>,
    pub characters_limit: Option<u32>,
    pub fill_pixels: Option<bool>,
    pub color: Option<Rgba>,
    pub greyscale: Option<bool>,
    pub invert: Option<bool>,
    pub matrix: Option<bool>,
    pub fit: Option<bool>,
    pub time: Option<f32>,
    pub background: Option<Rgba>,
    pub animate_time: Option<bool>,
    pub atlas: Option<Arc<GlyphAtlas>>,
    pub render_target: Option<RenderTargetHandle>,
}

macro_rules! setter {
    ($name:ident: $ty:ty) => {
        #[doc = concat!("Set `", stringify!($name), "`.")]
        #[must_use]
        pub fn $name(mut self, value: $ty) -> Self {
            self.$name = Some(value);
            self
        }
    };
}

impl EffectUpdate {
    /// Empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Update carrying every effect parameter (no atlas, no target).
    #[must_use]
    pub fn from_parameters(p: &EffectParameters) -> Self {
        Self {
            granularity: Some(p.granularity),
            characters_limit: Some(p.characters_limit),
            fill_pixels: Some(p.fill_pixels),
            color: Some(p.color),
            greyscale: Some(p.greyscale),
            invert: Some(p.invert),
            matrix: Some(p.matrix),
            fit: Some(p.fit),
            time: Some(p.time),
            background: Some(p.background),
            animate_time: Some(p.animate_time),
            atlas: None,
            render_target: None,
        }
    }

    setter!(granularity: f32);
    setter!(characters_limit: u32);
    setter!(fill_pixels: bool);
    setter!(color: Rgba);
    setter!(greyscale: bool);
    setter!(invert: bool);
    setter!(matrix: bool);
    setter!(fit: bool);
    setter!(time: f32);
    setter!(background: Rgba);
    setter!(animate_time: bool);
    setter!(atlas: Arc<GlyphAtlas>);
    setter!(render_target: RenderTargetHandle);

    /// `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.granularity.is_none()
            && self.characters_limit.is_none()
            && self.fill_pixels.is_none()
            && self.color.is_none()
            && self.greyscale.is_none()
            && self.invert.is_none()
            && self.matrix.is_none()
            && self.fit.is_none()
            && self.time.is_none()
            && self.background.is_none()
            && self.animate_time.is_none()
            && self.atlas.is_none()
            && self.render_target.is_none()
    }

    /// Merge into `snap`. Numbers are clamped; non-finite floats are dropped.
    fn apply_to(&self, snap: &mut EffectSnapshot) {
        let p = &mut snap.params;
        if let Some(v) = self.granularity {
            if v.is_finite() {
                p.granularity = clamp_granularity(v);
            } else {
                log::warn!("granularity non finie ignorée : {v}");
            }
        }
        if let Some(v) = self.characters_limit {
            p.characters_limit = clamp_characters_limit(v);
        }
        if let Some(v) = self.time {
            if v.is_finite() {
                p.time = clamp_time(v);
            } else {
                log::warn!("time non fini ignoré : {v}");
            }
        }
        if let Some(v) = self.fill_pixels {
            p.fill_pixels = v;
        }
        if let Some(v) = self.color {
            p.color = v;
        }
        if let Some(v) = self.greyscale {
            p.greyscale = v;
        }
        if let Some(v) = self.invert {
            p.invert = v;
        }
        if let Some(v) = self.matrix {
            p.matrix = v;
        }
        if let Some(v) = self.fit {
            p.fit = v;
        }
        if let Some(v) = self.background {
            p.background = v;
        }
        if let Some(v) = self.animate_time {
            p.animate_time = v;
        }
        if let Some(ref atlas) = self.atlas {
            snap.atlas = Some(Arc::clone(atlas));
        }
        if let Some(ref target) = self.render_target {
            snap.render_target = Some(target.clone());
        }
    }
}

/// État partagé de la session : paramètres d'effet, atlas et cible de rendu.
///
/// Point d'entrée unique en écriture (`update`), lecture sans verrou
/// (`snapshot`). Chaque écriture remplace la valeur entière : un lecteur ne
/// voit jamais un jeu de paramètres à moitié mis à jour.
///
/// # Example
/// ```
/// use gg_core::state::{EffectUpdate, SharedEffectState};
/// let state = SharedEffectState::default();
/// let before = state.snapshot();
/// state.update(EffectUpdate::new().granularity(12.0));
/// let after = state.snapshot();
/// assert_eq!(after.params.granularity, 12.0);
/// assert_eq!(after.params.color, before.params.color);
/// assert!(after.version > before.version);
/// ```
pub struct SharedEffectState {
    current: ArcSwap<EffectSnapshot>,
}

impl SharedEffectState {
    /// Start a session with `params` (clamped), no atlas and no render target.
    #[must_use]
    pub fn new(mut params: EffectParameters) -> Self {
        params.clamp_all();
        Self {
            current: ArcSwap::from_pointee(EffectSnapshot {
                params,
                atlas: None,
                render_target: None,
                version: 0,
            }),
        }
    }

    /// Fusionne `partial` dans l'état courant et publie un nouveau snapshot.
    ///
    /// Concurrent writers are retried (read-copy-update), so no field of a
    /// racing update is lost.
    pub fn update(&self, partial: EffectUpdate) {
        if partial.is_empty() {
            return;
        }
        let previous = self.current.rcu(|cur| {
            let mut next = EffectSnapshot::clone(cur);
            partial.apply_to(&mut next);
            next.version = cur.version + 1;
            next
        });
        log::trace!("état d'effet publié après v{}", previous.version);
    }

    /// Current consistent view. Never blocks.
    #[must_use]
    pub fn snapshot(&self) -> Arc<EffectSnapshot> {
        self.current.load_full()
    }

    /// Version of the current snapshot.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.current.load().version
    }
}

impl Default for SharedEffectState {
    fn default() -> Self {
        Self::new(EffectParameters::default())
    }
}
