/// Rendering side of glyphgrid.
///
/// Scene rendering into the shared surface, the effect stage that feeds the
/// image-space effect from the shared state, the reference CPU effect, and
/// the terminal preview (half-block canvas, sidebar, overlays).

pub mod canvas;
pub mod effect;
pub mod fps;
pub mod orbit;
pub mod preview;
pub mod scene;
pub mod stage;
pub mod ui;

pub use effect::BlockGlyphEffect;
pub use orbit::OrbitScene;
pub use scene::SceneRenderer;
pub use stage::{EffectStage, SkipReason, StageOutcome};
