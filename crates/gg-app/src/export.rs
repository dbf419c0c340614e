use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use gg_core::frame::FrameBuffer;
use gg_core::state::SharedEffectState;
use gg_core::traits::{ImageEffect, Scene};
use gg_render::stage::StageOutcome;

use crate::session::Session;

/// Temps max d'attente d'un atlas construit en fond avant l'export.
const ATLAS_TIMEOUT: Duration = Duration::from_secs(10);

/// Écrit un `FrameBuffer` RGBA en PNG.
///
/// # Errors
/// Returns an error if the buffer is inconsistent or the file cannot be written.
pub fn save_png(frame: &FrameBuffer, path: &Path) -> Result<()> {
    let img = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .with_context(|| format!("Buffer {}x{} incohérent", frame.width, frame.height))?;
    img.save(path)
        .with_context(|| format!("Impossible d'écrire {}", path.display()))?;
    Ok(())
}

/// Dump the published atlas (white glyphs, coverage in alpha) as PNG.
///
/// # Errors
/// Returns an error if no atlas is published or the file cannot be written.
pub fn save_atlas(state: &SharedEffectState, path: &Path) -> Result<()> {
    let snap = state.snapshot();
    let Some(atlas) = snap.atlas.as_ref() else {
        bail!("Aucun atlas publié");
    };
    save_png(&atlas.to_frame(), path)?;
    log::info!(
        "Atlas g{} exporté : {} ({} glyphes)",
        atlas.generation(),
        path.display(),
        atlas.glyph_count()
    );
    Ok(())
}

/// Export headless : `frames` images PNG à pas de temps fixe (1 / `fps`).
///
/// Les fichiers sont nommés `frame_00000.png`, `frame_00001.png`...
/// Returns the written paths.
///
/// # Errors
/// Returns an error if no atlas could be built, or on I/O failure.
pub fn export_frames<S: Scene, E: ImageEffect>(
    session: &mut Session<S, E>,
    out_dir: &Path,
    frames: u32,
    fps: u32,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Impossible de créer {}", out_dir.display()))?;

    if !session.editor_mut().wait_until_settled(ATLAS_TIMEOUT) && session.state().snapshot().atlas.is_none() {
        match session.editor().last_error() {
            Some(e) => bail!("Aucun atlas disponible : {e}"),
            None => bail!("Aucun atlas disponible après {}s", ATLAS_TIMEOUT.as_secs()),
        }
    }

    let dt = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
    let mut written = Vec::with_capacity(frames as usize);
    for i in 0..frames {
        match session.advance(dt) {
            StageOutcome::Rendered => {
                let path = out_dir.join(format!("frame_{i:05}.png"));
                save_png(session.output(), &path)?;
                written.push(path);
            }
            StageOutcome::Skipped(reason) => log::warn!("frame {i} sautée : {reason:?}"),
        }
    }
    log::info!("{} frames exportées dans {}", written.len(), out_dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use gg_atlas::{GlyphAtlasBuilder, GlyphBitmap, GlyphRasterizer};
    use gg_core::color::Rgba;
    use gg_core::config::AppConfig;
    use gg_core::CharacterSet;
    use gg_render::effect::BlockGlyphEffect;

    struct Square;

    impl GlyphRasterizer for Square {
        fn rasterize(&self, ch: char, _font_size: f32) -> Option<GlyphBitmap> {
            (ch != ' ').then(|| GlyphBitmap {
                width: 2,
                height: 2,
                left: -1,
                top: -1,
                coverage: vec![255; 4],
            })
        }

        fn name(&self) -> &'static str {
            "square"
        }
    }

    struct White;

    impl Scene for White {
        fn render(&mut self, _time: f32, target: &mut FrameBuffer) {
            target.fill(Rgba::WHITE);
        }

        fn name(&self) -> &'static str {
            "white"
        }
    }

    fn session() -> Session<White, BlockGlyphEffect> {
        let mut config = AppConfig::default();
        config.atlas.characters = CharacterSet::new(" .#").unwrap();
        config.atlas.grid_columns = 4;
        config.atlas.texture_size = 32;
        config.effect.characters_limit = 3;
        config.render.width = 24;
        config.render.height = 16;
        Session::new(
            config,
            White,
            BlockGlyphEffect::new(),
            GlyphAtlasBuilder::with_rasterizer(Arc::new(Square)),
            false,
        )
        .unwrap()
    }

    #[test]
    fn png_round_trips_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.png");
        let mut fb = FrameBuffer::new(5, 3);
        fb.set_pixel(1, 1, Rgba::new(10, 20, 30, 255));
        save_png(&fb, &path).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (5, 3));
        assert_eq!(img.get_pixel(1, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn atlas_dump_has_texture_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atlas.png");
        let s = session();
        save_atlas(s.state(), &path).unwrap();
        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (32, 32));
    }

    #[test]
    fn atlas_dump_without_atlas_fails() {
        let dir = tempfile::tempdir().unwrap();
        let state = SharedEffectState::default();
        assert!(save_atlas(&state, &dir.path().join("a.png")).is_err());
    }

    #[test]
    fn export_writes_one_png_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("frames");
        let mut s = session();
        let written = export_frames(&mut s, &out, 3, 30).unwrap();
        assert_eq!(written.len(), 3);
        assert!(out.join("frame_00002.png").exists());
        let img = image::open(&written[0]).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (24, 16));
    }
}
