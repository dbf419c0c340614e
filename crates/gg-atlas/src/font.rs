use std::path::Path;
use std::sync::Arc;

use gg_core::{CoreError, FontSource};

use crate::raster::{AbGlyphRasterizer, GlyphRasterizer};

/// Polices monospace essayées, dans l'ordre, pour [`FontSource::System`].
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/liberation-mono/LiberationMono-Regular.ttf",
    "/usr/share/fonts/truetype/ubuntu/UbuntuMono-R.ttf",
    "/usr/share/fonts/noto/NotoSansMono-Regular.ttf",
    "/System/Library/Fonts/Menlo.ttc",
    "/System/Library/Fonts/Monaco.ttf",
    "/Library/Fonts/Courier New.ttf",
    "C:\\Windows\\Fonts\\consola.ttf",
    "C:\\Windows\\Fonts\\cour.ttf",
];

/// Charge le rasterizer correspondant à `source`.
///
/// # Errors
/// [`CoreError::FileNotFound`] if an explicit font file is missing,
/// [`CoreError::RenderBackend`] if it cannot be read or parsed, or if no
/// system monospace font is available.
pub fn load_rasterizer(source: &FontSource) -> Result<Arc<dyn GlyphRasterizer>, CoreError> {
    match source {
        FontSource::File(path) => Ok(Arc::new(load_file(path)?)),
        FontSource::System => {
            for candidate in SYSTEM_FONT_CANDIDATES {
                let path = Path::new(candidate);
                if !path.exists() {
                    continue;
                }
                match load_file(path) {
                    Ok(r) => {
                        log::info!("Police système : {}", r.label());
                        return Ok(Arc::new(r));
                    }
                    Err(e) => log::debug!("Police ignorée {candidate} : {e}"),
                }
            }
            Err(CoreError::backend(format!(
                "aucune police monospace système trouvée ({} chemins essayés)",
                SYSTEM_FONT_CANDIDATES.len()
            )))
        }
    }
}

fn load_file(path: &Path) -> Result<AbGlyphRasterizer, CoreError> {
    if !path.exists() {
        return Err(CoreError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let data = std::fs::read(path)
        .map_err(|e| CoreError::backend(format!("lecture de {} : {e}", path.display())))?;
    AbGlyphRasterizer::from_bytes(data, path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_reported() {
        let source = FontSource::File("/nonexistent/glyphgrid/font.ttf".into());
        let err = load_rasterizer(&source).err();
        assert!(matches!(err, Some(CoreError::FileNotFound { .. })));
    }

    #[test]
    fn non_font_file_is_a_backend_error() {
        let path = std::env::temp_dir().join(format!("gg-not-a-font-{}.ttf", std::process::id()));
        std::fs::write(&path, b"definitely not a font").unwrap();
        let err = load_rasterizer(&FontSource::File(path.clone())).err();
        let _ = std::fs::remove_file(&path);
        assert!(matches!(err, Some(CoreError::RenderBackend(_))));
    }
}
