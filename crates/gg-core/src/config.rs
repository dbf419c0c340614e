use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::charset::CharacterSet;
use crate::color::Rgba;
use crate::error::CoreError;

/// Bornes de la granularité (taille d'un bloc, en pixels écran).
pub const GRANULARITY_RANGE: (f32, f32) = (1.0, 256.0);
/// Bornes du nombre de glyphes adressables par l'effet.
pub const CHARACTERS_LIMIT_RANGE: (u32, u32) = (1, 256);
/// Bornes de la taille de police (px).
pub const FONT_SIZE_RANGE: (u32, u32) = (1, 512);
/// Côté max de la texture d'atlas (px).
pub const TEXTURE_SIZE_MAX: u32 = 8192;

/// Police utilisée pour rasteriser l'atlas.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FontSource {
    /// Première police monospace trouvée parmi les chemins système connus.
    #[default]
    System,
    /// Fichier TTF/OTF explicite.
    File(PathBuf),
}

/// Paramètres de génération de l'atlas de glyphes.
///
/// Toute modification d'un champ impose une reconstruction complète.
///
/// # Example
/// ```
/// use gg_core::config::AtlasConfig;
/// let config = AtlasConfig::default();
/// assert_eq!(config.grid_columns, 16);
/// assert_eq!(config.cell_size(), 64);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtlasConfig {
    /// Glyphs in selection order.
    pub characters: CharacterSet,
    /// Font size in pixels.
    pub font_size: u32,
    /// Cells per atlas row/column.
    pub grid_columns: u32,
    /// Side of the square texture in pixels.
    pub texture_size: u32,
    /// Number of glyphs the effect may address.
    pub characters_limit: u32,
    /// Reverse selection order. Resolved by the effect's lookup, never in the raster.
    pub invert: bool,
    /// Font used for rasterization.
    pub font: FontSource,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            characters: CharacterSet::default(),
            font_size: 72,
            grid_columns: 16,
            texture_size: 1024,
            characters_limit: 16,
            invert: false,
            font: FontSource::System,
        }
    }
}

impl AtlasConfig {
    /// Side of one cell in pixels.
    #[must_use]
    pub fn cell_size(&self) -> u32 {
        self.texture_size / self.grid_columns.max(1)
    }

    /// Check the structural invariants of the atlas.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] describing the first violated constraint.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.characters.is_empty() {
            return Err(CoreError::config("jeu de caractères vide"));
        }
        if self.font_size == 0 {
            return Err(CoreError::config("taille de police nulle"));
        }
        if self.characters_limit == 0 {
            return Err(CoreError::config("charactersLimit doit être > 0"));
        }
        if self.grid_columns == 0 {
            return Err(CoreError::config("grille sans colonne"));
        }
        if self.texture_size > TEXTURE_SIZE_MAX {
            return Err(CoreError::config(format!(
                "texture {}px au-delà de {TEXTURE_SIZE_MAX}px",
                self.texture_size
            )));
        }
        if self.texture_size == 0 || self.texture_size % self.grid_columns != 0 {
            return Err(CoreError::config(format!(
                "texture {}px non multiple de {} colonnes",
                self.texture_size, self.grid_columns
            )));
        }
        if self.grid_columns * self.grid_columns < self.characters_limit {
            return Err(CoreError::config(format!(
                "{} cellules pour une limite de {} glyphes",
                self.grid_columns * self.grid_columns,
                self.characters_limit
            )));
        }
        Ok(())
    }

    /// Glyphs that will actually be drawn: the first `characters_limit`.
    #[must_use]
    pub fn drawn_characters(&self) -> CharacterSet {
        self.characters.truncated(self.characters_limit as usize)
    }
}

/// Paramètres consommés par l'effet image à chaque frame.
///
/// # Example
/// ```
/// use gg_core::config::EffectParameters;
/// use gg_core::color::Rgba;
/// let p = EffectParameters::default();
/// assert_eq!(p.granularity, 8.0);
/// assert_eq!(p.color, Rgba::WHITE);
/// assert!(p.fit);
/// ```
#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectParameters {
    /// Côté d'un bloc en pixels (avant mise à l'échelle DPR).
    pub granularity: f32,
    /// Number of atlas glyphs the effect may select from.
    pub characters_limit: u32,
    /// Fill the block background with the source colour.
    pub fill_pixels: bool,
    /// Glyph tint.
    pub color: Rgba,
    /// Tint by luminance instead of source colour.
    pub greyscale: bool,
    /// Reverse brightness → glyph order.
    pub invert: bool,
    /// "Matrix" rain mode.
    pub matrix: bool,
    /// Keep blocks square and centre the grid in the viewport.
    pub fit: bool,
    /// Effect time in seconds.
    pub time: f32,
    /// Background behind glyphs.
    pub background: Rgba,
    /// Advance `time` with the wall clock.
    pub animate_time: bool,
}

impl Default for EffectParameters {
    fn default() -> Self {
        Self {
            granularity: 8.0,
            characters_limit: 16,
            fill_pixels: false,
            color: Rgba::WHITE,
            greyscale: false,
            invert: false,
            matrix: false,
            fit: true,
            time: 0.0,
            background: Rgba::BLACK,
            animate_time: false,
        }
    }
}

impl EffectParameters {
    /// Clamp all numeric fields to their valid ranges.
    pub fn clamp_all(&mut self) {
        self.granularity = clamp_granularity(self.granularity);
        self.characters_limit = clamp_characters_limit(self.characters_limit);
        self.time = clamp_time(self.time);
    }
}

/// Clamp a granularity value.
///
/// # Example
/// ```
/// use gg_core::config::clamp_granularity;
/// assert_eq!(clamp_granularity(0.0), 1.0);
/// assert_eq!(clamp_granularity(12.0), 12.0);
/// ```
#[must_use]
pub fn clamp_granularity(v: f32) -> f32 {
    v.clamp(GRANULARITY_RANGE.0, GRANULARITY_RANGE.1)
}

/// Clamp a characters limit.
#[must_use]
pub fn clamp_characters_limit(v: u32) -> u32 {
    v.clamp(CHARACTERS_LIMIT_RANGE.0, CHARACTERS_LIMIT_RANGE.1)
}

/// Clamp the effect time (never negative).
#[must_use]
pub fn clamp_time(v: f32) -> f32 {
    v.max(0.0)
}

/// Dimensions et cadence du rendu.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    /// Render target width in pixels.
    pub width: u32,
    /// Render target height in pixels.
    pub height: u32,
    /// FPS cible.
    pub target_fps: u32,
    /// Device pixel ratio applied to granularity.
    pub device_pixel_ratio: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            target_fps: 30,
            device_pixel_ratio: 1.0,
        }
    }
}

/// Configuration complète de l'application, hot-rechargeable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppConfig {
    /// Atlas generation.
    pub atlas: AtlasConfig,
    /// Per-frame effect parameters.
    pub effect: EffectParameters,
    /// Render target and pacing.
    pub render: RenderSettings,
}

impl AppConfig {
    /// Clamp all numeric fields and re-establish cross-section invariants.
    ///
    /// `characters_limit` and `invert` are owned by the effect section and
    /// mirrored into the atlas section.
    pub fn clamp_all(&mut self) {
        self.effect.clamp_all();

        let atlas = &mut self.atlas;
        atlas.grid_columns = atlas.grid_columns.clamp(1, 64);
        atlas.font_size = atlas.font_size.clamp(FONT_SIZE_RANGE.0, FONT_SIZE_RANGE.1);
        let cols = atlas.grid_columns;
        atlas.texture_size = (atlas.texture_size.clamp(cols, TEXTURE_SIZE_MAX) / cols) * cols;

        self.effect.characters_limit = self.effect.characters_limit.min(cols * cols);
        atlas.characters_limit = self.effect.characters_limit;
        atlas.invert = self.effect.invert;

        let r = &mut self.render;
        r.width = r.width.clamp(16, 4096);
        r.height = r.height.clamp(16, 4096);
        r.target_fps = r.target_fps.clamp(1, 120);
        r.device_pixel_ratio = r.device_pixel_ratio.clamp(0.5, 4.0);
    }
}

/// Structure TOML intermédiaire, toutes sections optionnelles.
#[derive(Deserialize, Default)]
struct ConfigFile {
    atlas: Option<AtlasSection>,
    effect: Option<EffectSection>,
    render: Option<RenderSection>,
}

#[derive(Deserialize)]
struct AtlasSection {
    characters: Option<String>,
    font_size: Option<u32>,
    font_path: Option<PathBuf>,
    grid_columns: Option<u32>,
    texture_size: Option<u32>,
}

#[derive(Deserialize)]
struct EffectSection {
    granularity: Option<f32>,
    characters_limit: Option<u32>,
    fill_pixels: Option<bool>,
    color: Option<Rgba>,
    greyscale: Option<bool>,
    invert: Option<bool>,
    matrix: Option<bool>,
    fit: Option<bool>,
    time: Option<f32>,
    background: Option<Rgba>,
    animate_time: Option<bool>,
}

#[derive(Deserialize)]
struct RenderSection {
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    device_pixel_ratio: Option<f32>,
}

/// Parse du TOML et fusion avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the TOML is malformed or a value is invalid
/// (empty character set, bad colour).
///
/// # Example
/// ```
/// use gg_core::config::parse_config;
/// let config = parse_config("[effect]\ngranularity = 12\n").unwrap();
/// assert_eq!(config.effect.granularity, 12.0);
/// assert_eq!(config.atlas.font_size, 72);
/// ```
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;
    let mut config = AppConfig::default();

    if let Some(a) = file.atlas {
        if let Some(v) = a.characters {
            config.atlas.characters =
                CharacterSet::new(&v).context("Section [atlas], clé `characters`")?;
        }
        if let Some(v) = a.font_size {
            config.atlas.font_size = v;
        }
        if let Some(v) = a.font_path {
            config.atlas.font = FontSource::File(v);
        }
        if let Some(v) = a.grid_columns {
            config.atlas.grid_columns = v;
        }
        if let Some(v) = a.texture_size {
            config.atlas.texture_size = v;
        }
    }

    if let Some(e) = file.effect {
        let p = &mut config.effect;
        if let Some(v) = e.granularity {
            p.granularity = v;
        }
        if let Some(v) = e.characters_limit {
            p.characters_limit = v;
        }
        if let Some(v) = e.fill_pixels {
            p.fill_pixels = v;
        }
        if let Some(v) = e.color {
            p.color = v;
        }
        if let Some(v) = e.greyscale {
            p.greyscale = v;
        }
        if let Some(v) = e.invert {
            p.invert = v;
        }
        if let Some(v) = e.matrix {
            p.matrix = v;
        }
        if let Some(v) = e.fit {
            p.fit = v;
        }
        if let Some(v) = e.time {
            p.time = v;
        }
        if let Some(v) = e.background {
            p.background = v;
        }
        if let Some(v) = e.animate_time {
            p.animate_time = v;
        }
    }

    if let Some(r) = file.render {
        if let Some(v) = r.width {
            config.render.width = v;
        }
        if let Some(v) = r.height {
            config.render.height = v;
        }
        if let Some(v) = r.target_fps {
            config.render.target_fps = v;
        }
        if let Some(v) = r.device_pixel_ratio {
            config.render.device_pixel_ratio = v;
        }
    }

    config.clamp_all();
    Ok(config)
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Config invalide : {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, {
            let mut d = AppConfig::default();
            d.clamp_all();
            d
        });
        assert_eq!(config.atlas.characters.to_string(), " *,    ./O#SF");
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let toml = r##"
            [atlas]
            characters = "AB"
            font_size = 40

            [effect]
            color = "#ff0000"
            invert = true
            characters_limit = 8
        "##;
        let config = parse_config(toml).unwrap();
        assert_eq!(config.atlas.characters.to_string(), "AB");
        assert_eq!(config.atlas.font_size, 40);
        assert_eq!(config.effect.color, Rgba::new(255, 0, 0, 255));
        assert_eq!(config.effect.background, Rgba::BLACK);
        assert_eq!(config.effect.granularity, 8.0);
        // Mirrored into the atlas section.
        assert!(config.atlas.invert);
        assert_eq!(config.atlas.characters_limit, 8);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let toml = r"
            [atlas]
            grid_columns = 4
            texture_size = 1001

            [effect]
            granularity = -3.0
            characters_limit = 500
            time = -1.0

            [render]
            target_fps = 0
        ";
        let config = parse_config(toml).unwrap();
        assert_eq!(config.effect.granularity, 1.0);
        assert_eq!(config.effect.characters_limit, 16);
        assert_eq!(config.effect.time, 0.0);
        assert_eq!(config.atlas.texture_size, 1000);
        assert_eq!(config.render.target_fps, 1);
        assert!(config.atlas.validate().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse_config("[atlas]\ncharacters = \"\"\n").is_err());
        assert!(parse_config("[effect]\ncolor = \"blue\"\n").is_err());
        assert!(parse_config("[effect\n").is_err());
    }

    #[test]
    fn validate_reports_each_violation() {
        let base = AtlasConfig::default();
        let bad = [
            AtlasConfig {
                font_size: 0,
                ..base.clone()
            },
            AtlasConfig {
                characters_limit: 0,
                ..base.clone()
            },
            AtlasConfig {
                texture_size: 1000,
                ..base.clone()
            },
            AtlasConfig {
                grid_columns: 2,
                texture_size: 64,
                ..base.clone()
            },
            // 65536² déborde un u32.
            AtlasConfig {
                texture_size: 65_536,
                grid_columns: 16,
                ..base.clone()
            },
        ];
        for config in &bad {
            assert!(matches!(config.validate(), Err(CoreError::Config(_))));
        }
    }

    #[test]
    fn drawn_characters_respect_limit() {
        let c = AtlasConfig {
            characters: CharacterSet::new("abcdefgh").unwrap(),
            characters_limit: 3,
            ..AtlasConfig::default()
        };
        assert_eq!(c.drawn_characters().to_string(), "abc");
    }

    #[test]
    fn load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glyphgrid.toml");
        std::fs::write(&path, "[render]\nwidth = 320\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.render.width, 320);
        assert!(load_config(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn shipped_default_config_matches_defaults() {
        let config = parse_config(include_str!("../../../config/default.toml")).unwrap();
        let mut expected = AppConfig::default();
        expected.clamp_all();
        assert_eq!(config, expected);
    }
}
