use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gg_core::config::{AppConfig, FontSource};
use gg_core::CharacterSet;

/// glyphgrid : rendu 3D post-traité en art ASCII par atlas de glyphes.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Jeu de caractères, du plus sombre au plus clair.
    #[arg(long)]
    pub characters: Option<String>,

    /// Police TTF/OTF (défaut : première police monospace système).
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Taille de police de l'atlas, en pixels.
    #[arg(long)]
    pub font_size: Option<u32>,

    /// Taille d'un bloc en pixels écran.
    #[arg(long)]
    pub granularity: Option<f32>,

    /// Export PNG headless dans ce dossier (pas de TUI).
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Nombre de frames à exporter avec --export.
    #[arg(long, default_value_t = 60)]
    pub frames: u32,

    /// Écrire l'atlas en PNG puis continuer.
    #[arg(long)]
    pub atlas_out: Option<PathBuf>,

    /// Construire l'atlas sur un thread dédié.
    #[arg(long, default_value_t = false)]
    pub background_build: bool,

    /// FPS cible.
    #[arg(long)]
    pub fps: Option<u32>,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Cli {
    /// `true` when the terminal UI will run (logs must not go to stderr).
    #[must_use]
    pub fn interactive(&self) -> bool {
        self.export.is_none()
    }

    /// Overrides de la ligne de commande, validés une fois au démarrage.
    ///
    /// # Errors
    /// Returns an error if `--characters` is empty.
    pub fn overrides(&self) -> Result<Overrides> {
        let characters = self
            .characters
            .as_deref()
            .map(CharacterSet::new)
            .transpose()
            .context("--characters")?;
        Ok(Overrides {
            characters,
            font: self.font.clone(),
            font_size: self.font_size,
            granularity: self.granularity,
            fps: self.fps,
        })
    }
}

/// Valeurs CLI qui priment sur le fichier config, au chargement comme à
/// chaque rechargement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overrides {
    pub characters: Option<CharacterSet>,
    pub font: Option<PathBuf>,
    pub font_size: Option<u32>,
    pub granularity: Option<f32>,
    pub fps: Option<u32>,
}

impl Overrides {
    /// Écrase les champs fournis puis re-clampe toute la config.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(ref chars) = self.characters {
            config.atlas.characters = chars.clone();
        }
        if let Some(ref path) = self.font {
            config.atlas.font = FontSource::File(path.clone());
        }
        if let Some(size) = self.font_size {
            config.atlas.font_size = size;
        }
        if let Some(g) = self.granularity {
            config.effect.granularity = g;
        }
        if let Some(fps) = self.fps {
            config.render.target_fps = fps;
        }
        config.clamp_all();
    }
}
