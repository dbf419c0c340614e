use std::path::Path;

use anyhow::Result;
use gg_core::config::{AppConfig, load_config};
use notify::{Event, EventKind, RecursiveMode, Watcher};

use crate::cli::Overrides;

/// Relit `path` et réapplique les overrides CLI par-dessus.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn reload_config(path: &Path, overrides: &Overrides) -> Result<AppConfig> {
    let mut config = load_config(path)?;
    overrides.apply(&mut config);
    Ok(config)
}

/// Surveille le fichier config et envoie chaque version rechargée sur `tx`.
///
/// Les `overrides` de la ligne de commande gardent la priorité sur le fichier.
/// La boucle de frame applique les configs reçues ; une config invalide est
/// loggée et ignorée, l'état courant reste en place.
/// Retourne le Watcher (doit rester vivant tant que l'app tourne).
///
/// # Errors
/// Returns an error if the watcher cannot be created or the path cannot be watched.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use gg_app::cli::Overrides;
/// use gg_app::hotreload::spawn_config_watcher;
///
/// let (tx, rx) = flume::unbounded();
/// let _watcher = spawn_config_watcher(Path::new("config/default.toml"), Overrides::default(), tx);
/// # drop(rx);
/// ```
pub fn spawn_config_watcher(
    config_path: &Path,
    overrides: Overrides,
    tx: flume::Sender<AppConfig>,
) -> Result<impl Watcher + use<>> {
    let path = config_path.to_path_buf();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let Ok(event) = res else {
            return;
        };
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return;
        }
        match reload_config(&path, &overrides) {
            Ok(config) => {
                log::info!("Config rechargée depuis {}", path.display());
                if tx.send(config).is_err() {
                    log::debug!("boucle principale arrêtée, rechargement ignoré");
                }
            }
            // On garde l'ancienne config. Pas de panic.
            Err(e) => log::warn!("Erreur de rechargement config : {e:#}"),
        }
    })?;

    watcher.watch(config_path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gg_core::CharacterSet;

    #[test]
    fn reload_keeps_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glyphgrid.toml");
        std::fs::write(
            &path,
            "[atlas]\ncharacters = \"abc\"\nfont_size = 48\n\n[effect]\ngranularity = 4.0\n",
        )
        .unwrap();
        let overrides = Overrides {
            characters: Some(CharacterSet::new(" .#").unwrap()),
            granularity: Some(12.0),
            ..Overrides::default()
        };

        let config = reload_config(&path, &overrides).unwrap();
        assert_eq!(config.atlas.characters.to_string(), " .#");
        assert_eq!(config.effect.granularity, 12.0);
        assert_eq!(config.atlas.font_size, 48);
    }

    #[test]
    fn unreadable_reload_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(reload_config(&dir.path().join("absent.toml"), &Overrides::default()).is_err());
    }
}
