use std::fs::File;

use anyhow::{Context, Result};
use clap::Parser;
use gg_app::app::App;
use gg_app::cli::{Cli, Overrides};
use gg_app::session::Session;
use gg_app::{export, hotreload};
use gg_atlas::GlyphAtlasBuilder;
use gg_core::config::{AppConfig, load_config};
use gg_render::{BlockGlyphEffect, OrbitScene};

/// Fichier de log quand le TUI occupe le terminal.
const LOG_FILE: &str = "glyphgrid.log";

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = Cli::parse();

    // 2. Initialiser le logging (fichier en mode TUI pour ne pas casser l'écran)
    init_logging(&cli)?;

    // 3. Charger la config + overrides CLI
    let overrides = cli.overrides()?;
    let config = resolve_config(&cli, &overrides)?;
    let fps = config.render.target_fps;

    // 4. Session : état partagé, éditeur d'atlas, scène, effet
    let mut session = Session::new(
        config,
        OrbitScene::default(),
        BlockGlyphEffect::new(),
        GlyphAtlasBuilder::new(),
        cli.background_build,
    )?;

    if let Some(path) = cli.atlas_out.as_deref() {
        session.editor_mut().wait_until_settled(std::time::Duration::from_secs(10));
        export::save_atlas(session.state(), path)?;
    }

    // Export headless
    if let Some(dir) = cli.export.as_deref() {
        let written = export::export_frames(&mut session, dir, cli.frames, fps)?;
        println!("{} frames écrites dans {}", written.len(), dir.display());
        session.dispose();
        return Ok(());
    }

    // 5. Hot-reload config (thread interne notify)
    let (reload_tx, reload_rx) = flume::unbounded();
    let _watcher = if cli.config.exists() {
        Some(hotreload::spawn_config_watcher(&cli.config, overrides, reload_tx)?)
    } else {
        None
    };
    session.watch_reloads(reload_rx);

    // 6. Terminal + boucle principale
    let terminal = ratatui::init();
    let mut app = App::new(session);
    let result = app.run(terminal);

    // 7. Restaurer le terminal (TOUJOURS, même en cas d'erreur)
    ratatui::restore();

    app.into_session().dispose();
    result
}

fn init_logging(cli: &Cli) -> Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn));
    if cli.interactive() {
        let file = File::create(LOG_FILE).with_context(|| format!("Impossible de créer {LOG_FILE}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn resolve_config(cli: &Cli, overrides: &Overrides) -> Result<AppConfig> {
    let mut config = if cli.config.exists() {
        load_config(&cli.config)?
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        AppConfig::default()
    };

    overrides.apply(&mut config);
    Ok(config)
}
