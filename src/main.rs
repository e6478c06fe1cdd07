use clap::Parser;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use xfolder::{
    autostart::{self, platform_registrar, AutostartRegistrar},
    cli::{Cli, OutputFormat},
    ConfigStore, MoveEvent, MoveExecutor, MoveOutcome, WatchError, WatchSession,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(err) = cli.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    cli.setup_logging();

    let store = ConfigStore::open(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    let registrar = platform_registrar();
    apply_cli_edits(&cli, &store, registrar.as_ref())?;

    // An explicit --start-with-system has already registered or unregistered.
    if cli.start_with_system.is_none() {
        if let Err(err) = autostart::sync_autostart(&store, registrar.as_ref()) {
            tracing::warn!("Could not register autostart: {}", err);
        }
    }

    let config = store.snapshot();

    let executor = MoveExecutor::new(cli.collision_policy());
    if let Some(root) = config.watch_root() {
        if root.is_dir() {
            executor
                .prepare_destinations(root, &config.rules)
                .with_context(|| format!("Failed to create folders under {}", root.display()))?;
        }
    }

    // The sink runs on the watch worker; printing happens here on the main thread.
    let (event_tx, event_rx) = mpsc::channel::<MoveEvent>();
    let mut session =
        WatchSession::new(store.clone(), executor).with_sink(move |event: &MoveEvent| {
            let _ = event_tx.send(event.clone());
        });

    match session.start_configured() {
        Ok(()) => {}
        Err(WatchError::InvalidRoot(path)) => {
            eprintln!(
                "Error: Invalid or non-existent monitored folder: {:?}. Pass a folder to watch.",
                path
            );
            std::process::exit(1);
        }
        Err(err) => return Err(err).context("Failed to start monitoring"),
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    if !matches!(cli.output, OutputFormat::Json) {
        if let Some(root) = session.root() {
            println!("Watching: {}", root.display());
        }
        println!("Press Ctrl+C to quit");
        println!("---");
    }

    while running.load(Ordering::SeqCst) {
        match event_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => print_event(&event, &cli)?,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    session.stop();
    Ok(())
}

fn apply_cli_edits(
    cli: &Cli,
    store: &ConfigStore,
    registrar: &dyn AutostartRegistrar,
) -> Result<()> {
    if let Some(rules) = &cli.rules {
        store.set_rules_from_json(rules).context("Rules not updated")?;
        tracing::info!("Rules updated!");
    }

    if let Some(path) = &cli.path {
        let folder = path
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", path.display()))?;
        store.set_watch_folder(&folder).context("Failed to save watch folder")?;
        tracing::info!("Monitored folder set: {}", folder.display());
    }

    if let Some(enabled) = cli.start_with_system {
        autostart::apply_start_with_system(store, registrar, enabled)
            .context("Failed to update start-with-system")?;
    }

    Ok(())
}

fn print_event(event: &MoveEvent, cli: &Cli) -> Result<()> {
    match cli.output {
        OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
        OutputFormat::Text => print_text_event(event, cli),
        OutputFormat::Compact => print_compact_event(event),
    }
    Ok(())
}

fn print_text_event(event: &MoveEvent, cli: &Cli) {
    let time_str = event.timestamp.format("%H:%M:%S");

    if cli.no_color {
        println!("[{}] {}", time_str, event);
    } else {
        let color = match &event.outcome {
            MoveOutcome::Moved { .. } => "\x1b[32m",   // Green
            MoveOutcome::Skipped { .. } => "\x1b[33m", // Yellow
            MoveOutcome::Failed { .. } => "\x1b[31m",  // Red
        };
        println!("[{}] {}{}\x1b[0m", time_str, color, event);
    }
}

fn print_compact_event(event: &MoveEvent) {
    let event_type = match &event.outcome {
        MoveOutcome::Moved { .. } => "M",
        MoveOutcome::Skipped { .. } => "S",
        MoveOutcome::Failed { .. } => "F",
    };

    println!("{} {}", event_type, event.source.display());
}
