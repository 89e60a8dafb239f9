//! Folio replay binary.
//!
//! Usage:
//!   folio-replay session.ron
//!   folio-replay session.ron --json
//!   folio-replay session.ron --config ~/.config/folio/sync.ron

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use folio_replay::Script;
use folio_sync::SyncConfig;

/// Replay a scripted editing session through the save pipeline.
#[derive(Parser, Debug)]
#[command(name = "folio-replay")]
#[command(about = "Replay a scripted editing session through the Folio save pipeline")]
struct Args {
    /// RON script of editing steps
    script: PathBuf,

    /// Sync config file (defaults to the user config, then built-in defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = folio_telemetry::init_tracing("folio-replay");
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::load_or_default(),
    };
    let script = Script::load(&args.script)?;
    tracing::info!(
        script = %args.script.display(),
        steps = script.steps.len(),
        debounce_ms = config.debounce_ms,
        "replaying"
    );

    let report = folio_replay::run(&script, config).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}
