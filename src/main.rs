//! # Site Media Normalizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione (file + override da CLI)
//! - Avvio del normalizer, della generazione history o dei report
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Configura il logging su stderr (INFO o DEBUG, `RUST_LOG` rispettato)
//! 3. Carica e valida la configurazione
//! 4. Verifica ffmpeg/ffprobe prima di toccare qualsiasi file
//! 5. Esegue il sottocomando richiesto
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-normalizer --root ./site images --dry-run --verbose
//! media-normalizer --json all
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use site_media_normalizer::{
    config::SITE_CONFIG_FILE, history, json_output::JsonMessage, Config, MediaKind, MediaNormalizer,
    OptimizeError, ToolPathResolver,
};

#[derive(Parser)]
#[command(name = "media-normalizer")]
#[command(about = "Idempotent image, audio and video normalization for a static site")]
struct Cli {
    /// Root of the static site
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Dry run - encode and evaluate, but don't replace files
    #[arg(long, global = true)]
    dry_run: bool,

    /// Emit machine-readable JSON lines on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Number of files processed concurrently
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Normalize images (JPEG, PNG)
    Images,
    /// Normalize audio to MP3
    Audio,
    /// Normalize video to H.264 MP4
    Video,
    /// Images, then audio, then video
    All,
    /// Regenerate history.json from the content manifests
    History,
    /// Report ffmpeg/ffprobe availability
    Tools,
    /// Print the effective configuration
    Config {
        /// Write it to the config file instead of printing it
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli).await {
        let aborted = e.downcast_ref::<OptimizeError>().is_some_and(OptimizeError::is_fatal);
        let message = if aborted {
            format!("Aborted before touching any file: {}", e)
        } else {
            e.to_string()
        };

        if cli.json {
            let details = e.chain().nth(1).map(|cause| cause.to_string());
            JsonMessage::error(message, details).emit();
        } else {
            error!("{}", message);
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli).await?;
    let command = cli.command.clone().unwrap_or(Command::All);

    let kinds: &[MediaKind] = match command {
        Command::Images => &[MediaKind::Image],
        Command::Audio => &[MediaKind::Audio],
        Command::Video => &[MediaKind::Video],
        Command::All => &MediaKind::ALL,
        Command::History => return run_history(&config).await,
        Command::Tools => {
            print!("{}", ToolPathResolver::new().get_tools_report());
            return Ok(());
        }
        Command::Config { write } => return run_config(cli, &config, write).await,
    };

    let normalizer = MediaNormalizer::with_external_tools(config, &ToolPathResolver::new()).await?;
    normalizer.run(kinds).await?;
    Ok(())
}

/// Carica la configurazione e applica gli override della CLI
async fn load_config(cli: &Cli) -> Result<Config> {
    let root = cli.root.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut config = match Config::locate(cli.config.as_deref(), &root) {
        Some(path) => Config::from_file(&path).await?,
        None => Config::default(),
    };

    if cli.root.is_some() {
        config.site_root = root;
    }
    if cli.dry_run {
        config.dry_run = true;
    }
    if cli.json {
        config.json_output = true;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }

    if !config.site_root.is_dir() {
        return Err(anyhow::anyhow!("Site root does not exist: {}", config.site_root.display()));
    }
    config.validate()?;
    Ok(config)
}

async fn run_history(config: &Config) -> Result<()> {
    let entries = history::update_history(&config.site_root, &config.history).await?;
    if config.json_output {
        println!("{}", serde_json::to_string(&entries)?);
    } else {
        for entry in &entries {
            info!("  {} {} ({})", entry.date, entry.name, entry.entry_type);
        }
    }
    Ok(())
}

async fn run_config(cli: &Cli, config: &Config, write: bool) -> Result<()> {
    if !write {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| config.site_root.join(SITE_CONFIG_FILE));
    config.save_to_file(&path).await?;
    info!("Configuration written to {}", path.display());
    Ok(())
}
