use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use media_compositor::{
    composition::{ComposeRequest, CompositionEngine, ProcessRequest},
    config::Config,
    encoder::{EncoderLocator, EncoderPaths, InvocationPlan, Progress},
    storage::{Storage, StorageArea},
    ComposerError,
};

#[derive(Parser)]
#[command(
    name = "media-compositor",
    version,
    about = "Compose images, videos and audio into a single video",
    long_about = "Media-Compositor builds an FFmpeg filter graph from an ordered list of images, \
                  videos and audio tracks and renders it, and applies ImageMagick operation chains \
                  to single resources."
)]
struct Cli {
    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a compose request (JSON or TOML)
    Compose {
        request: PathBuf,
    },

    /// Print the encoder command for a compose request without running it
    Plan {
        request: PathBuf,

        /// One argument per line instead of a shell command
        #[arg(long)]
        args: bool,
    },

    /// Apply an operation chain to a single image or video
    Process {
        request: PathBuf,
    },

    /// Manage the uploads and outputs directories
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },

    /// Check that ffmpeg and ImageMagick can be found and started
    Doctor,
}

#[derive(Subcommand)]
enum FilesAction {
    /// List files in `uploads` or `outputs`
    List {
        area: String,
    },

    /// Delete a file from `uploads` or `outputs`
    Delete {
        area: String,
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(log_level.into()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => Config::default(),
    };

    if let Err(e) = run(cli.command, config).await {
        match e.downcast_ref::<ComposerError>() {
            Some(composer) => eprintln!("Error: {}", composer.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Compose { request } => {
            let request = ComposeRequest::from_file(&request)?;
            let engine = engine(config)?;

            let (tx, mut rx) = tokio::sync::mpsc::channel::<Progress>(32);
            let progress = tokio::spawn(async move {
                let mut last_percent = -1i64;
                while let Some(update) = rx.recv().await {
                    if let Some(percent) = update.percent {
                        // log every 10%
                        let step = (percent / 10.0) as i64;
                        if step > last_percent {
                            last_percent = step;
                            info!("⏳ {:.0}% ({:.1}s)", percent, update.elapsed);
                        }
                    }
                }
            });

            let outcome = engine.compose(&request, Some(tx)).await;
            progress.await.context("progress reporter failed")?;
            let outcome = outcome?;

            println!("{}", outcome.output_path.display());
            println!("{}", outcome.command_line);
        }
        Command::Plan { request, args } => {
            let request = ComposeRequest::from_file(&request)?;
            let engine = CompositionEngine::new(config.clone(), plan_paths(&config));
            let plan = engine.plan(&request)?;
            print_plan(&plan, args);
        }
        Command::Process { request } => {
            let request = ProcessRequest::from_file(&request)?;
            let engine = engine(config)?;
            let outcome = engine.process(&request).await?;
            println!("{}", outcome.output_path.display());
        }
        Command::Files { action } => {
            let storage = Storage::new(&config.storage);
            match action {
                FilesAction::List { area } => {
                    let area: StorageArea = area.parse()?;
                    for file in storage.list(area)? {
                        let modified = file
                            .modified
                            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                            .unwrap_or_else(|| "-".to_string());
                        println!("{:>12}  {}  {}", file.size, modified, file.name);
                    }
                }
                FilesAction::Delete { area, name } => {
                    let area: StorageArea = area.parse()?;
                    storage.delete(area, &name)?;
                    println!("Deleted {}", name);
                }
            }
        }
        Command::Doctor => {
            let paths = EncoderLocator::from_config(&config.encoder).verify().await?;
            println!("ffmpeg:      {}", paths.ffmpeg.display());
            match &paths.magick {
                Some(magick) => println!("ImageMagick: {}", magick.display()),
                None => println!("ImageMagick: not found (image processing disabled)"),
            }
        }
    }
    Ok(())
}

fn engine(config: Config) -> Result<CompositionEngine> {
    let paths = EncoderLocator::from_config(&config.encoder).locate()?;
    Ok(CompositionEngine::new(config, paths))
}

/// Planning never runs anything, so a missing ffmpeg falls back to the bare name
fn plan_paths(config: &Config) -> EncoderPaths {
    EncoderLocator::from_config(&config.encoder)
        .locate()
        .unwrap_or_else(|_| EncoderPaths::new("ffmpeg"))
}

fn print_plan(plan: &InvocationPlan, one_per_line: bool) {
    if one_per_line {
        println!("{}", plan.program.display());
        for arg in &plan.args {
            println!("{}", arg);
        }
    } else {
        println!("{}", plan.command_line());
    }
}
