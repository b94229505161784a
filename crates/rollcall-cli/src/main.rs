use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::{OnnxProvider, Registry};
use rollcall_hw::Camera;
use rollcall_ledger::{Ledger, MarkResult};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod dashboard;
mod notify;
mod session;

use config::Config;
use notify::ConsoleNotifier;
use session::{AppContext, PhotoOutcome, SessionEvent};

#[derive(Parser)]
#[command(name = "rollcall", about = "Face-recognition attendance system")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start continuous camera recognition
    Camera,
    /// Recognize faces in one photo and mark attendance
    Photo {
        /// Path to the image file
        path: PathBuf,
    },
    /// Show the attendance table (read-only)
    Dashboard {
        /// Emit JSON instead of a text table
        #[arg(long)]
        json: bool,
    },
    /// List available capture devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Camera => run_camera(config).await,
        Commands::Photo { path } => run_photo(config, &path),
        Commands::Dashboard { json } => {
            if json {
                println!("{}", dashboard::render_json(&config.ledger_path));
            } else {
                print!("{}", dashboard::render(&config.ledger_path));
            }
            Ok(())
        }
        Commands::Devices => {
            for device in Camera::list_devices() {
                println!("{}  {} ({})", device.path, device.name, device.driver);
            }
            Ok(())
        }
    }
}

/// Load models, enroll known faces, and open the ledger.
fn build_context(config: &Config) -> Result<AppContext> {
    let mut provider =
        OnnxProvider::load(&config.model_dir).context("failed to load recognition models")?;
    let registry = Registry::build(&config.faces_dir, &mut provider)
        .context("failed to build identity registry")?;
    tracing::info!(enrolled = registry.len(), "identity registry ready");

    let ledger =
        Ledger::open(&config.ledger_path).context("failed to open attendance ledger")?;

    Ok(AppContext {
        registry,
        provider: Box::new(provider),
        ledger,
        threshold: config.match_threshold,
    })
}

async fn run_camera(config: Config) -> Result<()> {
    let ctx = build_context(&config)?;
    let session::SessionHandle { mut events, stop } = session::spawn_camera_session(
        ctx,
        config.camera_device.clone(),
        Box::new(ConsoleNotifier),
    );

    println!("camera attendance running — press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stop requested");
                stop.stop();
            }
            event = events.recv() => match event {
                Some(SessionEvent::Recognized { name, outcome }) => match outcome {
                    MarkResult::Marked => println!("marked: {name}"),
                    MarkResult::AlreadyMarked => println!("{name} already marked today"),
                },
                Some(SessionEvent::Stopped { reason }) => {
                    tracing::info!(?reason, "camera session ended");
                    break;
                }
                None => break,
            }
        }
    }

    Ok(())
}

fn run_photo(config: Config, path: &Path) -> Result<()> {
    let mut ctx = build_context(&config)?;
    let mut notifier = ConsoleNotifier;

    match session::run_photo(&mut ctx, path, &mut notifier)? {
        PhotoOutcome::Recognized(outcomes) => {
            for (name, outcome) in outcomes {
                match outcome {
                    MarkResult::Marked => println!("marked: {name}"),
                    MarkResult::AlreadyMarked => println!("{name} already marked today"),
                }
            }
        }
        PhotoOutcome::NoMatch => {
            println!("no known faces found in {}", path.display());
        }
    }

    Ok(())
}
