//! CLI Entry Point for progressive-render
//!
//! Provides command-line interface for:
//! - Rendering headless to completion, optionally applying a camera afterwards and
//!   exporting the final frame as PNG
//! - Interactive live reconfiguration from stdin
//! - Validating camera settings files
//! - Printing the effective configuration
//!
//! # Usage
//!
//! ```bash
//! progressive-render render --camera demos/wide.json --output frame.png
//! progressive-render interactive
//! progressive-render check-camera demos/wide.json
//! PROGRESSIVE_RENDER_SESSION__SAMPLES_PER_PIXEL=10 progressive-render show-config
//! ```
//!
//! In interactive mode each line is either settings text (`{...}`) or a control edit
//! such as `vfov=35` or `lookfrom.x=-4`; `status`, `settings` and `quit` are also
//! understood.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use progressive_render::config::{AppConfig, DEFAULT_CONFIG_PATH};
use progressive_render::engine::{EngineRuntime, SimulatedBackend};
use progressive_render::messages::SchedulerPhase;
use progressive_render::presentation::{PresentationSink, SharedSurface};
use progressive_render::{logging, CameraConfiguration, RenderController, RenderScheduler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Parser)]
#[command(name = "progressive-render")]
#[command(about = "Progressive render controller with live camera reconfiguration", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the target sample count
    #[arg(long, global = true)]
    samples: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render to completion without interaction
    Render {
        /// Camera settings (JSON) applied after the first completion
        #[arg(long)]
        camera: Option<PathBuf>,

        /// Write the final frame to this PNG file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Apply settings text or field=value edits read from stdin
    Interactive {
        /// Write the frame shown at exit to this PNG file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a camera settings file and print it back
    CheckCamera {
        /// Path to camera JSON
        file: PathBuf,
    },

    /// Print the effective configuration (file + environment) as TOML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(samples) = cli.samples {
        config.session.samples_per_pixel = samples;
    }
    config.validate().context("invalid configuration")?;
    logging::init_from_config(&config).context("initializing logging")?;

    match cli.command {
        Commands::Render { camera, output } => render(&config, camera, output).await,
        Commands::Interactive { output } => interactive(&config, output).await,
        Commands::CheckCamera { file } => check_camera(&file),
        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

type Running = (RenderController, JoinHandle<progressive_render::RenderResult<()>>, SharedSurface);

fn start(config: &AppConfig) -> Result<Running> {
    let backend = SimulatedBackend::new().with_pass_delay(config.simulated_pass_delay());
    let runtime = EngineRuntime::initialized(Arc::new(backend), config.engine_options())
        .context("initializing compute engine")?;

    let surface = SharedSurface::default();
    let scheduler = RenderScheduler::start(
        runtime,
        config.session_params(),
        &config.camera,
        PresentationSink::new(surface.clone()),
        config.scheduler_config(),
    )
    .context("starting render session")?;

    let (controller, handle) = scheduler.spawn();
    Ok((controller, handle, surface))
}

async fn finish(
    controller: RenderController,
    handle: JoinHandle<progressive_render::RenderResult<()>>,
    surface: &SharedSurface,
    output: Option<PathBuf>,
) -> Result<()> {
    if let Some(path) = output {
        surface
            .save_png(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Saved {}", path.display());
    }
    let status = controller.shutdown().await?;
    handle.await.context("render task panicked")??;
    info!(passes = status.passes, "Render finished");
    Ok(())
}

async fn render(config: &AppConfig, camera: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let (controller, handle, surface) = start(config)?;

    let status = controller.wait_for_phase(SchedulerPhase::Idle).await?;
    println!("{status}");

    if let Some(path) = camera {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let outcome = controller.apply_text(text).await?;
        println!(
            "Applied camera from {} ({}x{})",
            path.display(),
            outcome.camera.width,
            outcome.camera.image_height()
        );
        let status = controller.wait_for_phase(SchedulerPhase::Idle).await?;
        println!("{status}");
    }

    finish(controller, handle, &surface, output).await
}

async fn interactive(config: &AppConfig, output: Option<PathBuf>) -> Result<()> {
    let (controller, handle, surface) = start(config)?;
    println!("{}", controller.settings_text().await?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "status" => println!("{}", controller.status().await?),
            "settings" => println!("{}", controller.settings_text().await?),
            _ => match controller.apply_line(line).await {
                Ok(_) => println!("{}", controller.status().await?),
                Err(e) if e.is_recoverable() => eprintln!("rejected: {e}"),
                Err(e) => return Err(e.into()),
            },
        }
    }

    finish(controller, handle, &surface, output).await
}

fn check_camera(path: &Path) -> Result<()> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let camera = CameraConfiguration::parse(&text)?;
    println!("{}", camera.to_settings_text());
    println!("# {}x{} image", camera.width, camera.image_height());
    Ok(())
}
