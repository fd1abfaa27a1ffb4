//! watchd - 植物应激监测
//!
//! 子命令：
//! - classify: 单帧阈值分类
//! - analyze: 对采集目录做序列分类
//! - run: 采集 + 实时分析，从 stdin 读取触发命令

use clap::{Parser, Subcommand};
use log::{error, info};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use agitation_watch::api::{AgitationMonitor, MonitorError};
use agitation_watch::core::capture::{Camera, CaptureError, ReplayCamera};
use agitation_watch::core::config::{ConfigError, MonitorConfig};
use agitation_watch::core::imaging::{Frame, ImagingError, SequenceClassifier, ThresholdClassifier};
use agitation_watch::core::trigger::{CommandKind, TriggerCommand};

#[derive(Parser)]
#[command(name = "watchd")]
#[command(version)]
#[command(about = "Detect plant agitation from fluorescence frames", long_about = None)]
struct Cli {
    /// JSON5 config file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Threshold-classify one image and print the counts as JSON
    Classify {
        image: PathBuf,
    },

    /// Sequence-classify every frame in a directory
    Analyze {
        dir: PathBuf,
    },

    /// Run the monitor; reads commands (1, 2, cutter, stop, quit) from stdin
    Run {
        /// Replay frames from this directory instead of waiting for an external writer
        #[arg(long)]
        replay: Option<PathBuf>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Imaging(#[from] ImagingError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Monitor(#[from] MonitorError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    agitation_watch::init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Classify { image } => {
            let frame = Frame::load(&image, 0)?;
            let outcome = ThresholdClassifier::with_params(config.threshold).classify(&frame);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }

        Commands::Analyze { dir } => {
            let verdict = SequenceClassifier::with_params(config.sequence).analyze_directory(&dir)?;
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(())
        }

        Commands::Run { replay } => cmd_run(config, replay.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig, ConfigError> {
    match path {
        Some(path) => MonitorConfig::from_file(path),
        None => Ok(MonitorConfig::default()),
    }
}

fn cmd_run(config: MonitorConfig, replay: Option<&Path>) -> Result<(), CliError> {
    let camera = match replay {
        Some(dir) => {
            let camera: Arc<dyn Camera> = Arc::new(ReplayCamera::open(dir)?);
            Some(camera)
        }
        None => None,
    };

    let monitor = AgitationMonitor::create(config, camera)?;
    info!("⌨️ Ready for commands: 1 (current injection), 2 (burn), cutter, stop, quit");

    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        // 命令在后台执行；quit 需要等待完成，循环才能退出
        let handle = monitor.handle_command(&line);
        if TriggerCommand::parse(&line).kind == CommandKind::Quit {
            let _ = handle.join();
            break;
        }
    }

    if !monitor.quit_requested() {
        let _ = monitor.handle_command("quit").join();
    }
    monitor.wait_idle(Duration::from_secs(10));
    info!("👋 watchd exiting");
    Ok(())
}
