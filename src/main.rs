// SPDX-License-Identifier: GPL-3.0-only

use barcode_scanner::Config;
use barcode_scanner::backends::open_platform;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

mod cli;

#[derive(Parser)]
#[command(name = "barcode-scanner")]
#[command(about = "Scan barcodes with the best rear camera")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Use a virtual rear camera showing this image instead of real hardware
    #[arg(long = "virtual", global = true, value_name = "IMAGE")]
    virtual_image: Option<PathBuf>,

    /// Config file (default: ~/.config/barcode-scanner/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run in terminal mode (camera preview, results and history)
    Terminal,

    /// List rear-facing cameras
    List,

    /// Probe every rear camera and print the selection with diagnostics
    Select,

    /// Scan barcodes and print them to stdout
    Scan {
        /// Device to scan with instead of auto-selecting
        #[arg(short, long)]
        device: Option<String>,

        /// Exit after the first barcode
        #[arg(long)]
        once: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Terminal);

    init_logging(matches!(command, Commands::Terminal));

    let config_path = cli.config.or_else(Config::default_path);
    let config = match &config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::default(),
    };
    let platform = open_platform(cli.virtual_image.as_deref())?;

    match command {
        Commands::Terminal => barcode_scanner::terminal::run(platform, config),
        Commands::List => cli::list_cameras(platform),
        Commands::Select => cli::select_camera(platform, config),
        Commands::Scan { device, once } => {
            cli::scan(platform, config, config_path.as_deref(), device, once)
        }
    }
}

/// Initialize logging
///
/// Set RUST_LOG to control the log level, e.g. RUST_LOG=barcode_scanner=debug.
/// The terminal UI owns the screen, so its logs go to a file in the cache
/// directory (or nowhere if that cannot be opened).
fn init_logging(to_file: bool) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    if !to_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init();
        return;
    }

    let Some(file) = log_file() else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
}

fn log_file() -> Option<File> {
    let dir = dirs::cache_dir()?.join("barcode-scanner");
    std::fs::create_dir_all(&dir).ok()?;
    File::create(dir.join("terminal.log")).ok()
}
