use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use autotest_web::PanelConfig;

#[derive(Parser)]
#[command(name = "autotest-web")]
#[command(about = "AutoTest control panel - intercom test runs and configuration")]
#[command(version)]
struct Cli {
    /// Panel configuration file path
    #[arg(short, long, env = "AUTOTEST_PANEL_CONFIG", default_value = "autotest.toml")]
    config: PathBuf,

    /// HTTP listen address
    #[arg(short, long, env = "AUTOTEST_LISTEN")]
    listen: Option<String>,

    /// Stored intercom configuration file
    #[arg(long, env = "AUTOTEST_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// Directory for run reports
    #[arg(long, env = "AUTOTEST_LOGS_DIR")]
    logs_dir: Option<PathBuf>,

    /// Firmware store root
    #[arg(long, env = "AUTOTEST_FIRMWARE_DIR")]
    firmware_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    info!("AutoTest control panel v{}", autotest_common::VERSION);

    let mut cfg = PanelConfig::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        cfg.listen = listen;
    }
    if let Some(config_file) = cli.config_file {
        cfg.config_file = config_file;
    }
    if let Some(logs_dir) = cli.logs_dir {
        cfg.logs_dir = logs_dir;
    }
    if let Some(firmware_dir) = cli.firmware_dir {
        cfg.firmware_dir = firmware_dir;
    }

    info!(
        config_file = %cfg.config_file.display(),
        logs_dir = %cfg.logs_dir.display(),
        firmware_dir = %cfg.firmware_dir.display(),
        "panel configured"
    );

    autotest_web::server::serve(cfg).await
}
