use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tsvk")]
#[command(about = "Run TShock server commands from VK community messages", long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Path to config.yaml, file name can not be omitted (default: TSVK_CONFIG_PATH or ./config.yaml). Created with defaults if missing.
    #[arg(long, short = 'c', value_name = "PATH")]
    config_path: Option<PathBuf>,

    /// Print version and exit
    #[arg(long, short = 'v')]
    version: bool,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if cli.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return;
    }

    if let Err(e) = run(cli.config_path).await {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(tsvk::config::default_config_path);
    let config = tsvk::config::load_config(&path, true)
        .map_err(|e| e.context(format!("failed to load config from {}", path.display())))?;
    log::info!("starting callback server on port {}", config.port);
    tsvk::gateway::run_gateway(config).await
}
