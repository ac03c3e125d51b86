use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::path::PathBuf;
use storefront_search::WidgetConfig;
use storefront_search::history::RECENT_SEARCHES_FILENAME;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Command;

const APP_DIR: &str = "storefront";
const CONFIG_FILENAME: &str = "config.toml";

/// Drive a storefront search session from the terminal.
#[derive(Debug, Parser)]
#[command(name = "storefront", version)]
struct Cli {
    /// TOML configuration file (defaults to the user config dir)
    #[arg(long, value_name = "FILE", env = "STOREFRONT_CONFIG")]
    config: Option<PathBuf>,

    /// Search backend base URL
    #[arg(long, value_name = "URL", env = "STOREFRONT_BACKEND_URL")]
    backend_url: Option<String>,

    /// Store identity sent as `storeUrl`
    #[arg(long, value_name = "URL", env = "STOREFRONT_STORE_URL")]
    store_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn load_config(&self) -> Result<WidgetConfig> {
        let default_path = dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILENAME));
        let mut config = match (&self.config, default_path) {
            (Some(path), _) => load_file(path)?,
            (None, Some(path)) if path.exists() => load_file(&path)?,
            _ => WidgetConfig::default(),
        };
        if let Some(url) = &self.backend_url {
            config.backend_url = url.clone();
        }
        if let Some(url) = &self.store_url {
            config.store_url = url.clone();
        }
        if config.recent_searches_path.is_none() {
            config.recent_searches_path =
                dirs::data_dir().map(|dir| dir.join(APP_DIR).join(RECENT_SEARCHES_FILENAME));
        }
        config
            .validate()
            .map_err(|err| anyhow::anyhow!("invalid configuration: {err}"))?;
        Ok(config)
    }
}

fn load_file(path: &Path) -> Result<WidgetConfig> {
    WidgetConfig::from_toml_path(path)
        .with_context(|| format!("load config from {}", path.display()))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.load_config()?;
    commands::run(cli.command, config).await
}
