use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use glshim_core::config::{default_config_path, GlShimConfig};

mod verify;

#[derive(Parser)]
#[command(name = "glshim")]
#[command(about = "glshim - immediate-mode compatibility backend tooling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the built-in conformance scenarios against the software context
    Verify {
        /// Configuration file path (defaults to /etc/glshim/glshim.toml or ./glshim.toml)
        #[arg(short, long)]
        config: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Configuration file path (defaults to /etc/glshim/glshim.toml or ./glshim.toml)
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Verify { config, json } => {
            let path = config.unwrap_or_else(default_config_path);
            let config = load_config(&path)?;
            glshim_common::init_logging_with_default(&config.logging.filter);
            info!("running conformance scenarios with {}", path);
            verify::run_verify(&config, json)?;
        }

        Commands::Config { config } => {
            let path = config.unwrap_or_else(default_config_path);
            let config = load_config(&path)?;
            println!("# effective configuration ({})", path);
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

/// A missing file means defaults; a file that exists must parse.
fn load_config(path: &str) -> anyhow::Result<GlShimConfig> {
    if !std::path::Path::new(path).exists() {
        return Ok(GlShimConfig::default());
    }
    GlShimConfig::load(path).with_context(|| format!("failed to load {}", path))
}
