//! CLI argument definitions for the Brocha binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Brocha - WhatsApp assistant for a paint store.
#[derive(Parser, Debug)]
#[command(name = "brocha", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port", global = true)]
    pub port: Option<u16>,

    /// Data directory for the SQLite database.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Split, embed and store guide documents (.txt / .md files or folders).
    IngestDocs {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Target collection; defaults to `retrieval.collection`.
        #[arg(long)]
        collection: Option<String>,
        #[command(flatten)]
        embedding: EmbeddingArgs,
    },
    /// Load a scraped product JSON file into the catalog.
    ImportProducts { file: PathBuf },
    /// Rebuild the product collection of the knowledge index from the catalog.
    IndexProducts {
        #[command(flatten)]
        embedding: EmbeddingArgs,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingArgs {
    /// Embed with the local hash embedder instead of the provider API.
    #[arg(long)]
    pub offline: bool,
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    /// Priority: --config flag > BROCHA_CONFIG env var > ~/.brocha/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("BROCHA_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Priority: --port flag > BROCHA_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        std::env::var("BROCHA_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(config_port)
    }

    /// `None` when not overridden on the command line.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }
}

fn default_config_path() -> PathBuf {
    brocha_core::config::expand_home("~/.brocha/config.toml")
}
