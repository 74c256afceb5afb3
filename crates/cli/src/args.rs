//! Argument definitions

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use surveil::WatchOptions;

/// Surveil - watch a file or a directory's direct children
#[derive(Parser, Debug)]
#[command(name = "surveil")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream events for a path until interrupted
    Watch(WatchArgs),
    /// Print the default options as TOML
    Defaults,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WatchArgs {
    /// File or directory to watch
    pub path: PathBuf,

    /// TOML file with watch options
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Debounce window for changes, in milliseconds
    #[arg(long, value_name = "MS")]
    pub change_timeout: Option<u64>,

    /// Retries for transient permission errors
    #[arg(long, value_name = "N")]
    pub eperm_retries: Option<u32>,

    /// Delay between permission retries, in milliseconds
    #[arg(long, value_name = "MS")]
    pub eperm_easing: Option<u64>,

    /// Poll interval while the path does not exist, in milliseconds
    #[arg(long, value_name = "MS")]
    pub missing_poll: Option<u64>,

    /// Only report files ending with EXT (repeatable)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Only report files matching GLOB (repeatable)
    #[arg(long = "pattern", value_name = "GLOB")]
    pub patterns: Vec<String>,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Also write logs to FILE
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl WatchArgs {
    /// Options from `--config` (or defaults), overridden by explicit flags
    pub fn options(&self) -> Result<WatchOptions> {
        let mut options = match &self.config {
            Some(path) => WatchOptions::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => WatchOptions::default(),
        };

        if let Some(ms) = self.change_timeout {
            options = options.with_change_timeout(Duration::from_millis(ms));
        }
        if let Some(retries) = self.eperm_retries {
            options = options.with_eperm_retries(retries);
        }
        if let Some(ms) = self.eperm_easing {
            options = options.with_eperm_easing(Duration::from_millis(ms));
        }
        if let Some(ms) = self.missing_poll {
            options = options.with_missing_poll(Duration::from_millis(ms));
        }
        if !self.extensions.is_empty() {
            options = options.with_extensions(self.extensions.iter().cloned());
        }
        if !self.patterns.is_empty() {
            options = options.with_patterns(self.patterns.iter().cloned());
        }

        Ok(options)
    }
}
