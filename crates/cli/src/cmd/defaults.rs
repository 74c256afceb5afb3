//! Print the default watch options

use anyhow::Result;
use surveil::WatchOptions;

pub fn run() -> Result<()> {
    print!("{}", WatchOptions::default().to_toml_string());
    Ok(())
}
