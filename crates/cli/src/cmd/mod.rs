//! CLI command implementations

pub mod defaults;
pub mod watch;
