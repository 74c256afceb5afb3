//! Command-line front end for `surveil`

pub mod args;
pub mod cmd;
pub mod logging;
pub mod render;
