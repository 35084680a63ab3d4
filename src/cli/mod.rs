//! CLI driver (component C12): argument parsing plus subcommand dispatch.

pub mod args;
pub mod commands;

pub use args::{Cli, Command, GraphFormat, GraphKind};
