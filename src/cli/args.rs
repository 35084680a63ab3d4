//! Command-line surface (component C12), modeled on the teacher's
//! `clap::Parser`-derived CLI: one binary, one subcommand so far, typed
//! enums for format/graph selection instead of free-form strings.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "flowgraph", version, about = "Extracts PE, CFG, and PDG graphs from Java-family source")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a source file and emit the CFG or PDG of each method it contains.
    Analyze {
        /// Path to the `.java`-family source file to analyze.
        file: PathBuf,

        /// Optional TOML config file overriding the default PDG construction switches.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format for the emitted graph.
        #[arg(long, value_enum, default_value = "edges")]
        format: GraphFormat,

        /// Which graph to emit.
        #[arg(long, value_enum, default_value = "pdg")]
        graph: GraphKind,

        /// Restrict output to the method with this name.
        #[arg(long)]
        only: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphFormat {
    Edges,
    Dot,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphKind {
    Cfg,
    Pdg,
}
