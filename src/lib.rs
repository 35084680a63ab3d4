//! flowgraph: extracts Property-Element, control-flow, and program-
//! dependence graphs from Java-family source, one compilation unit at a
//! time.
//!
//! The analysis core (`pe`, `defuse`, `cfg`, `pdg`, `graph`) is pure over
//! its inputs and performs no I/O. `parser`, `builder`, `emit`, `cli`,
//! `config`, and `observability` are the ambient driver that wires the
//! core to a real front-end parser, a configuration file, structured
//! logging, and a text-based graph emitter.

pub mod builder;
pub mod cfg;
pub mod cli;
pub mod config;
pub mod defuse;
pub mod emit;
pub mod errors;
pub mod graph;
pub mod observability;
pub mod parser;
pub mod pdg;
pub mod pe;
