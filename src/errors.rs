//! Error types for flowgraph's analysis pipeline.
//!
//! All fallible entry points return `CoreError`, which converts into
//! `anyhow::Error` at the CLI boundary via `thiserror`'s derived `From`
//! impls. Analysis-level recoveries (unsupported AST constructs,
//! unresolved jump labels, factory misuse) never produce a `CoreError` —
//! those are handled locally and logged at `debug`, per the error design
//! that only I/O and parse failures are allowed to abort a run.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for flowgraph's core and driver.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A grammar construct the builder does not recognize. Retained as a
    /// variant for callers that opt into strict mode; the default pipeline
    /// never constructs this and instead skips the construct silently.
    #[error("unsupported construct `{kind}` at line {line}")]
    UnsupportedConstruct { kind: String, line: usize },

    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl CoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_includes_path_in_display() {
        let err = CoreError::io("a.java", std::io::Error::new(std::io::ErrorKind::NotFound, "x"));
        assert!(err.to_string().contains("a.java"));
    }

    #[test]
    fn parse_error_converts_to_anyhow() {
        let err = CoreError::parse("b.java", "unexpected token");
        let any: anyhow::Error = err.into();
        assert!(any.to_string().contains("unexpected token"));
    }
}
