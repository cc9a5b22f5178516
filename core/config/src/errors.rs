//! Configuration-parse errors: fatal, always tied to a source location.

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{file}:{line}:{column}: {message}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        snippet: String,
        message: String,
    },
    #[error("unresolvable path: {0}")]
    UnresolvablePath(String),
    #[error("unsupported option: -{0}")]
    UnsupportedOption(String),
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn parse(file: &str, line: usize, column: usize, snippet: &str, message: impl fmt::Display) -> Self {
        ConfigError::Parse {
            file: file.to_string(),
            line,
            column,
            snippet: snippet.to_string(),
            message: message.to_string(),
        }
    }
}
