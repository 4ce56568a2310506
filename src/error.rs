use std::path::PathBuf;

use thiserror::Error;

use crate::tab::TabId;

/// Failure reported by the browser side of the bridge.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("tab {0} not found")]
    TabNotFound(TabId),
    #[error("host rejected request: {0}")]
    Rejected(String),
    #[error("unexpected host response: {0}")]
    Malformed(String),
    #[error("host connection closed")]
    Disconnected,
    #[error("no response to host request {0} in time")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("registration needs at least one url matcher")]
    NoMatchers,

    #[error("invalid url pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("failed to parse rules file {path}: {source}")]
    RulesFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
