use std::path::PathBuf;

use thiserror::Error;

/// Failures of the shell around the editor core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown modulator: {0}")]
    UnknownModulator(String),
}

pub type Result<T> = std::result::Result<T, Error>;
