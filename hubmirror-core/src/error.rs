//! Error types for hubmirror-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, disk full, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the file path.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No config file at the expected path.
    #[error("config not found at {path}; run `hubmirror init` first")]
    ConfigNotFound { path: PathBuf },

    /// A required credential variable is unset or empty.
    #[error("missing credential: set ${var}")]
    MissingCredential { var: &'static str },

    /// An environment override could not be parsed.
    #[error("invalid value for ${var}: {value:?}")]
    InvalidOverride { var: &'static str, value: String },

    /// The configuration parsed but violates a constraint.
    #[error("invalid config: {0}")]
    Invalid(String),
}
