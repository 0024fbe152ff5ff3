use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for all operations in the `amibump` application.
///
/// This enum uses `thiserror` to neatly wrap various kinds of errors that can occur,
/// from I/O issues to configuration parsing problems and image directory failures.
#[derive(Error, Debug)]
pub enum Error {
    /// An error related to file system I/O.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error that occurred during regex compilation.
    #[error("Pattern compilation failed: {0}")]
    Regex(#[from] regex::Error),

    /// An error that occurred while parsing a YAML configuration file.
    #[error("Config parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An error that occurred while parsing a TOML configuration file.
    #[error("Config parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// An error that occurred while serializing configuration to TOML.
    #[error("Config serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// A general configuration-related error.
    #[error("Config error: {0}")]
    Config(String),

    /// No account IDs were supplied by flags, environment, or config file.
    #[error("at least one account ID is required")]
    NoAccounts,

    /// No target file or directory was supplied.
    #[error("target file path is required")]
    NoFilePath,

    /// No region is configured in the AWS profile or environment.
    #[error("no region configured in AWS profile or environment")]
    NoRegion,

    /// A transport or auth failure while querying the image directory.
    /// "Image not found" is not a query error; it surfaces as an absent
    /// record instead.
    #[error("image directory query failed: {0}")]
    Query(String),

    /// The backup sibling could not be written. The target file is untouched.
    #[error("failed to create backup {}: {source}", .path.display())]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An error from the `walkdir` crate during directory traversal.
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// An error related to persisting a temporary file.
    #[error("Tempfile error: {0}")]
    TempFile(#[from] tempfile::PersistError),

    /// An error related to JSON serialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenient type alias for `Result<T, amibump::errors::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Config(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Config(s.to_string())
    }
}
