use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PrepError>;

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error in {path}: {message}")]
    Xml { path: PathBuf, message: String },

    #[error("Invalid annotation {path}: {message}")]
    InvalidAnnotation { path: PathBuf, message: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Input not found: {0}")]
    MissingInput(PathBuf),

    #[error(
        "Class lists differ between splits (only in train: {only_train:?}, only in valid: {only_valid:?})"
    )]
    ClassMismatch {
        only_train: Vec<String>,
        only_valid: Vec<String>,
    },

    #[error("Failed to restore {count} staged file(s); staging directory retained at {path}")]
    StagingRetained { path: PathBuf, count: usize },
}

impl PrepError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PrepError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn xml(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        PrepError::Xml {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
