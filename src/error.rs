use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} is not set")]
    MissingVar(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },

    #[error("Could not read feature file {path}: {source}")]
    FeatureFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid feature definitions: {0}")]
    FeatureFormat(#[from] serde_json::Error),

    #[error("Invalid message pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Could not access secrets file {path}: {source}")]
    Secrets {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
