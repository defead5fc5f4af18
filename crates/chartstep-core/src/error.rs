//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("expected a single step, but got {count}")]
    StepCount { count: usize },

    #[error("could not parse the step payload: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid step payload:\n\t* {}", violations.join("\n\t* "))]
    SchemaViolation { violations: Vec<String> },

    #[error("unable to compile the step schema: {message}")]
    InvalidSchema { message: String },

    #[error("either password or username is empty but not both")]
    PartialCredentials,

    #[error("could not extract export path using regex {pattern}")]
    ExportPathMissing { pattern: String },

    #[error("supplied client version \"{version}\" cannot be parsed as semver: {reason}")]
    InvalidClientVersion { version: String, reason: String },

    #[error("supplied clientVersion \"{version}\" does not meet semver constraint \"{constraint}\"")]
    UnsupportedClientVersion { version: String, constraint: String },

    #[error("repository \"{name}\" is missing a url")]
    MissingRepositoryUrl { name: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
