//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use chartstep_core::CoreError;
use chartstep_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Payload or configuration rejected
    #[error("Validation failed: {message}")]
    #[diagnostic(code(chartstep::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Payload could not be decoded into a single step
    #[error("{message}")]
    #[diagnostic(code(chartstep::cli::protocol))]
    Protocol { message: String },

    /// External command failed
    #[error("{message}")]
    #[diagnostic(code(chartstep::cli::command))]
    Command {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (stdin, stdout)
    #[error("IO error: {message}")]
    #[diagnostic(code(chartstep::cli::io))]
    Io { message: String },

    /// Output extraction failed
    #[error("{message}")]
    #[diagnostic(code(chartstep::cli::output))]
    Output { message: String },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(chartstep::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Protocol { .. } => exit_codes::PROTOCOL_ERROR,
            CliError::Command { .. } => exit_codes::COMMAND_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Output { .. } => exit_codes::OUTPUT_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: None,
        }
    }

    /// Create a validation error with help text
    pub fn validation_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a command error
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
            help: None,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::StepCount { .. } | CoreError::YamlParse(_) | CoreError::JsonParse(_) => {
                CliError::Protocol {
                    message: err.to_string(),
                }
            }
            CoreError::SchemaViolation { .. } => CliError::validation_with_help(
                err.to_string(),
                "run `chartstep schema` to see the accepted step fields",
            ),
            CoreError::InvalidClientVersion { .. }
            | CoreError::UnsupportedClientVersion { .. }
            | CoreError::PartialCredentials => CliError::validation(err.to_string()),
            CoreError::Io(_) => CliError::Io {
                message: err.to_string(),
            },
            CoreError::InvalidSchema { .. }
            | CoreError::ExportPathMissing { .. }
            | CoreError::MissingRepositoryUrl { .. } => CliError::Other {
                message: err.to_string(),
            },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::Core(core) => core.into(),
            KubeError::CommandSpawn { .. } => CliError::Command {
                message: err.to_string(),
                help: Some("check that the binary is installed, or set --helm-binary".to_string()),
            },
            KubeError::CommandFailed { .. } | KubeError::UninstallFailed { .. } => {
                CliError::command(err.to_string())
            }
            KubeError::SecretNotFound { .. }
            | KubeError::SecretKeyMissing { .. }
            | KubeError::WriteOutput { .. }
            | KubeError::ResourceOutput { .. }
            | KubeError::Api(_)
            | KubeError::Kubeconfig(_) => CliError::Output {
                message: err.to_string(),
            },
            KubeError::Io(_) => CliError::Io {
                message: err.to_string(),
            },
            _ => CliError::Other {
                message: err.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Other {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_count_is_protocol_error() {
        let err: CliError = CoreError::StepCount { count: 2 }.into();
        assert_eq!(err.exit_code(), exit_codes::PROTOCOL_ERROR);
        assert_eq!(err.to_string(), "expected a single step, but got 2");
    }

    #[test]
    fn test_kube_errors_map_to_exit_codes() {
        let failed: CliError = KubeError::CommandFailed {
            command: "helm3 install a b".into(),
            code: Some(1),
        }
        .into();
        assert_eq!(failed.exit_code(), exit_codes::COMMAND_ERROR);

        let missing: CliError = KubeError::SecretKeyMissing {
            key: "password".into(),
            namespace: "default".into(),
            name: "db".into(),
        }
        .into();
        assert_eq!(missing.exit_code(), exit_codes::OUTPUT_ERROR);

        let query: CliError = KubeError::ResourceOutput {
            name: "cluster-ip".into(),
            source: Box::new(KubeError::CommandFailed {
                command: "kubectl get service mysql".into(),
                code: Some(1),
            }),
        }
        .into();
        assert_eq!(query.exit_code(), exit_codes::OUTPUT_ERROR);
        assert!(query.to_string().starts_with("couldn't read output 'cluster-ip'"));

        let nested: CliError = KubeError::Core(CoreError::PartialCredentials).into();
        assert_eq!(nested.exit_code(), exit_codes::VALIDATION_ERROR);
    }
}
