//! Error types for chartstep-kube

use thiserror::Error;

/// Result type for chartstep-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while running a verb
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Kubeconfig could not be loaded
    #[error("couldn't get kubernetes client: {0}")]
    Kubeconfig(String),

    /// Payload, argument or configuration error
    #[error(transparent)]
    Core(#[from] chartstep_core::CoreError),

    /// Secret lookup failed
    #[error("error getting secret {namespace}/{name}: {message}")]
    SecretNotFound {
        namespace: String,
        name: String,
        message: String,
    },

    /// Secret exists but lacks the requested key
    #[error("couldn't find key {key} in secret {namespace}/{name}")]
    SecretKeyMissing {
        key: String,
        namespace: String,
        name: String,
    },

    /// External command could not be started
    #[error("could not execute command, {command}: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// External command exited unsuccessfully
    #[error("command failed with {}: {command}", exit_description(*code))]
    CommandFailed { command: String, code: Option<i32> },

    /// Output value could not be persisted
    #[error("unable to write output '{name}': {source}")]
    WriteOutput {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Resource field query for an output failed
    #[error("couldn't read output '{name}': {source}")]
    ResourceOutput {
        name: String,
        #[source]
        source: Box<KubeError>,
    },

    /// One or more releases could not be uninstalled
    #[error("{} release(s) failed to uninstall:\n\t* {}", failures.len(), failures.join("\n\t* "))]
    UninstallFailed { failures: Vec<String> },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_description(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code".to_string(),
    }
}

impl KubeError {
    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 404)
    }

    /// Whether an external command failed, as opposed to the pipeline itself
    pub fn is_command_failure(&self) -> bool {
        matches!(
            self,
            KubeError::CommandFailed { .. }
                | KubeError::CommandSpawn { .. }
                | KubeError::UninstallFailed { .. }
        )
    }
}
