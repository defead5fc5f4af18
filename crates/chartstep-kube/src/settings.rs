//! Runtime settings threaded through every verb

use std::path::PathBuf;

pub const DEFAULT_HELM_BINARY: &str = "helm3";
pub const DEFAULT_KUBECTL_BINARY: &str = "kubectl";
pub const DEFAULT_OUTPUTS_DIR: &str = "/cnab/app/porter/outputs";
pub const DEFAULT_EXPORT_DIR: &str = "/tmp/";

/// Binaries, directories and cluster access used by a run
#[derive(Debug, Clone)]
pub struct Settings {
    /// Chart tool binary
    pub helm_binary: String,

    /// Used for resource field outputs
    pub kubectl_binary: String,

    /// Directory output values are written to, one file per output
    pub outputs_dir: PathBuf,

    /// Destination of `chart export` when staging OCI charts
    pub export_dir: String,

    /// Kubeconfig path; the default client configuration is used when unset
    pub kubeconfig: Option<PathBuf>,

    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            helm_binary: DEFAULT_HELM_BINARY.to_string(),
            kubectl_binary: DEFAULT_KUBECTL_BINARY.to_string(),
            outputs_dir: PathBuf::from(DEFAULT_OUTPUTS_DIR),
            export_dir: DEFAULT_EXPORT_DIR.to_string(),
            kubeconfig: None,
            debug: false,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_helm_binary(mut self, binary: impl Into<String>) -> Self {
        self.helm_binary = binary.into();
        self
    }

    pub fn with_kubectl_binary(mut self, binary: impl Into<String>) -> Self {
        self.kubectl_binary = binary.into();
        self
    }

    pub fn with_outputs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.outputs_dir = dir.into();
        self
    }

    pub fn with_export_dir(mut self, dir: impl Into<String>) -> Self {
        self.export_dir = dir.into();
        self
    }

    pub fn with_kubeconfig(mut self, path: Option<PathBuf>) -> Self {
        self.kubeconfig = path;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
