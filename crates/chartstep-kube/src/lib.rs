//! chartstep kube - runs verbs against the chart tool and the cluster
//!
//! This crate provides:
//! - **Runner**: external commands through tokio, with a scripted mock
//! - **OCI staging**: registry login, chart pull and export before install
//! - **Outputs**: values read from Secrets or resource fields after a step
//! - **Mixin**: the per-verb dispatcher tying everything together

pub mod error;
pub mod mixin;
pub mod oci;
pub mod outputs;
pub mod runner;
pub mod secrets;
pub mod settings;

pub use error::{KubeError, Result};
pub use mixin::Mixin;
pub use oci::{StagedChart, cleanup, stage_chart};
pub use outputs::{DirectoryOutputs, MemoryOutputs, OutputExtractor, OutputWriter};
pub use runner::{CommandOutput, CommandRunner, MockRunner, OutputMode, ProcessRunner, run_checked};
pub use secrets::{KubeSecrets, MockSecrets, SecretData, SecretSource};
pub use settings::Settings;
