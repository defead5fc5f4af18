//! Shared utility functions for CLI commands

use std::io::Read;

use chartstep_kube::Settings;

use crate::Cli;
use crate::error::Result;

/// Runtime settings from the global flags
pub fn settings(cli: &Cli) -> Settings {
    Settings::new()
        .with_helm_binary(cli.helm_binary.clone())
        .with_kubectl_binary(cli.kubectl_binary.clone())
        .with_outputs_dir(cli.outputs_dir.clone())
        .with_export_dir(cli.export_dir.clone())
        .with_kubeconfig(cli.kubeconfig.clone())
        .with_debug(cli.debug)
}

/// Read the whole step payload from stdin
pub fn read_payload() -> Result<String> {
    let mut payload = String::new();
    std::io::stdin().read_to_string(&mut payload)?;
    Ok(payload)
}
