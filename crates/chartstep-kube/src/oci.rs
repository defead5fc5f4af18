//! OCI chart staging
//!
//! Log into the registry when credentials are given, pull the chart, export
//! it to the export directory, and remove the export once the release has
//! been installed. Any failing sub-command aborts the remaining ones.

use std::io::Write;
use std::path::PathBuf;

use chartstep_core::oci::{export_args, login_args, parse_export_path, pull_args};
use chartstep_core::{CommandLine, OciChart};

use crate::error::{KubeError, Result};
use crate::runner::{CommandRunner, OutputMode, run_checked};
use crate::settings::Settings;

/// A chart exported to the local filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedChart {
    pub path: PathBuf,
}

/// Stage an OCI chart for installation.
///
/// Returns `None` when the chart is not an OCI reference.
pub async fn stage_chart(
    runner: &dyn CommandRunner,
    settings: &Settings,
    chart: &impl OciChart,
    out: &mut (dyn Write + Send),
) -> Result<Option<StagedChart>> {
    let Some(reference) = chart.oci_reference() else {
        return Ok(None);
    };
    let fallback = chart.fallback_version();
    let helm = settings.helm_binary.as_str();

    match login_args(&reference, &chart.registry_credentials())? {
        Some(args) => {
            // Credentials stay out of the echoed line and of error messages
            let redacted = format!("{} registry login {}", helm, reference.registry);
            writeln!(out, "{}", redacted)?;

            let login = CommandLine::new(helm).args(args);
            let output = runner.run(&login, OutputMode::Stream).await?;
            if !output.success() {
                return Err(KubeError::CommandFailed {
                    command: redacted,
                    code: output.code,
                });
            }
        }
        None => tracing::debug!(registry = %reference.registry, "no registry credentials, skipping login"),
    }

    let pull = CommandLine::new(helm).args(pull_args(&reference, fallback));
    writeln!(out, "{}", pull)?;
    run_checked(runner, &pull, OutputMode::Stream).await?;

    let export = CommandLine::new(helm).args(export_args(&reference, fallback, &settings.export_dir));
    writeln!(out, "{}", export)?;
    let output = run_checked(runner, &export, OutputMode::Capture).await?;
    out.write_all(&output.stdout)?;

    let path = parse_export_path(&output.stdout_lossy()).map_err(KubeError::from)?;
    tracing::debug!(path = %path.display(), "chart exported");
    Ok(Some(StagedChart { path }))
}

/// Remove an exported chart
pub async fn cleanup(
    runner: &dyn CommandRunner,
    staged: &StagedChart,
    out: &mut (dyn Write + Send),
) -> Result<()> {
    let remove = CommandLine::new("rm").arg("-rf").arg(staged.path.display().to_string());
    writeln!(out, "{}", remove)?;
    run_checked(runner, &remove, OutputMode::Stream).await?;
    Ok(())
}
