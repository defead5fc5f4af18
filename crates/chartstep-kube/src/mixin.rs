//! Per-verb dispatcher
//!
//! Each verb decodes its single step, builds the command line, prints it,
//! runs it and extracts the declared outputs. Install additionally stages
//! OCI charts first and removes the export afterwards.

use std::io::Write;
use std::path::Path;

use chartstep_core::{
    ActionStep, BuildInput, CommandLine, ExecuteArguments, InstallArguments, Outcome,
    UninstallArguments, UpgradeArguments, Verb, classify_uninstall_failure, decode_action,
    dockerfile, encode_action, execute_args, install_args, uninstall_args, upgrade_args,
};

use crate::error::{KubeError, Result};
use crate::oci;
use crate::outputs::{DirectoryOutputs, OutputExtractor, OutputWriter};
use crate::runner::{CommandRunner, OutputMode, ProcessRunner, run_checked};
use crate::secrets::{KubeSecrets, SecretSource};
use crate::settings::{DEFAULT_HELM_BINARY, Settings};

/// Runs verbs against the chart tool and the cluster
pub struct Mixin {
    settings: Settings,
    runner: Box<dyn CommandRunner>,
    secrets: Box<dyn SecretSource>,
    outputs: Box<dyn OutputWriter>,
    out: Box<dyn Write + Send>,
}

impl Mixin {
    /// Dispatcher using child processes, the cluster, the outputs directory
    /// and stdout
    pub fn new(settings: Settings) -> Self {
        let secrets = KubeSecrets::new(settings.kubeconfig.clone());
        let outputs = DirectoryOutputs::new(settings.outputs_dir.clone());
        Self {
            settings,
            runner: Box::new(ProcessRunner::new()),
            secrets: Box::new(secrets),
            outputs: Box::new(outputs),
            out: Box::new(std::io::stdout()),
        }
    }

    pub fn with_runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    pub fn with_secrets(mut self, secrets: impl SecretSource + 'static) -> Self {
        self.secrets = Box::new(secrets);
        self
    }

    pub fn with_outputs(mut self, outputs: impl OutputWriter + 'static) -> Self {
        self.outputs = Box::new(outputs);
        self
    }

    /// Where command lines and generated documents are printed
    pub fn with_out(mut self, out: impl Write + Send + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Decode a verb payload and run its step
    pub async fn run(&mut self, verb: Verb, payload: &str) -> Result<()> {
        let step = decode_action(verb, payload)?;
        if self.settings.debug {
            tracing::debug!("parsed step:\n{}", parsed_step_dump(&step)?);
        }
        self.dispatch(&step).await
    }

    pub async fn dispatch(&mut self, step: &ActionStep) -> Result<()> {
        if !step.common().description.is_empty() {
            tracing::info!("{}", step.common().description);
        }
        match step {
            ActionStep::Install(args) => self.install(args).await,
            ActionStep::Upgrade(args) => self.upgrade(args).await,
            ActionStep::Uninstall(args) => self.uninstall(args).await,
            ActionStep::Execute(args) => self.execute(args).await,
        }
    }

    /// Install a release, staging OCI charts first.
    ///
    /// The staged export is removed whether or not the install succeeded;
    /// the install error wins over a cleanup error.
    pub async fn install(&mut self, step: &InstallArguments) -> Result<()> {
        let staged =
            oci::stage_chart(self.runner.as_ref(), &self.settings, step, self.out.as_mut()).await?;

        let Some(staged) = staged else {
            return self.install_chart(step).await;
        };

        let local = InstallArguments {
            chart: staged.path.display().to_string(),
            ..step.clone()
        };
        let installed = self.install_chart(&local).await;
        let cleaned = oci::cleanup(self.runner.as_ref(), &staged, self.out.as_mut()).await;
        installed.and(cleaned)
    }

    async fn install_chart(&mut self, step: &InstallArguments) -> Result<()> {
        let command = self.helm().args(install_args(step));
        self.run_step(&command).await?;
        self.extract_outputs(&step.namespace, step.common.outputs.as_slice())
            .await
    }

    pub async fn upgrade(&mut self, step: &UpgradeArguments) -> Result<()> {
        let command = self.helm().args(upgrade_args(step));
        self.run_step(&command).await?;
        self.extract_outputs(&step.namespace, step.common.outputs.as_slice())
            .await
    }

    /// Uninstall every release of the step.
    ///
    /// Releases that are already gone count as uninstalled. Other failures
    /// are collected and reported together once every release was tried.
    pub async fn uninstall(&mut self, step: &UninstallArguments) -> Result<()> {
        let mut failures = Vec::new();

        for release in &step.releases {
            let command = self.helm().args(uninstall_args(step, release));
            writeln!(self.out, "{}", command)?;

            let output = match self.runner.run(&command, OutputMode::Stream).await {
                Ok(output) => output,
                Err(e) => {
                    failures.push(format!("{}: {}", release, e));
                    continue;
                }
            };
            if output.success() {
                continue;
            }

            match classify_uninstall_failure(&output.combined_lossy(), release) {
                Outcome::Ignorable => {
                    tracing::info!(release = %release, "release is already uninstalled");
                }
                Outcome::Fatal => {
                    let err = KubeError::CommandFailed {
                        command: command.to_string(),
                        code: output.code,
                    };
                    failures.push(format!("{}: {}", release, err));
                }
            }
        }

        if !failures.is_empty() {
            return Err(KubeError::UninstallFailed { failures });
        }
        Ok(())
    }

    /// Run a free-form step
    pub async fn execute(&mut self, step: &ExecuteArguments) -> Result<()> {
        let command = self.helm().args(execute_args(step));
        self.run_step(&command).await?;
        self.extract_outputs(&step.namespace, step.common.outputs.as_slice())
            .await
    }

    /// Print the Dockerfile lines for a build payload
    pub fn build(&mut self, payload: &str) -> Result<()> {
        let input = BuildInput::from_yaml(payload)?;
        let lines = dockerfile::render(&input.config, self.helm_binary_name())?;
        self.out.write_all(lines.as_bytes())?;
        Ok(())
    }

    fn helm(&self) -> CommandLine {
        CommandLine::new(self.settings.helm_binary.as_str())
    }

    /// Binary name the image installs the chart tool under
    fn helm_binary_name(&self) -> &str {
        Path::new(&self.settings.helm_binary)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(DEFAULT_HELM_BINARY)
    }

    async fn run_step(&mut self, command: &CommandLine) -> Result<()> {
        writeln!(self.out, "{}", command)?;
        self.out.flush()?;
        run_checked(self.runner.as_ref(), command, OutputMode::Stream).await?;
        Ok(())
    }

    async fn extract_outputs(
        &self,
        namespace: &str,
        outputs: &[chartstep_core::OutputSpec],
    ) -> Result<()> {
        if outputs.is_empty() {
            return Ok(());
        }
        OutputExtractor::new(
            &self.settings.kubectl_binary,
            self.runner.as_ref(),
            self.secrets.as_ref(),
            self.outputs.as_ref(),
        )
        .extract(namespace, outputs)
        .await
    }
}

/// Decoded step as YAML, without credentials
fn parsed_step_dump(step: &ActionStep) -> Result<String> {
    Ok(encode_action(&step.redacted())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::MemoryOutputs;
    use crate::runner::{CommandOutput, MockRunner};
    use crate::secrets::MockSecrets;
    use std::sync::{Arc, Mutex};

    /// Captures what the dispatcher prints
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct Harness {
        mixin: Mixin,
        runner: MockRunner,
        outputs: MemoryOutputs,
        out: SharedBuffer,
    }

    fn harness(runner: MockRunner, secrets: MockSecrets) -> Harness {
        let outputs = MemoryOutputs::new();
        let out = SharedBuffer::default();
        let mixin = Mixin::new(Settings::default())
            .with_runner(runner.clone())
            .with_secrets(secrets)
            .with_outputs(outputs.clone())
            .with_out(out.clone());
        Harness {
            mixin,
            runner,
            outputs,
            out,
        }
    }

    #[tokio::test]
    async fn test_install_prints_runs_and_extracts() {
        let payload = r#"
install:
  - helm3:
      description: Install MySQL
      name: porter-ci-mysql
      chart: bitnami/mysql
      version: 6.14.2
      namespace: porter-ci
      outputs:
        - name: mysql-root-password
          secret: porter-ci-mysql
          key: mysql-root-password
"#;
        let secrets =
            MockSecrets::new().with_value("porter-ci", "porter-ci-mysql", "mysql-root-password", "pw");
        let mut h = harness(MockRunner::new(), secrets);

        h.mixin.run(Verb::Install, payload).await.unwrap();

        let expected = "helm3 install porter-ci-mysql bitnami/mysql --namespace porter-ci --version 6.14.2 --atomic --create-namespace";
        assert_eq!(h.runner.commands(), vec![expected]);
        assert_eq!(h.out.contents(), format!("{}\n", expected));
        assert_eq!(h.outputs.get("mysql-root-password").unwrap(), b"pw");
    }

    #[tokio::test]
    async fn test_failed_install_skips_outputs() {
        let payload = r#"
install:
  - helm3:
      name: mysql
      chart: bitnami/mysql
      outputs:
        - name: ip
          resourceType: service
          resourceName: mysql
          jsonPath: "{.spec.clusterIP}"
"#;
        let runner = MockRunner::new().on("install mysql", CommandOutput::failed(1, "Error: boom"));
        let mut h = harness(runner, MockSecrets::new());

        let err = h.mixin.run(Verb::Install, payload).await.unwrap_err();
        assert!(matches!(err, KubeError::CommandFailed { code: Some(1), .. }));
        assert_eq!(h.runner.commands().len(), 1);
        assert!(h.outputs.is_empty());
    }

    #[tokio::test]
    async fn test_two_steps_run_nothing() {
        let payload = r#"
upgrade:
  - helm3:
      name: a
      chart: stable/a
  - helm3:
      name: b
      chart: stable/b
"#;
        let mut h = harness(MockRunner::new(), MockSecrets::new());
        let err = h.mixin.run(Verb::Upgrade, payload).await.unwrap_err();

        assert_eq!(err.to_string(), "expected a single step, but got 2");
        assert!(h.runner.commands().is_empty());
        assert!(h.out.contents().is_empty());
    }

    #[tokio::test]
    async fn test_install_oci_chart() {
        let payload = r#"
install:
  - helm3:
      name: mysql
      chart: oci://ghcr.io/org/mysql:1.2.3
      namespace: db
"#;
        let runner = MockRunner::new().on(
            "chart export",
            CommandOutput::ok("Exported chart to /tmp/mysql/\n"),
        );
        let mut h = harness(runner, MockSecrets::new());

        h.mixin.run(Verb::Install, payload).await.unwrap();

        assert_eq!(
            h.runner.commands(),
            vec![
                "helm3 chart pull ghcr.io/org/mysql:1.2.3",
                "helm3 chart export ghcr.io/org/mysql:1.2.3 --destination /tmp/",
                "helm3 install mysql /tmp/mysql/ --namespace db --atomic --create-namespace",
                "rm -rf /tmp/mysql/",
            ]
        );
    }

    #[tokio::test]
    async fn test_oci_cleanup_runs_after_failed_install() {
        let payload = r#"
install:
  - helm3:
      name: mysql
      chart: oci://ghcr.io/org/mysql:1.2.3
"#;
        let runner = MockRunner::new()
            .on("chart export", CommandOutput::ok("Exported chart to /tmp/mysql/\n"))
            .on("install mysql", CommandOutput::failed(1, "Error: boom"));
        let mut h = harness(runner, MockSecrets::new());

        let err = h.mixin.run(Verb::Install, payload).await.unwrap_err();
        assert!(err.to_string().contains("helm3 install mysql /tmp/mysql/"));
        assert_eq!(h.runner.commands().last().unwrap(), "rm -rf /tmp/mysql/");
    }

    #[tokio::test]
    async fn test_uninstall_ignores_absent_releases() {
        let payload = r#"
uninstall:
  - helm3:
      namespace: db
      releases: [a, b]
"#;
        let runner =
            MockRunner::new().on("uninstall a", CommandOutput::failed(1, "Error: release: \"a\" not found"));
        let mut h = harness(runner, MockSecrets::new());

        h.mixin.run(Verb::Uninstall, payload).await.unwrap();
        assert_eq!(
            h.runner.commands(),
            vec!["helm3 uninstall a --namespace db", "helm3 uninstall b --namespace db"]
        );
    }

    #[tokio::test]
    async fn test_uninstall_collects_every_failure() {
        let payload = r#"
uninstall:
  - helm3:
      releases: [a, b, c]
"#;
        let runner = MockRunner::new()
            .on("uninstall a", CommandOutput::failed(1, "Error: cluster unreachable"))
            .on("uninstall c", CommandOutput::failed(2, "Error: timed out waiting"));
        let mut h = harness(runner, MockSecrets::new());

        let err = h.mixin.run(Verb::Uninstall, payload).await.unwrap_err();
        let KubeError::UninstallFailed { failures } = &err else {
            panic!("Expected an aggregated failure, got {:?}", err);
        };
        assert_eq!(failures.len(), 2);
        assert!(failures[0].starts_with("a: "));
        assert!(failures[1].starts_with("c: "));
        assert_eq!(h.runner.commands().len(), 3);
    }

    #[tokio::test]
    async fn test_invoke() {
        let payload = r#"
status:
  - helm3:
      description: MySQL Status
      arguments: [status, mysql]
      flags:
        o: yaml
"#;
        let mut h = harness(MockRunner::new(), MockSecrets::new());
        h.mixin.run(Verb::Invoke, payload).await.unwrap();
        assert_eq!(h.runner.commands(), vec!["helm3 status mysql -o yaml"]);
    }

    #[tokio::test]
    async fn test_upgrade_uses_configured_binary() {
        let payload = r#"
upgrade:
  - helm3:
      name: mysql
      chart: bitnami/mysql
      atomic: false
      createNamespace: false
"#;
        let mut h = harness(MockRunner::new(), MockSecrets::new());
        h.mixin.settings.helm_binary = "/usr/local/bin/helm".into();

        h.mixin.run(Verb::Upgrade, payload).await.unwrap();
        assert_eq!(
            h.runner.commands(),
            vec!["/usr/local/bin/helm upgrade --install mysql bitnami/mysql"]
        );
    }

    #[test]
    fn test_build() {
        let mut h = harness(MockRunner::new(), MockSecrets::new());
        h.mixin
            .build("config:\n  repositories:\n    stable:\n      url: https://charts.example.com\n")
            .unwrap();

        let printed = h.out.contents();
        assert!(printed.starts_with("ENV HELM_EXPERIMENTAL_OCI=1\n"));
        assert!(printed.ends_with(
            "USER ${BUNDLE_USER}\nRUN helm3 repo add stable https://charts.example.com\nRUN helm3 repo update\nUSER root\n"
        ));
    }

    #[tokio::test]
    async fn test_debug_run_never_prints_credentials() {
        let payload = r#"
install:
  - helm3:
      name: mysql
      chart: oci://ghcr.io/org/mysql:1.2.3
      username: user
      password: hunter2
"#;
        let runner = MockRunner::new().on(
            "chart export",
            CommandOutput::ok("Exported chart to /tmp/mysql/\n"),
        );
        let mut h = harness(runner, MockSecrets::new());
        h.mixin.settings.debug = true;

        h.mixin.run(Verb::Install, payload).await.unwrap();
        assert!(!h.out.contents().contains("hunter2"));

        let step = decode_action(Verb::Install, payload).unwrap();
        let dump = parsed_step_dump(&step).unwrap();
        assert!(dump.contains("name: mysql"));
        assert!(!dump.contains("hunter2"));
    }
}
