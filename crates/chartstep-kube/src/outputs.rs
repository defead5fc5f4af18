//! Step outputs
//!
//! After a step succeeds, each declared output is read from a Secret key or
//! from a resource field (through `kubectl get -o=jsonpath=...`) and persisted
//! under its name. Extraction stops at the first failure.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chartstep_core::{CommandLine, OutputSource, OutputSpec};

use crate::error::{KubeError, Result};
use crate::runner::{CommandRunner, OutputMode, run_checked};
use crate::secrets::SecretSource;

const DEFAULT_NAMESPACE: &str = "default";

/// Persists output values
pub trait OutputWriter: Send + Sync {
    /// Write a value, replacing any earlier value with the same name
    fn write_output(&self, name: &str, value: &[u8]) -> std::io::Result<()>;
}

/// Writes each output to a file named after it
#[derive(Debug, Clone)]
pub struct DirectoryOutputs {
    dir: PathBuf,
}

impl DirectoryOutputs {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl OutputWriter for DirectoryOutputs {
    fn write_output(&self, name: &str, value: &[u8]) -> std::io::Result<()> {
        // Outputs are plain files directly under the directory
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid output name '{}'", name),
            ));
        }
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.dir.join(name), value)
    }
}

/// Keeps outputs in memory for testing
#[derive(Clone, Default)]
pub struct MemoryOutputs {
    values: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.values.read().unwrap().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutputWriter for MemoryOutputs {
    fn write_output(&self, name: &str, value: &[u8]) -> std::io::Result<()> {
        self.values
            .write()
            .unwrap()
            .insert(name.to_string(), value.to_vec());
        Ok(())
    }
}

/// Reads declared outputs and hands them to an [`OutputWriter`]
pub struct OutputExtractor<'a> {
    kubectl: &'a str,
    runner: &'a dyn CommandRunner,
    secrets: &'a dyn SecretSource,
    writer: &'a dyn OutputWriter,
}

impl<'a> OutputExtractor<'a> {
    pub fn new(
        kubectl: &'a str,
        runner: &'a dyn CommandRunner,
        secrets: &'a dyn SecretSource,
        writer: &'a dyn OutputWriter,
    ) -> Self {
        Self {
            kubectl,
            runner,
            secrets,
            writer,
        }
    }

    /// Extract every output in order.
    ///
    /// Secret outputs read from the output namespace, else the step
    /// namespace, else `default`. Resource outputs only pass a namespace to
    /// kubectl when the output sets one.
    pub async fn extract(&self, step_namespace: &str, outputs: &[OutputSpec]) -> Result<()> {
        for output in outputs {
            let value = match output.source() {
                Some(OutputSource::Secret { name, key }) => {
                    let namespace = first_non_empty(&[output.namespace.as_str(), step_namespace])
                        .unwrap_or(DEFAULT_NAMESPACE);
                    self.secret_value(namespace, name, key).await?
                }
                Some(OutputSource::Resource {
                    resource_type,
                    resource_name,
                    json_path,
                }) => self
                    .resource_value(resource_type, resource_name, &output.namespace, json_path)
                    .await
                    .map_err(|source| KubeError::ResourceOutput {
                        name: output.name.clone(),
                        source: Box::new(source),
                    })?,
                None => {
                    tracing::debug!(output = %output.name, "output has no complete source, skipping");
                    continue;
                }
            };

            self.writer
                .write_output(&output.name, &value)
                .map_err(|source| KubeError::WriteOutput {
                    name: output.name.clone(),
                    source,
                })?;
            tracing::debug!(output = %output.name, bytes = value.len(), "wrote output");
        }
        Ok(())
    }

    async fn secret_value(&self, namespace: &str, name: &str, key: &str) -> Result<Vec<u8>> {
        tracing::debug!("retrieving secret {}/{} and using key {} as an output", namespace, name, key);

        let mut data = self.secrets.get_secret(namespace, name).await?;
        data.remove(key).ok_or_else(|| KubeError::SecretKeyMissing {
            key: key.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    async fn resource_value(
        &self,
        resource_type: &str,
        resource_name: &str,
        namespace: &str,
        json_path: &str,
    ) -> Result<Vec<u8>> {
        let mut command = CommandLine::new(self.kubectl)
            .args(["get", resource_type, resource_name])
            .arg(format!("-o=jsonpath={}", json_path));
        if !namespace.is_empty() {
            command = command.arg(format!("--namespace={}", namespace));
        }

        let output = run_checked(self.runner, &command, OutputMode::Capture).await?;
        Ok(output.stdout)
    }
}

fn first_non_empty<'s>(candidates: &[&'s str]) -> Option<&'s str> {
    candidates.iter().copied().find(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, MockRunner};
    use crate::secrets::MockSecrets;

    struct FailingWriter;

    impl OutputWriter for FailingWriter {
        fn write_output(&self, _name: &str, _value: &[u8]) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    #[tokio::test]
    async fn test_secret_namespace_resolution() {
        let runner = MockRunner::new();
        let secrets = MockSecrets::new()
            .with_value("override", "creds", "user", "admin")
            .with_value("step-ns", "creds", "password", "s3cret")
            .with_value("default", "creds", "token", "abc");
        let writer = MemoryOutputs::new();
        let extractor = OutputExtractor::new("kubectl", &runner, &secrets, &writer);

        let outputs = vec![
            OutputSpec::secret("user", "creds", "user").in_namespace("override"),
            OutputSpec::secret("password", "creds", "password"),
        ];
        extractor.extract("step-ns", &outputs).await.unwrap();
        extractor
            .extract("", &[OutputSpec::secret("token", "creds", "token")])
            .await
            .unwrap();

        assert_eq!(secrets.lookups(), vec!["override/creds", "step-ns/creds", "default/creds"]);
        assert_eq!(writer.get("user").unwrap(), b"admin");
        assert_eq!(writer.get("password").unwrap(), b"s3cret");
        assert_eq!(writer.get("token").unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_missing_key_stops_extraction() {
        let runner = MockRunner::new();
        let secrets = MockSecrets::new().with_value("default", "creds", "password", "s3cret");
        let writer = MemoryOutputs::new();
        let extractor = OutputExtractor::new("kubectl", &runner, &secrets, &writer);

        let outputs = vec![
            OutputSpec::secret("user", "creds", "username"),
            OutputSpec::secret("password", "creds", "password"),
        ];
        let err = extractor.extract("", &outputs).await.unwrap_err();

        assert_eq!(err.to_string(), "couldn't find key username in secret default/creds");
        assert!(writer.is_empty());
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let runner = MockRunner::new();
        let secrets = MockSecrets::new();
        let writer = MemoryOutputs::new();
        let extractor = OutputExtractor::new("kubectl", &runner, &secrets, &writer);

        let err = extractor
            .extract("db", &[OutputSpec::secret("pw", "creds", "password")])
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("error getting secret db/creds: "));
    }

    #[tokio::test]
    async fn test_resource_output() {
        let runner = MockRunner::new().on("get service", CommandOutput::ok("10.0.0.12"));
        let secrets = MockSecrets::new();
        let writer = MemoryOutputs::new();
        let extractor = OutputExtractor::new("kubectl", &runner, &secrets, &writer);

        let outputs = vec![
            OutputSpec::resource("ip", "service", "mysql", "{.spec.clusterIP}"),
            OutputSpec::resource("ip2", "service", "mysql", "{.spec.clusterIP}").in_namespace("db"),
        ];
        extractor.extract("step-ns", &outputs).await.unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "kubectl get service mysql -o=jsonpath={.spec.clusterIP}",
                "kubectl get service mysql -o=jsonpath={.spec.clusterIP} --namespace=db",
            ]
        );
        assert_eq!(writer.get("ip").unwrap(), b"10.0.0.12");
        assert!(secrets.lookups().is_empty());
    }

    #[tokio::test]
    async fn test_failed_kubectl_is_fatal() {
        let runner = MockRunner::new().on("get service", CommandOutput::failed(1, "NotFound"));
        let secrets = MockSecrets::new();
        let writer = MemoryOutputs::new();
        let extractor = OutputExtractor::new("kubectl", &runner, &secrets, &writer);

        let err = extractor
            .extract("", &[OutputSpec::resource("ip", "service", "mysql", "{.spec.clusterIP}")])
            .await
            .unwrap_err();
        let KubeError::ResourceOutput { name, source } = &err else {
            panic!("Expected an output error, got {:?}", err);
        };
        assert_eq!(name, "ip");
        assert!(matches!(**source, KubeError::CommandFailed { code: Some(1), .. }));
        assert!(writer.is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_outputs_are_skipped() {
        let runner = MockRunner::new();
        let secrets = MockSecrets::new();
        let writer = MemoryOutputs::new();
        let extractor = OutputExtractor::new("kubectl", &runner, &secrets, &writer);

        let incomplete = OutputSpec {
            name: "half".into(),
            secret: "creds".into(),
            ..Default::default()
        };
        extractor.extract("", &[incomplete]).await.unwrap();
        assert!(runner.commands().is_empty());
        assert!(secrets.lookups().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_is_wrapped() {
        let runner = MockRunner::new();
        let secrets = MockSecrets::new().with_value("default", "creds", "password", "s3cret");
        let extractor = OutputExtractor::new("kubectl", &runner, &secrets, &FailingWriter);

        let err = extractor
            .extract("", &[OutputSpec::secret("password", "creds", "password")])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unable to write output 'password': read-only");
    }

    #[test]
    fn test_directory_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DirectoryOutputs::new(dir.path().join("outputs"));

        writer.write_output("password", b"first").unwrap();
        writer.write_output("password", b"second").unwrap();

        let stored = std::fs::read(dir.path().join("outputs").join("password")).unwrap();
        assert_eq!(stored, b"second");
    }

    #[test]
    fn test_directory_outputs_reject_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DirectoryOutputs::new(dir.path().join("outputs"));

        for name in ["../escaped", "nested/name", "..", "", "dir\\name"] {
            let err = writer.write_output(name, b"value").unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput, "name {:?}", name);
        }

        assert!(!dir.path().join("escaped").exists());
        assert!(!dir.path().join("outputs").exists());
    }
}
