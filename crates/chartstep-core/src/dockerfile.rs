//! Dockerfile lines for the invocation image

use crate::classify::{Outcome, classify_repository_error};
use crate::config::MixinConfig;
use crate::error::Result;

const KUBECTL_INSTALL: &str = "RUN curl -o kubectl https://storage.googleapis.com/kubernetes-release/release/v1.22.1/bin/linux/amd64/kubectl &&\\\n    mv kubectl /usr/local/bin && chmod a+x /usr/local/bin/kubectl";

/// Render the Dockerfile lines installing the chart tool and kubectl, then
/// registering the configured repositories.
///
/// Repositories are added in name order. One without a url is skipped with
/// a warning.
pub fn render(config: &MixinConfig, helm_binary: &str) -> Result<String> {
    let client = config.client()?;

    let mut lines = vec![
        "ENV HELM_EXPERIMENTAL_OCI=1".to_string(),
        "RUN apt-get update && apt-get install -y curl".to_string(),
        format!(
            "RUN curl https://get.helm.sh/helm-{}-{}-{}.tar.gz --output helm3.tar.gz",
            client.version, client.platform, client.architecture
        ),
        "RUN tar -xvf helm3.tar.gz && rm helm3.tar.gz".to_string(),
        format!(
            "RUN mv {}-{}/helm /usr/local/bin/{}",
            client.platform, client.architecture, helm_binary
        ),
        KUBECTL_INSTALL.to_string(),
    ];

    if !config.repositories.is_empty() {
        lines.push("USER ${BUNDLE_USER}".to_string());
        for (name, repository) in &config.repositories {
            match repository.add_args(name) {
                Ok(args) => lines.push(format!("RUN {} {}", helm_binary, args.join(" "))),
                Err(e) => match classify_repository_error(&e) {
                    Outcome::Ignorable => {
                        tracing::warn!(repository = %name, "skipping repository: {}", e);
                    }
                    Outcome::Fatal => return Err(e),
                },
            }
        }
        lines.push(format!("RUN {} repo update", helm_binary));
        lines.push("USER root".to_string());
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}
