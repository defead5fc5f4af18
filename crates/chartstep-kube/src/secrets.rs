//! Secret lookups
//!
//! Secret outputs read a single key of a Kubernetes Secret. The cluster
//! client is only built the first time a secret is actually needed, so verbs
//! without secret outputs never touch the kubeconfig.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::Client;
use kube::api::Api;
use kube::config::{Config, KubeConfigOptions, Kubeconfig};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::OnceCell;

use crate::error::{KubeError, Result};

/// Decoded secret data, key to raw bytes
pub type SecretData = BTreeMap<String, Vec<u8>>;

/// Source of Secret data
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch the data of a Secret.
    ///
    /// A missing Secret is reported as [`KubeError::SecretNotFound`].
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<SecretData>;
}

/// Reads Secrets from the cluster
pub struct KubeSecrets {
    kubeconfig: Option<PathBuf>,
    client: OnceCell<Client>,
}

impl KubeSecrets {
    /// Use the given kubeconfig, or the default client configuration
    pub fn new(kubeconfig: Option<PathBuf>) -> Self {
        Self {
            kubeconfig,
            client: OnceCell::new(),
        }
    }

    /// Create with an existing client
    pub fn with_client(client: Client) -> Self {
        Self {
            kubeconfig: None,
            client: OnceCell::new_with(Some(client)),
        }
    }

    async fn client(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| build_client(self.kubeconfig.as_deref()))
            .await
    }
}

async fn build_client(kubeconfig: Option<&Path>) -> Result<Client> {
    let Some(path) = kubeconfig else {
        return Ok(Client::try_default().await?);
    };

    tracing::debug!(kubeconfig = %path.display(), "loading kubeconfig");
    let kubeconfig = Kubeconfig::read_from(path).map_err(|e| KubeError::Kubeconfig(e.to_string()))?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| KubeError::Kubeconfig(e.to_string()))?;
    Ok(Client::try_from(config)?)
}

#[async_trait]
impl SecretSource for KubeSecrets {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<SecretData> {
        let client = self.client().await?.clone();
        let api: Api<Secret> = Api::namespaced(client, namespace);

        let secret = match api.get(name).await {
            Ok(secret) => secret,
            Err(e) => {
                let err = KubeError::from(e);
                if err.is_not_found() {
                    return Err(KubeError::SecretNotFound {
                        namespace: namespace.to_string(),
                        name: name.to_string(),
                        message: err.to_string(),
                    });
                }
                return Err(err);
            }
        };

        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.0))
            .collect())
    }
}

/// In-memory Secrets for testing
#[derive(Clone, Default)]
pub struct MockSecrets {
    /// namespace -> name -> data
    store: Arc<RwLock<BTreeMap<String, BTreeMap<String, SecretData>>>>,
    lookups: Arc<RwLock<Vec<String>>>,
}

impl MockSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret key
    pub fn with_value(
        self,
        namespace: &str,
        name: &str,
        key: &str,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.store
            .write()
            .unwrap()
            .entry(namespace.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    /// Every `namespace/name` looked up so far
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.read().unwrap().clone()
    }
}

#[async_trait]
impl SecretSource for MockSecrets {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<SecretData> {
        self.lookups
            .write()
            .unwrap()
            .push(format!("{}/{}", namespace, name));

        let store = self.store.read().unwrap();
        store
            .get(namespace)
            .and_then(|secrets| secrets.get(name))
            .cloned()
            .ok_or_else(|| KubeError::SecretNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: format!("secrets \"{}\" not found", name),
            })
    }
}
