//! Mixin configuration read at build time

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};

pub const DEFAULT_CLIENT_VERSION: &str = "v3.7.0";
pub const DEFAULT_CLIENT_PLATFORM: &str = "linux";
pub const DEFAULT_CLIENT_ARCHITECTURE: &str = "amd64";

/// Constraint shown to users when the client version is rejected
const CLIENT_VERSION_CONSTRAINT: &str = "^v3.x";

/// Build payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildInput {
    #[serde(default)]
    pub config: MixinConfig,
}

impl BuildInput {
    /// Parse a build payload. An empty payload means default configuration.
    pub fn from_yaml(payload: &str) -> Result<Self> {
        if payload.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str::<Option<Self>>(payload)?.unwrap_or_default())
    }
}

/// Mixin configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixinConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_platform: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_architecture: Option<String>,

    /// Chart repositories registered in the image, by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub repositories: BTreeMap<String, Repository>,
}

/// A chart repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub url: String,
}

/// Resolved chart tool download coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSpec {
    pub version: String,
    pub platform: String,
    pub architecture: String,
}

impl MixinConfig {
    /// Resolve the client download, applying defaults and checking the version
    pub fn client(&self) -> Result<ClientSpec> {
        let version = match self.client_version.as_deref().filter(|v| !v.is_empty()) {
            Some(version) => {
                validate_client_version(version)?;
                version.to_string()
            }
            None => DEFAULT_CLIENT_VERSION.to_string(),
        };

        Ok(ClientSpec {
            version,
            platform: non_empty_or(&self.client_platform, DEFAULT_CLIENT_PLATFORM),
            architecture: non_empty_or(&self.client_architecture, DEFAULT_CLIENT_ARCHITECTURE),
        })
    }
}

impl Repository {
    /// `repo add` arguments for this repository
    pub fn add_args(&self, name: &str) -> Result<Vec<String>> {
        if self.url.is_empty() {
            return Err(CoreError::MissingRepositoryUrl {
                name: name.to_string(),
            });
        }
        Ok(vec![
            "repo".to_string(),
            "add".to_string(),
            name.to_string(),
            self.url.clone(),
        ])
    }
}

fn non_empty_or(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Check a client version is semver (leading `v` allowed) with major version 3.
///
/// Missing minor or patch components count as zero, so `v3.6` is accepted.
pub fn validate_client_version(version: &str) -> Result<semver::Version> {
    let parsed = semver::Version::parse(&pad_version(version)).map_err(|e| {
        CoreError::InvalidClientVersion {
            version: version.to_string(),
            reason: e.to_string(),
        }
    })?;

    let requirement = semver::VersionReq::parse("^3").map_err(|e| CoreError::InvalidClientVersion {
        version: version.to_string(),
        reason: e.to_string(),
    })?;

    if !requirement.matches(&parsed) {
        return Err(CoreError::UnsupportedClientVersion {
            version: version.to_string(),
            constraint: CLIENT_VERSION_CONSTRAINT.to_string(),
        });
    }
    Ok(parsed)
}

fn pad_version(version: &str) -> String {
    let trimmed = version.strip_prefix('v').unwrap_or(version);
    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split);

    let components = core.split('.').count();
    let all_numeric = core
        .split('.')
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()));
    if !all_numeric || components >= 3 {
        return trimmed.to_string();
    }

    let padding = ".0".repeat(3 - components);
    format!("{core}{padding}{rest}")
}
