//! Step definitions for each verb
//!
//! Every verb payload carries a single step. Steps share a [`StepCommon`]
//! record (description and outputs) and add their verb-specific arguments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fields shared by every step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCommon {
    /// Free text shown by the orchestrator
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Values to extract once the step has run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputSpec>,
}

/// A value to extract after a step runs
///
/// Exactly one source applies: a key of a Secret, or a JSONPath
/// expression evaluated against a named resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    /// Name the value is persisted under
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_name: String,

    /// Overrides the step namespace for this output
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub json_path: String,
}

/// Where an output value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource<'a> {
    Secret {
        name: &'a str,
        key: &'a str,
    },
    Resource {
        resource_type: &'a str,
        resource_name: &'a str,
        json_path: &'a str,
    },
}

impl OutputSpec {
    /// Secret output
    pub fn secret(name: impl Into<String>, secret: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
            key: key.into(),
            ..Default::default()
        }
    }

    /// Resource field output
    pub fn resource(
        name: impl Into<String>,
        resource_type: impl Into<String>,
        resource_name: impl Into<String>,
        json_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
            json_path: json_path.into(),
            ..Default::default()
        }
    }

    /// Override the namespace the output is read from
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// The populated extraction mode, secret mode first.
    ///
    /// Returns `None` when neither mode is fully populated.
    pub fn source(&self) -> Option<OutputSource<'_>> {
        if !self.secret.is_empty() && !self.key.is_empty() {
            return Some(OutputSource::Secret {
                name: &self.secret,
                key: &self.key,
            });
        }
        if !self.resource_type.is_empty()
            && !self.resource_name.is_empty()
            && !self.json_path.is_empty()
        {
            return Some(OutputSource::Resource {
                resource_type: &self.resource_type,
                resource_name: &self.resource_name,
                json_path: &self.json_path,
            });
        }
        None
    }
}

/// Arguments of an install step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallArguments {
    #[serde(flatten)]
    pub common: StepCommon,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Release name
    pub name: String,

    /// `repo/chart`, a local path, or `oci://host/path[:tag]`
    pub chart: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Values files, in the order they are layered
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,

    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "scalar_map::deserialize"
    )]
    pub set: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub devel: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub no_hooks: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub replace: bool,

    /// Run as `upgrade --install` instead of `install`
    #[serde(default, skip_serializing_if = "is_false")]
    pub upsert: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_crds: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub wait: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub debug: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timeout: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,

    /// Unset means `--atomic`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atomic: Option<bool>,

    /// Unset means `--create-namespace`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_namespace: Option<bool>,
}

/// Arguments of an upgrade step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeArguments {
    #[serde(flatten)]
    pub common: StepCommon,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Release name
    pub name: String,

    pub chart: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,

    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "scalar_map::deserialize"
    )]
    pub set: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "is_false", alias = "nohooks")]
    pub no_hooks: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub wait: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub reset_values: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub reuse_values: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_crds: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub debug: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timeout: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atomic: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_namespace: Option<bool>,
}

/// Arguments of an uninstall step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallArguments {
    #[serde(flatten)]
    pub common: StepCommon,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Releases to remove, one command each
    #[serde(default)]
    pub releases: Vec<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub no_hooks: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub wait: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timeout: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub debug: bool,
}

/// Arguments of a free-form step run by a custom action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteArguments {
    #[serde(flatten)]
    pub common: StepCommon,

    /// Namespace used to resolve secret outputs
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Positional arguments, passed through as-is
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,

    #[serde(default, skip_serializing_if = "Flags::is_empty")]
    pub flags: Flags,
}

/// Named flags of an execute step
///
/// A flag may be bare (`null`), carry one value, or repeat with a list of
/// values. Flags are kept sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(pub BTreeMap<String, Vec<String>>);

impl Flags {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.0.insert(name.into(), values);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

impl Serialize for Flags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, values) in &self.0 {
            match values.as_slice() {
                [] => map.serialize_entry(name, &Option::<String>::None)?,
                [single] => map.serialize_entry(name, single)?,
                many => map.serialize_entry(name, many)?,
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Flags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        use serde_yaml::Value;

        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
        let mut flags = BTreeMap::new();
        for (name, value) in raw {
            let values = match value {
                Value::Null => Vec::new(),
                Value::Sequence(items) => items
                    .into_iter()
                    .map(|item| {
                        scalar_map::scalar_to_string(item)
                            .ok_or_else(|| D::Error::custom(format!("flag {name} has a non-scalar value")))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                other => vec![scalar_map::scalar_to_string(other).ok_or_else(|| {
                    D::Error::custom(format!("flag {name} has a non-scalar value"))
                })?],
            };
            flags.insert(name, values);
        }
        Ok(Flags(flags))
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// `set:` entries are strings on the command line, but YAML happily types
/// `replicas: 3` or `enabled: true`. Accept any scalar and keep its text.
mod scalar_map {
    use serde::{Deserialize, Deserializer};
    use serde_yaml::Value;
    use std::collections::BTreeMap;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
        raw.into_iter()
            .map(|(key, value)| match scalar_to_string(value) {
                Some(text) => Ok((key, text)),
                None => Err(D::Error::custom(format!(
                    "set value for {key} must be a scalar"
                ))),
            })
            .collect()
    }

    pub(super) fn scalar_to_string(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Null => Some(String::new()),
            _ => None,
        }
    }
}
