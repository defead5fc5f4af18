//! Verb payload decoding
//!
//! A payload is a YAML document keyed by action name, each key holding a
//! list of `{helm3: <step>}` entries:
//!
//! ```yaml
//! install:
//!   - helm3:
//!       name: mysql
//!       chart: stable/mysql
//! ```
//!
//! Install, upgrade and uninstall read the key named after the verb. Invoke
//! is used for custom actions, so it collects steps from every key.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::step::{
    ExecuteArguments, InstallArguments, StepCommon, UninstallArguments, UpgradeArguments,
};

/// Key wrapping each step in a payload
pub const STEP_KEY: &str = "helm3";

/// Mixin verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Install,
    Upgrade,
    Uninstall,
    Invoke,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Install => "install",
            Verb::Upgrade => "upgrade",
            Verb::Uninstall => "uninstall",
            Verb::Invoke => "invoke",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `{helm3: <step>}` list entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEnvelope<T> {
    #[serde(rename = "helm3")]
    pub step: T,
}

/// A decoded step, tagged by the verb it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStep {
    Install(InstallArguments),
    Upgrade(UpgradeArguments),
    Uninstall(UninstallArguments),
    Execute(ExecuteArguments),
}

impl ActionStep {
    pub fn verb(&self) -> Verb {
        match self {
            ActionStep::Install(_) => Verb::Install,
            ActionStep::Upgrade(_) => Verb::Upgrade,
            ActionStep::Uninstall(_) => Verb::Uninstall,
            ActionStep::Execute(_) => Verb::Invoke,
        }
    }

    /// Description and outputs
    pub fn common(&self) -> &StepCommon {
        match self {
            ActionStep::Install(step) => &step.common,
            ActionStep::Upgrade(step) => &step.common,
            ActionStep::Uninstall(step) => &step.common,
            ActionStep::Execute(step) => &step.common,
        }
    }

    /// A copy safe to log, with registry and repository credentials masked
    pub fn redacted(&self) -> ActionStep {
        match self {
            ActionStep::Install(step) => ActionStep::Install(InstallArguments {
                username: mask(&step.username),
                password: mask(&step.password),
                ..step.clone()
            }),
            ActionStep::Upgrade(step) => ActionStep::Upgrade(UpgradeArguments {
                username: mask(&step.username),
                password: mask(&step.password),
                ..step.clone()
            }),
            other => other.clone(),
        }
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        REDACTED.to_string()
    }
}

const REDACTED: &str = "[redacted]";

/// Decode the single step of a verb payload.
///
/// Any step count other than one is a protocol error, raised before anything
/// is executed.
pub fn decode_action(verb: Verb, payload: &str) -> Result<ActionStep> {
    let document: Value = serde_yaml::from_str(payload)?;
    let mapping = match document {
        Value::Mapping(mapping) => mapping,
        Value::Null => Mapping::new(),
        _ => {
            return Err(CoreError::YamlParse(serde::de::Error::custom(
                "the payload must be a mapping of action name to steps",
            )));
        }
    };

    let step = match verb {
        Verb::Install => ActionStep::Install(single(steps_under(&mapping, verb)?)?),
        Verb::Upgrade => ActionStep::Upgrade(single(steps_under(&mapping, verb)?)?),
        Verb::Uninstall => ActionStep::Uninstall(single(steps_under(&mapping, verb)?)?),
        Verb::Invoke => {
            let mut steps = Vec::new();
            for (_, entries) in mapping {
                steps.extend(envelopes::<ExecuteArguments>(entries)?);
            }
            ActionStep::Execute(single(steps)?)
        }
    };

    tracing::debug!(verb = %verb, "decoded step");
    Ok(step)
}

/// Encode a step back into the payload shape it was decoded from.
///
/// Execute steps are written under the `invoke` key.
pub fn encode_action(step: &ActionStep) -> Result<String> {
    let entries = match step {
        ActionStep::Install(args) => envelope_value(args)?,
        ActionStep::Upgrade(args) => envelope_value(args)?,
        ActionStep::Uninstall(args) => envelope_value(args)?,
        ActionStep::Execute(args) => envelope_value(args)?,
    };

    let mut document = Mapping::new();
    document.insert(Value::from(step.verb().as_str()), entries);
    Ok(serde_yaml::to_string(&document)?)
}

fn steps_under<T: DeserializeOwned>(mapping: &Mapping, verb: Verb) -> Result<Vec<T>> {
    match mapping.get(verb.as_str()) {
        Some(entries) => envelopes(entries.clone()),
        None => Ok(Vec::new()),
    }
}

fn envelopes<T: DeserializeOwned>(entries: Value) -> Result<Vec<T>> {
    if entries.is_null() {
        return Ok(Vec::new());
    }
    let wrapped: Vec<StepEnvelope<T>> = serde_yaml::from_value(entries)?;
    Ok(wrapped.into_iter().map(|e| e.step).collect())
}

fn envelope_value<T: Serialize>(step: &T) -> Result<Value> {
    Ok(serde_yaml::to_value(vec![StepEnvelope { step }])?)
}

fn single<T>(mut steps: Vec<T>) -> Result<T> {
    if steps.len() != 1 {
        return Err(CoreError::StepCount { count: steps.len() });
    }
    Ok(steps.remove(0))
}
