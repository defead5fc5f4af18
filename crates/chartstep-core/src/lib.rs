//! chartstep core - step model and command building for the helm3 mixin
//!
//! This crate is pure and synchronous:
//! - `step` / `action`: typed steps and verb payload decoding
//! - `args`: deterministic argument vectors for install, upgrade, uninstall
//!   and free-form steps
//! - `oci`: OCI chart reference parsing and staging arguments
//! - `classify`: fatal or ignorable failures
//! - `schema`: embedded payload schema and validation
//! - `config` / `dockerfile`: build-time configuration and image lines

pub mod action;
pub mod args;
pub mod classify;
pub mod command;
pub mod config;
pub mod dockerfile;
pub mod error;
pub mod oci;
pub mod schema;
pub mod step;

pub use action::{ActionStep, STEP_KEY, StepEnvelope, Verb, decode_action, encode_action};
pub use args::{escape_set_key, execute_args, install_args, uninstall_args, upgrade_args};
pub use classify::{Outcome, classify_repository_error, classify_uninstall_failure, is_already_absent};
pub use command::CommandLine;
pub use config::{BuildInput, ClientSpec, MixinConfig, Repository};
pub use error::{CoreError, Result};
pub use oci::{OciChart, OciReference, RegistryCredentials, is_oci_reference};
pub use schema::{PayloadValidator, validate_payload};
pub use step::{
    ExecuteArguments, Flags, InstallArguments, OutputSource, OutputSpec, StepCommon,
    UninstallArguments, UpgradeArguments,
};
