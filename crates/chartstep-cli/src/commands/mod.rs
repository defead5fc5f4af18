//! CLI commands

pub mod action;
pub mod build;
pub mod schema;
pub mod version;
