//! Version command - name, version, commit and author

use clap::ValueEnum;
use serde::Serialize;

use crate::error::Result;

const AUTHOR: &str = "chartstep Contributors";

/// How version information is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Plaintext,
    Json,
}

/// Version metadata of this build
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub commit: &'static str,
    pub author: &'static str,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            name: "chartstep",
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("CHARTSTEP_COMMIT").unwrap_or("unknown"),
            author: AUTHOR,
        }
    }

    fn plaintext(&self) -> String {
        format!(
            "{} {} ({}) by {}",
            self.name, self.version, self.commit, self.author
        )
    }
}

pub fn run(format: OutputFormat) -> Result<()> {
    let info = VersionInfo::current();
    match format {
        OutputFormat::Plaintext => println!("{}", info.plaintext()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
    }
    Ok(())
}
