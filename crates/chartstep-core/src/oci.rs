//! OCI chart references
//!
//! Charts referenced as `oci://host/path[:tag]` cannot be installed directly.
//! They are staged first: log into the registry, pull the chart into the
//! local cache, export it to a directory, then install from that directory.
//! This module parses references and builds the argument vectors for each
//! staging command; running them is left to the caller.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CoreError, Result};
use crate::step::InstallArguments;

static OCI_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^oci://([^:/]+)/([^:]+)(:([^:]+))?").expect("valid regex"));

const EXPORT_PATH_PATTERN: &str = r"Exported chart to (.*)";

static EXPORT_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EXPORT_PATH_PATTERN).expect("valid regex"));

/// Parsed `oci://` chart reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OciReference {
    /// Registry host
    pub registry: String,
    /// Path of the chart inside the registry
    pub repository: String,
    pub tag: Option<String>,
}

impl OciReference {
    /// Parse a chart reference, `None` when it is not an OCI reference
    pub fn parse(chart: &str) -> Option<Self> {
        let captures = OCI_REFERENCE.captures(chart)?;
        Some(Self {
            registry: captures[1].to_string(),
            repository: captures[2].to_string(),
            tag: captures
                .get(4)
                .map(|m| m.as_str().to_string())
                .filter(|t| !t.is_empty()),
        })
    }

    /// The reference tag, else the fallback version
    pub fn resolved_tag<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.tag.as_deref().unwrap_or(fallback)
    }

    /// `host/path:tag` as understood by `chart pull` and `chart export`
    pub fn full_name(&self, fallback: &str) -> String {
        format!(
            "{}/{}:{}",
            self.registry,
            self.repository,
            self.resolved_tag(fallback)
        )
    }
}

/// Whether a chart reference points at an OCI registry
pub fn is_oci_reference(chart: &str) -> bool {
    OCI_REFERENCE.is_match(chart)
}

/// Registry login
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

/// A step that can name an OCI chart
pub trait OciChart {
    fn chart_reference(&self) -> &str;

    fn registry_credentials(&self) -> RegistryCredentials;

    /// Tag used when the reference has none
    fn fallback_version(&self) -> &str;

    fn oci_reference(&self) -> Option<OciReference> {
        OciReference::parse(self.chart_reference())
    }
}

impl OciChart for InstallArguments {
    fn chart_reference(&self) -> &str {
        &self.chart
    }

    fn registry_credentials(&self) -> RegistryCredentials {
        RegistryCredentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    fn fallback_version(&self) -> &str {
        &self.version
    }
}

/// `registry login` arguments.
///
/// Returns `None` when no credentials are configured, and an error when only
/// one of username and password is set.
pub fn login_args(reference: &OciReference, credentials: &RegistryCredentials) -> Result<Option<Vec<String>>> {
    match (credentials.username.is_empty(), credentials.password.is_empty()) {
        (true, true) => Ok(None),
        (false, false) => Ok(Some(vec![
            "registry".to_string(),
            "login".to_string(),
            reference.registry.clone(),
            "-u".to_string(),
            credentials.username.clone(),
            "-p".to_string(),
            credentials.password.clone(),
        ])),
        _ => Err(CoreError::PartialCredentials),
    }
}

pub fn pull_args(reference: &OciReference, fallback: &str) -> Vec<String> {
    vec![
        "chart".to_string(),
        "pull".to_string(),
        reference.full_name(fallback),
    ]
}

pub fn export_args(reference: &OciReference, fallback: &str, destination: &str) -> Vec<String> {
    vec![
        "chart".to_string(),
        "export".to_string(),
        reference.full_name(fallback),
        "--destination".to_string(),
        destination.to_string(),
    ]
}

/// Find the exported chart directory in the output of `chart export`
pub fn parse_export_path(stdout: &str) -> Result<PathBuf> {
    EXPORT_PATH
        .captures(stdout)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| CoreError::ExportPathMissing {
            pattern: EXPORT_PATH_PATTERN.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference_with_tag() {
        let reference = OciReference::parse("oci://registry.example.com/charts/foo:1.2.3").unwrap();
        assert_eq!(reference.registry, "registry.example.com");
        assert_eq!(reference.repository, "charts/foo");
        assert_eq!(reference.tag.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn test_not_oci() {
        assert!(!is_oci_reference("stable/mysql"));
        assert!(!is_oci_reference("./charts/mysql"));
        assert!(!is_oci_reference("https://example.com/oci://host/chart"));
        assert!(OciReference::parse("stable/mysql").is_none());
        assert!(is_oci_reference("oci://localhost/charts/foo"));
    }

    #[test]
    fn test_match_is_anchored_at_scheme() {
        assert!(!is_oci_reference(" oci://localhost/charts/foo"));
        assert!(!is_oci_reference("chart=oci://localhost/charts/foo"));
        // The host class stops at ':', so a port never matches
        assert!(!is_oci_reference("oci://localhost:5000/charts/foo"));
        assert!(OciReference::parse("oci://localhost:5000/charts/foo").is_none());
    }

    #[test]
    fn test_tag_falls_back_to_version() {
        let reference = OciReference::parse("oci://localhost/charts/foo").unwrap();
        assert!(reference.tag.is_none());
        assert_eq!(reference.full_name("0.4.0"), "localhost/charts/foo:0.4.0");

        let tagged = OciReference::parse("oci://localhost/charts/foo:1.0.0").unwrap();
        assert_eq!(tagged.full_name("0.4.0"), "localhost/charts/foo:1.0.0");
    }

    #[test]
    fn test_install_step_is_oci_chart() {
        let step = InstallArguments {
            chart: "oci://ghcr.io/org/mysql".into(),
            version: "2.0.0".into(),
            username: "user".into(),
            password: "pass".into(),
            ..Default::default()
        };
        let reference = step.oci_reference().unwrap();
        assert_eq!(reference.full_name(step.fallback_version()), "ghcr.io/org/mysql:2.0.0");
        assert_eq!(step.registry_credentials().username, "user");
    }

    #[test]
    fn test_login_args() {
        let reference = OciReference::parse("oci://ghcr.io/org/mysql:1.0.0").unwrap();

        let none = login_args(&reference, &RegistryCredentials::default()).unwrap();
        assert!(none.is_none());

        let both = RegistryCredentials {
            username: "user".into(),
            password: "pass".into(),
        };
        assert_eq!(
            login_args(&reference, &both).unwrap().unwrap().join(" "),
            "registry login ghcr.io -u user -p pass"
        );

        let partial = RegistryCredentials {
            username: String::new(),
            password: "pass".into(),
        };
        let err = login_args(&reference, &partial).unwrap_err();
        assert_eq!(err.to_string(), "either password or username is empty but not both");
    }

    #[test]
    fn test_pull_and_export_args() {
        let reference = OciReference::parse("oci://ghcr.io/org/mysql:1.0.0").unwrap();
        assert_eq!(pull_args(&reference, "").join(" "), "chart pull ghcr.io/org/mysql:1.0.0");
        assert_eq!(
            export_args(&reference, "", "/tmp/").join(" "),
            "chart export ghcr.io/org/mysql:1.0.0 --destination /tmp/"
        );
    }

    #[test]
    fn test_parse_export_path() {
        let stdout = "ref:     ghcr.io/org/mysql:1.0.0\nname:    mysql\nExported chart to /tmp/mysql/\n";
        assert_eq!(parse_export_path(stdout).unwrap(), PathBuf::from("/tmp/mysql/"));

        let err = parse_export_path("nothing useful\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not extract export path using regex Exported chart to (.*)"
        );
    }
}
