//! Failure classification
//!
//! Some failures of the chart tool mean the desired state already holds. An
//! uninstall of a release that is already gone is one of them.

use crate::error::CoreError;

/// How a failure affects the verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Abort the verb
    Fatal,
    /// Log and carry on
    Ignorable,
}

/// Phrases reported when a release is already absent.
///
/// `{release}` is replaced by the quoted, lower-cased release name. Matching
/// is done against lower-cased output.
const ALREADY_ABSENT_PHRASES: &[&str] = &[
    "uninstall: release not loaded: {release}",
    "the release named {release} is already deleted",
    "release: {release} not found",
    "release not loaded",
    "already deleted",
    "release: not found",
    "not found",
];

/// Whether the output of a failed uninstall says the release is already gone
pub fn is_already_absent(output: &str, release: &str) -> bool {
    let output = output.to_lowercase();
    let quoted = format!("{:?}", release.to_lowercase());

    ALREADY_ABSENT_PHRASES
        .iter()
        .map(|phrase| phrase.replace("{release}", &quoted))
        .any(|phrase| output.contains(&phrase))
}

/// Classify a failed uninstall of one release
pub fn classify_uninstall_failure(output: &str, release: &str) -> Outcome {
    if is_already_absent(output, release) {
        Outcome::Ignorable
    } else {
        Outcome::Fatal
    }
}

/// Classify a repository registration failure at build time
pub fn classify_repository_error(error: &CoreError) -> Outcome {
    match error {
        CoreError::MissingRepositoryUrl { .. } => Outcome::Ignorable,
        _ => Outcome::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_qualified_phrases() {
        assert!(is_already_absent(
            "Error: uninstall: Release not loaded: \"MyApp\": release: not found",
            "MyApp"
        ));
        assert!(is_already_absent(
            "Error: the release named \"foo\" is already deleted",
            "foo"
        ));
        assert!(is_already_absent("Error: release: \"a\" not found", "a"));
    }

    #[test]
    fn test_generic_phrases() {
        assert!(is_already_absent("Error: release not loaded", "foo"));
        assert!(is_already_absent("secret NOT FOUND", "foo"));
    }

    #[test]
    fn test_real_failures_are_fatal() {
        assert_eq!(
            classify_uninstall_failure("Error: Kubernetes cluster unreachable", "foo"),
            Outcome::Fatal
        );
        assert_eq!(
            classify_uninstall_failure("Error: uninstallation completed with 1 error(s): context deadline exceeded", "foo"),
            Outcome::Fatal
        );
        assert_eq!(
            classify_uninstall_failure("release: \"foo\" not found", "foo"),
            Outcome::Ignorable
        );
    }

    #[test]
    fn test_repository_errors() {
        let missing = CoreError::MissingRepositoryUrl {
            name: "stable".into(),
        };
        assert_eq!(classify_repository_error(&missing), Outcome::Ignorable);
        assert_eq!(
            classify_repository_error(&CoreError::PartialCredentials),
            Outcome::Fatal
        );
    }
}
