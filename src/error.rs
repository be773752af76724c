//! # Error Handling
//!
//! This module defines the centralized error type for the `edm` library. It
//! uses `thiserror` to derive a single `Error` enum covering every failure the
//! library reports to its callers.
//!
//! Not every failing git invocation becomes an `Error`. Observations and
//! remote queries in [`crate::git`] return sentinels (`None`, `false`, an
//! empty list) so that callers can decide whether the absence is tolerable.
//! The variants below are reserved for failures that change what the tool can
//! do next:
//!
//! - Missing or malformed configuration input.
//! - A dependency that could not be checked out even after the retry.
//! - A remote ref that could not be resolved to a commit.
//! - A requested release that does not exist on the seed remote.
//! - Template rendering and release-manifest failures.
//!
//! The `Result` type alias is used throughout the library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for edm operations
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration, manifest or modification file could not be parsed.
    #[error("Configuration parsing error in {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// A configuration file that is required for the operation does not exist.
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// A dependency could not be cloned into the workspace, even after
    /// retrying with the ref interpreted as a revision.
    #[error("Local dependency checkout failed for {name} ({url}@{r#ref}): {message}")]
    LocalCheckout {
        name: String,
        url: String,
        r#ref: String,
        message: String,
    },

    /// A ref could not be resolved to a concrete revision on a remote.
    #[error("Could not resolve {r#ref} on {url}: {message}")]
    RemoteRef {
        url: String,
        r#ref: String,
        message: String,
    },

    /// The requested release is neither a tag nor a branch on the seed remote.
    #[error("Requested release is not available: {release} (remote: {url})")]
    ReleaseNotAvailable { release: String, url: String },

    /// The workspace could not be used for the requested operation.
    #[error("Workspace error: {message}")]
    Workspace { message: String },

    /// An error occurred while rendering the build-system file.
    #[error("Template processing error: {message}")]
    Template { message: String },

    /// An error occurred while assembling a release manifest.
    #[error("Release manifest error: {message}")]
    Release { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// An atomic file replacement failed.
    #[error("Atomic write failed: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl From<minijinja::Error> for Error {
    fn from(e: minijinja::Error) -> Self {
        Error::Template {
            message: e.to_string(),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config_parse() {
        let error = Error::ConfigParse {
            path: PathBuf::from("workspace-config.yaml"),
            message: "invalid mapping".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Configuration parsing error"));
        assert!(display.contains("workspace-config.yaml"));
        assert!(display.contains("invalid mapping"));
    }

    #[test]
    fn test_error_display_local_checkout() {
        let error = Error::LocalCheckout {
            name: "libocpp".to_string(),
            url: "https://github.com/EVerest/libocpp.git".to_string(),
            r#ref: "v0.9.0".to_string(),
            message: "Remote branch v0.9.0 not found".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Local dependency checkout failed"));
        assert!(display.contains("libocpp"));
        assert!(display.contains("v0.9.0"));
    }

    #[test]
    fn test_error_display_remote_ref() {
        let error = Error::RemoteRef {
            url: "https://github.com/EVerest/libfsm.git".to_string(),
            r#ref: "feature/x".to_string(),
            message: "ref not found".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Could not resolve feature/x"));
        assert!(display.contains("ref not found"));
    }

    #[test]
    fn test_error_display_release_not_available() {
        let error = Error::ReleaseNotAvailable {
            release: "2099.1.0".to_string(),
            url: "https://github.com/EVerest/everest-core.git".to_string(),
        };
        assert!(format!("{}", error).contains("2099.1.0"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_str = "invalid: [unclosed";
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let error: Error = yaml_error.into();
        assert!(format!("{}", error).contains("YAML parsing error"));
    }
}
