// ============================================
// TANZU CLI - Plugin Error Taxonomy
// ============================================

//! Errors raised by repositories, the catalog and the config lock.
//!
//! Four classes matter to callers:
//! - transport/storage failures (`Transport`, `Io`, `Timeout`)
//! - not-found conditions (`NotFound`, `NoSuitableVersion`), see [`PluginError::is_not_found`]
//! - plugin processes exiting non-zero (`PluginExited`)
//! - decode failures (`Decode`, `DescriptionDecode`, `InvalidVersion`, `InvalidDescriptor`)
//! - fatal conditions (`LockTimeout`, `Lock`, `WorkerFailed`, `Cancelled`, `CoreNotInstallable`)
//!
//! Nothing in this crate retries; errors bubble up to the command layer.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A specialized Result type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("could not {op} {path:?}: {source}")]
    Transport {
        op: &'static str,
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("{op} {path:?} failed: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("could not find a suitable version for plugin {name:?} from versions {versions:?}")]
    NoSuitableVersion { name: String, versions: Vec<String> },

    #[error("could not decode {source_name}: {source}")]
    Decode {
        source_name: String,
        #[source]
        source: BoxError,
    },

    #[error("could not describe plugin {name:?}")]
    Describe {
        name: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("could not unmarshal plugin {name:?} description: {source}")]
    DescriptionDecode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("plugin {name:?} exited with {status}: {stderr}")]
    PluginExited {
        name: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("version {0:?} is not a valid semantic version")]
    InvalidVersion(String),

    #[error("invalid plugin descriptor: {}", .0.join("; "))]
    InvalidDescriptor(Vec<String>),

    #[error("version cannot be empty for plugin {0:?}")]
    EmptyVersion(String),

    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("invalid config path {0:?}, expected features.<plugin>.<flag> or unstable-versions")]
    InvalidConfigPath(String),

    #[error("cannot install core as a plugin")]
    CoreNotInstallable,

    #[error("timed out after {timeout:?} waiting for config lock {path:?}")]
    LockTimeout { path: PathBuf, timeout: Duration },

    #[error("could not lock {path:?}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("install worker failed: {0}")]
    WorkerFailed(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl PluginError {
    pub fn transport(op: &'static str, path: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            op,
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn decode(source_name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Decode {
            source_name: source_name.into(),
            source: source.into(),
        }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// True for missing artifacts, plugins, versions or repositories.
    ///
    /// The command layer uses this to suggest `tanzu plugin install`.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } | Self::NoSuitableVersion { .. } => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Errors that end the current invocation outright.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout { .. }
                | Self::Lock { .. }
                | Self::WorkerFailed(_)
                | Self::Cancelled
                | Self::CoreNotInstallable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(PluginError::not_found("plugin", "foo").is_not_found());
        assert!(PluginError::NoSuitableVersion {
            name: "foo".into(),
            versions: vec!["v1.0.0-alpha.1".into()],
        }
        .is_not_found());

        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(PluginError::io("read", "/tmp/x", missing).is_not_found());

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(!PluginError::io("read", "/tmp/x", denied).is_not_found());
        assert!(!PluginError::transport("read", "a/b", "boom").is_not_found());
    }

    #[test]
    fn test_messages_carry_path() {
        let err = PluginError::transport("read artifact", "artifacts/foo/v1.0.0/tanzu-foo-linux_amd64", "503");
        let msg = err.to_string();
        assert!(msg.contains("artifacts/foo/v1.0.0"));
        assert!(msg.contains("503"));

        let err = PluginError::InvalidDescriptor(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "invalid plugin descriptor: a; b");
    }

    #[test]
    fn test_fatal_classification() {
        let err = PluginError::LockTimeout {
            path: "/tmp/.config.yaml.lock".into(),
            timeout: Duration::from_secs(1),
        };
        assert!(err.is_fatal());
        assert!(!err.is_not_found());
    }
}
