//! Fatal errors and recoverable warnings.
//!
//! Only opening the archive and loading the package document may abort a
//! run. Everything after that reports a [`Warning`] and carries on.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Structural failures detected before any mutation.
#[derive(Debug, Error)]
pub enum ShrinkError {
    #[error("no package document found under `{0}`")]
    MissingPackage(PathBuf),

    #[error("package document `{path}` is malformed: {message}")]
    MalformedPackage { path: String, message: String },

    #[error("spine entry `{0}` does not name a manifest item")]
    DanglingSpine(String),

    #[error("archive entry `{0}` escapes the extraction root")]
    UnsafeEntry(String),
}

/// A condition recovered locally and surfaced in the final report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Declared in the manifest, absent from disk.
    MissingOnDisk { path: String },
    /// A purge target declared in the manifest has no file on disk.
    PurgeTargetMissing { path: String },
    /// A markup or stylesheet file could not be tokenized.
    Unparseable { path: String, reason: String },
    /// An image kept its pre-attempt bytes.
    CompressionFailed { path: String, reason: String },
    /// A guide reference that names no manifest item.
    UnresolvedGuide { href: String },
}

impl Warning {
    /// Whether this warning signals a manifest/disk desynchronization
    /// the caller must be told about.
    pub fn is_desync(&self) -> bool {
        matches!(self, Warning::PurgeTargetMissing { .. })
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingOnDisk { path } => {
                write!(f, "{path}: declared in manifest but missing on disk")
            }
            Warning::PurgeTargetMissing { path } => {
                write!(f, "{path}: purge target missing on disk (manifest out of sync)")
            }
            Warning::Unparseable { path, reason } => {
                write!(f, "{path}: could not scan for references ({reason})")
            }
            Warning::CompressionFailed { path, reason } => {
                write!(f, "{path}: recompression failed ({reason})")
            }
            Warning::UnresolvedGuide { href } => {
                write!(f, "guide reference `{href}` names no manifest item")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_purge_desync_is_flagged() {
        assert!(Warning::PurgeTargetMissing { path: "a".into() }.is_desync());
        assert!(!Warning::MissingOnDisk { path: "a".into() }.is_desync());
    }

    #[test]
    fn display_names_the_path() {
        let w = Warning::CompressionFailed {
            path: "img/a.png".into(),
            reason: "bad header".into(),
        };
        assert_eq!(w.to_string(), "img/a.png: recompression failed (bad header)");
        let e = ShrinkError::DanglingSpine("ch1".into());
        assert_eq!(e.to_string(), "spine entry `ch1` does not name a manifest item");
    }
}
