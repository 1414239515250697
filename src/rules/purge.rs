//! Unconditional removal of known junk, ahead of reachability.

use jwalk::WalkDir;
use std::path::Path;

use super::glob::PatternSet;
use crate::error::Warning;
use crate::logger::Logger;
use crate::package::{CONTAINER_PATH, Package};
use crate::reach::normalize_path;
use crate::zip::TYPE_MARKER;
use crate::{debug, warn};

/// Removed no matter what links to them.
pub const DEFAULT_PURGE_PATTERNS: &[&str] = &[
    "Generic Cross Sales.xhtml",
    "*.DS_Store",
    "*.epubcheck*",
];

#[derive(Debug, Default)]
pub struct PurgeReport {
    /// Archive paths deleted from the manifest, the disk or both.
    pub removed: Vec<String>,
    pub warnings: Vec<Warning>,
}

/// Delete everything matching the default patterns plus `extra`.
///
/// Manifest items are dropped from the manifest and spine even when their
/// file is already gone; that case is reported as a desync. Files that
/// the manifest never declared are swept from disk too, except the
/// archive marker, the container and the package document.
pub fn purge(package: &mut Package, root: &Path, extra: &[String], log: &Logger) -> PurgeReport {
    let patterns = PatternSet::new(
        DEFAULT_PURGE_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .chain(extra.iter().cloned()),
    );
    let mut report = PurgeReport::default();

    let targets: Vec<String> = package
        .items()
        .filter(|item| patterns.matches(&item.href, &item.path))
        .map(|item| item.path.clone())
        .collect();

    for path in targets {
        let file = root.join(&path);
        if file.is_file() {
            if let Err(e) = std::fs::remove_file(&file) {
                warn!(log, "purge"; "cannot delete {}: {}", path, e);
            }
        } else {
            let warning = Warning::PurgeTargetMissing { path: path.clone() };
            warn!(log, "purge"; "{}", warning);
            report.warnings.push(warning);
        }
        package.remove_item(&path);
        debug!(log, "purge"; "{}", path);
        report.removed.push(path);
    }

    for path in undeclared_files(package, root) {
        if !patterns.matches(&path, &path) {
            continue;
        }
        match std::fs::remove_file(root.join(&path)) {
            Ok(()) => {
                debug!(log, "purge"; "{} (not in manifest)", path);
                report.removed.push(path);
            }
            Err(e) => warn!(log, "purge"; "cannot delete {}: {}", path, e),
        }
    }

    report
}

/// Files on disk the manifest does not declare, minus the structural ones.
fn undeclared_files(package: &Package, root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .skip_hidden(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let path = e.path();
            let rel = path.strip_prefix(root).ok()?;
            normalize_path(&rel.to_string_lossy())
        })
        .filter(|p| p != TYPE_MARKER && p != CONTAINER_PATH && p != package.opf_path())
        .filter(|p| !package.contains(p))
        .collect();
    files.sort();
    files
}
