//! Worklist traversal and the sweep that follows it.

use std::collections::{HashSet, VecDeque};
use std::io::ErrorKind;
use std::path::Path;

use super::extract::{ContentKind, extract};
use super::keep::KeepSet;
use super::resolve::{parent_dir, resolve};
use crate::error::Warning;
use crate::logger::Logger;
use crate::package::{ItemKind, ManifestItem, Package};
use crate::{debug, warn};

/// Result of the mark phase.
#[derive(Debug, Default)]
pub struct Traversal {
    pub reachable: KeepSet,
    pub warnings: Vec<Warning>,
}

/// Result of mark and sweep.
#[derive(Debug, Default)]
pub struct PruneReport {
    /// Seeded and reachable paths together.
    pub kept: KeepSet,
    pub removed: Vec<String>,
    pub warnings: Vec<Warning>,
}

/// Mark-and-sweep over the manifest of an exploded package.
pub struct ReachabilityEngine<'a> {
    root: &'a Path,
    log: &'a Logger,
}

impl<'a> ReachabilityEngine<'a> {
    pub fn new(root: &'a Path, log: &'a Logger) -> Self {
        Self { root, log }
    }

    /// Mark every manifest path reachable from the markup documents and
    /// the seeds.
    ///
    /// Stylesheets, SVG documents and the NCX are scanned only once
    /// something reaches them, so an unreferenced stylesheet never keeps
    /// its fonts alive. Each path is scanned at most once; the visited set
    /// bounds the loop by the manifest size.
    pub fn traverse(&self, package: &Package, seed: &KeepSet) -> Traversal {
        let mut worklist: VecDeque<String> = package
            .items()
            .filter(|item| item.kind() == ItemKind::Markup)
            .map(|item| item.path.clone())
            .collect();
        worklist.extend(seed.iter().filter(|p| package.contains(p)).cloned());

        let mut visited: HashSet<String> = HashSet::new();
        let mut traversal = Traversal::default();

        while let Some(path) = worklist.pop_front() {
            if !visited.insert(path.clone()) {
                continue;
            }
            traversal.reachable.insert(path.clone());

            let Some(item) = package.item(&path) else {
                continue;
            };
            let references = match self.scan(item) {
                Ok(references) => references,
                Err(warning) => {
                    warn!(self.log, "reach"; "{}", warning);
                    traversal.warnings.push(warning);
                    continue;
                }
            };

            let base = parent_dir(&path);
            for raw in references {
                let Some(target) = resolve(base, &raw) else {
                    continue;
                };
                if package.contains(&target) && !visited.contains(&target) {
                    debug!(self.log, "reach"; "{} -> {}", path, target);
                    worklist.push_back(target);
                }
            }
        }

        traversal
    }

    /// Raw references of one item; non-scannable kinds have none.
    fn scan(&self, item: &ManifestItem) -> Result<Vec<String>, Warning> {
        let kind = match item.kind() {
            ItemKind::Markup | ItemKind::Svg | ItemKind::Navigation => ContentKind::Markup,
            ItemKind::Stylesheet => ContentKind::Stylesheet,
            _ => return Ok(Vec::new()),
        };

        let bytes = std::fs::read(self.root.join(&item.path)).map_err(|_| Warning::MissingOnDisk {
            path: item.path.clone(),
        })?;
        let text = String::from_utf8_lossy(&bytes);

        extract(kind, &text).map_err(|e| Warning::Unparseable {
            path: item.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Delete every manifest item outside `seed` and the traversal's
    /// reachable set, from disk and from the package.
    pub fn prune(&self, package: &mut Package, seed: &KeepSet) -> PruneReport {
        let traversal = self.traverse(package, seed);
        let kept = seed.union(&traversal.reachable);
        let mut report = PruneReport {
            kept,
            removed: Vec::new(),
            warnings: traversal.warnings,
        };

        for path in package.paths() {
            if report.kept.contains(&path) {
                continue;
            }

            match std::fs::remove_file(self.root.join(&path)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    let warning = Warning::MissingOnDisk { path: path.clone() };
                    warn!(self.log, "prune"; "{}", warning);
                    report.warnings.push(warning);
                }
                Err(e) => warn!(self.log, "prune"; "cannot delete {}: {}", path, e),
            }

            package.remove_item(&path);
            debug!(self.log, "prune"; "unreferenced: {}", path);
            report.removed.push(path);
        }

        for href in package.drop_unresolved_guide() {
            let warning = Warning::UnresolvedGuide { href };
            warn!(self.log, "prune"; "{}", warning);
            report.warnings.push(warning);
        }

        report
    }
}
