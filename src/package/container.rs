//! Locating the package document.

use anyhow::Result;
use jwalk::WalkDir;
use std::path::Path;

use super::xml::XmlTree;
use crate::error::ShrinkError;
use crate::reach::normalize_path;

pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Archive path of the package document: the first `rootfile` in
/// `META-INF/container.xml` that exists on disk, else the first `*.opf`
/// in sorted order.
pub fn locate_package(root: &Path) -> Result<String> {
    if let Some(path) = from_container(root) {
        return Ok(path);
    }

    let mut candidates: Vec<String> = WalkDir::new(root)
        .skip_hidden(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("opf"))
        })
        .filter_map(|e| {
            let path = e.path();
            let rel = path.strip_prefix(root).ok()?;
            normalize_path(&rel.to_string_lossy())
        })
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| ShrinkError::MissingPackage(root.to_path_buf()).into())
}

fn from_container(root: &Path) -> Option<String> {
    let bytes = std::fs::read(root.join(CONTAINER_PATH)).ok()?;
    let tree = XmlTree::parse(&bytes).ok()?;
    let rootfiles = tree.find("rootfiles")?;

    tree.child_elements(rootfiles, "rootfile")
        .filter_map(|node| tree.attr(node, "full-path"))
        .filter_map(|path| normalize_path(&path))
        .find(|path| root.join(path).is_file())
}
