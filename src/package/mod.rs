//! The package document and its manifest.
//!
//! [`Package`] owns the parsed document as an [`XmlTree`]; items are keyed
//! by archive-root-relative path, and removing one rewrites the tree in
//! place so that [`Package::write`] serializes a well-formed document.

mod container;
mod manifest;
mod xml;

pub use container::{CONTAINER_PATH, locate_package};
pub use manifest::{GuideRef, ItemKind, ManifestItem, Package};
pub use xml::{NodeId, XmlTree};
