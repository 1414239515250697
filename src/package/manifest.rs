//! The package document: manifest, spine, guide and cover metadata.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use super::container::locate_package;
use super::xml::{NodeId, XmlTree};
use crate::error::ShrinkError;
use crate::reach::{parent_dir, resolve};

/// What an item is, for traversal purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// XHTML/HTML content documents.
    Markup,
    Svg,
    /// EPUB 2 NCX table of contents.
    Navigation,
    Stylesheet,
    Image,
    Font,
    Other,
}

impl ItemKind {
    pub fn classify(media_type: &str, path: &str) -> Self {
        let media_type = media_type.trim().to_ascii_lowercase();
        match media_type.as_str() {
            "application/xhtml+xml" | "text/html" => return ItemKind::Markup,
            "image/svg+xml" => return ItemKind::Svg,
            "application/x-dtbncx+xml" => return ItemKind::Navigation,
            "text/css" => return ItemKind::Stylesheet,
            "application/vnd.ms-opentype" => return ItemKind::Font,
            _ => {}
        }
        if media_type.starts_with("image/") {
            return ItemKind::Image;
        }
        if media_type.starts_with("font/")
            || media_type.starts_with("application/font")
            || media_type.starts_with("application/x-font")
        {
            return ItemKind::Font;
        }

        let ext = path.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
        match ext.as_str() {
            "xhtml" | "html" | "htm" => ItemKind::Markup,
            "svg" => ItemKind::Svg,
            "ncx" => ItemKind::Navigation,
            "css" => ItemKind::Stylesheet,
            "jpg" | "jpeg" | "png" | "gif" | "webp" => ItemKind::Image,
            "ttf" | "otf" | "woff" | "woff2" => ItemKind::Font,
            _ => ItemKind::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManifestItem {
    pub id: String,
    /// The `href` as declared, relative to the package document.
    pub href: String,
    /// Archive-root-relative path.
    pub path: String,
    pub media_type: String,
    pub properties: Vec<String>,
    node: NodeId,
}

impl ManifestItem {
    pub fn kind(&self) -> ItemKind {
        ItemKind::classify(&self.media_type, &self.path)
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }
}

#[derive(Debug, Clone)]
struct SpineRef {
    idref: String,
    node: NodeId,
}

#[derive(Debug, Clone)]
pub struct GuideRef {
    pub kind: String,
    pub href: String,
    /// Archive path, when the href resolves locally.
    pub path: Option<String>,
    node: NodeId,
}

#[derive(Debug, Clone)]
pub struct Package {
    opf_path: String,
    base_dir: String,
    tree: XmlTree,
    manifest_node: NodeId,
    spine_node: Option<NodeId>,
    guide_node: Option<NodeId>,
    items: BTreeMap<String, ManifestItem>,
    spine: Vec<SpineRef>,
    guide: Vec<GuideRef>,
    cover_id: Option<String>,
}

impl Package {
    /// Locate and parse the package document under an exploded tree.
    pub fn load(root: &Path) -> Result<Self> {
        let opf_path = locate_package(root)?;
        let bytes = std::fs::read(root.join(&opf_path))
            .with_context(|| format!("cannot read package document {opf_path}"))?;
        Self::parse(&opf_path, &bytes)
    }

    pub fn parse(opf_path: &str, bytes: &[u8]) -> Result<Self> {
        let malformed = |message: String| ShrinkError::MalformedPackage {
            path: opf_path.to_string(),
            message,
        };

        let tree = XmlTree::parse(bytes).map_err(|e| malformed(e.to_string()))?;
        let manifest_node = tree
            .find("manifest")
            .ok_or_else(|| malformed("no <manifest> element".into()))?;
        let spine_node = tree.find("spine");
        let guide_node = tree.find("guide");
        let base_dir = parent_dir(opf_path).to_string();

        let mut items = BTreeMap::new();
        for node in tree.child_elements(manifest_node, "item") {
            let (Some(id), Some(href)) = (tree.attr(node, "id"), tree.attr(node, "href")) else {
                continue;
            };
            // Remote resources have no file in the archive
            let Some(path) = resolve(&base_dir, &href) else {
                continue;
            };
            let item = ManifestItem {
                id,
                href,
                path: path.clone(),
                media_type: tree.attr(node, "media-type").unwrap_or_default(),
                properties: tree
                    .attr(node, "properties")
                    .map(|p| p.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default(),
                node,
            };
            items.entry(path).or_insert(item);
        }

        let mut spine = Vec::new();
        if let Some(spine_node) = spine_node {
            for node in tree.child_elements(spine_node, "itemref") {
                let Some(idref) = tree.attr(node, "idref") else {
                    continue;
                };
                if !items.values().any(|item: &ManifestItem| item.id == idref) {
                    return Err(ShrinkError::DanglingSpine(idref).into());
                }
                spine.push(SpineRef { idref, node });
            }
        }

        let mut guide = Vec::new();
        if let Some(guide_node) = guide_node {
            for node in tree.child_elements(guide_node, "reference") {
                let href = tree.attr(node, "href").unwrap_or_default();
                guide.push(GuideRef {
                    kind: tree.attr(node, "type").unwrap_or_default(),
                    path: resolve(&base_dir, &href),
                    href,
                    node,
                });
            }
        }

        let cover_id = tree.find("metadata").and_then(|metadata| {
            tree.child_elements(metadata, "meta")
                .filter(|&m| tree.attr(m, "name").as_deref() == Some("cover"))
                .find_map(|m| tree.attr(m, "content").filter(|c| !c.is_empty()))
        });

        Ok(Self {
            opf_path: opf_path.to_string(),
            base_dir,
            tree,
            manifest_node,
            spine_node,
            guide_node,
            items,
            spine,
            guide,
            cover_id,
        })
    }

    /// Archive path of the package document itself.
    pub fn opf_path(&self) -> &str {
        &self.opf_path
    }

    /// Directory manifest hrefs are relative to.
    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    pub fn items(&self) -> impl Iterator<Item = &ManifestItem> {
        self.items.values()
    }

    pub fn paths(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    pub fn item(&self, path: &str) -> Option<&ManifestItem> {
        self.items.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.items.contains_key(path)
    }

    pub fn item_by_id(&self, id: &str) -> Option<&ManifestItem> {
        self.items.values().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Archive paths in reading order.
    pub fn spine_paths(&self) -> Vec<String> {
        self.spine
            .iter()
            .filter_map(|s| self.item_by_id(&s.idref))
            .map(|item| item.path.clone())
            .collect()
    }

    pub fn guide(&self) -> &[GuideRef] {
        &self.guide
    }

    /// Cover item id named by `<meta name="cover" content="..."/>`.
    pub fn cover_id(&self) -> Option<&str> {
        self.cover_id.as_deref()
    }

    /// Remove an item from the manifest, together with the spine and guide
    /// entries that point at it.
    pub fn remove_item(&mut self, path: &str) -> Option<ManifestItem> {
        let item = self.items.remove(path)?;
        self.tree.detach(self.manifest_node, item.node);

        if let Some(spine_node) = self.spine_node {
            let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.spine)
                .into_iter()
                .partition(|s| s.idref == item.id);
            for entry in gone {
                self.tree.detach(spine_node, entry.node);
            }
            self.spine = kept;
        }

        if let Some(guide_node) = self.guide_node {
            let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.guide)
                .into_iter()
                .partition(|g| g.path.as_deref() == Some(path));
            for entry in gone {
                self.tree.detach(guide_node, entry.node);
            }
            self.guide = kept;
        }

        Some(item)
    }

    /// Drop guide references that name no manifest item, returning their
    /// hrefs.
    pub fn drop_unresolved_guide(&mut self) -> Vec<String> {
        let Some(guide_node) = self.guide_node else {
            return Vec::new();
        };
        let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.guide)
            .into_iter()
            .partition(|g| !g.path.as_ref().is_some_and(|p| self.items.contains_key(p)));
        self.guide = kept;

        gone.into_iter()
            .map(|entry| {
                self.tree.detach(guide_node, entry.node);
                entry.href
            })
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.tree.to_bytes()
    }

    /// Serialize back to the package document's place under `root`.
    pub fn write(&self, root: &Path) -> Result<()> {
        let target = root.join(&self.opf_path);
        std::fs::write(&target, self.to_bytes()?)
            .with_context(|| format!("cannot write {}", target.display()))
    }
}
