//! Items that survive pruning whether or not anything links to them.

use super::glob::PatternSet;
use crate::debug;
use crate::logger::Logger;
use crate::package::Package;
use crate::reach::KeepSet;

/// Navigation and branding files that readers locate by convention.
pub const ESSENTIAL_PATTERNS: &[&str] = &[
    "*toc.ncx",
    "Text/nav.xhtml",
    "*[Cc]ontents*",
    "*logo*",
    "META-INF/*",
];

/// Manifest property of the EPUB 3 navigation document.
const NAV_PROPERTY: &str = "nav";
const COVER_PROPERTY: &str = "cover-image";

/// Archive path of the cover image: the metadata `cover` entry when it
/// names an item, else the first item flagged `cover-image`.
pub fn cover_path(package: &Package) -> Option<String> {
    package
        .cover_id()
        .and_then(|id| package.item_by_id(id))
        .or_else(|| package.items().find(|item| item.has_property(COVER_PROPERTY)))
        .map(|item| item.path.clone())
}

/// Initial keep-set: spine, guide targets, the cover, the navigation
/// document and everything matching [`ESSENTIAL_PATTERNS`].
pub fn seed_keep_set(package: &Package, log: &Logger) -> KeepSet {
    let mut seed = KeepSet::new();

    for path in package.spine_paths() {
        seed.insert(path);
    }
    for guide in package.guide() {
        if let Some(path) = guide.path.as_ref().filter(|p| package.contains(p)) {
            seed.insert(path.clone());
        }
    }
    if let Some(cover) = cover_path(package) {
        debug!(log, "keep"; "cover: {}", cover);
        seed.insert(cover);
    }

    let essentials = PatternSet::new(ESSENTIAL_PATTERNS.iter().copied());
    for item in package.items() {
        if item.has_property(NAV_PROPERTY) {
            seed.insert(item.path.clone());
        } else if let Some(pattern) = essentials.find(&item.href, &item.path) {
            debug!(log, "keep"; "{} (matches {})", item.path, pattern);
            seed.insert(item.path.clone());
        }
    }

    seed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SAMPLE_OPF;

    fn sample() -> Package {
        Package::parse("OEBPS/content.opf", SAMPLE_OPF.as_bytes()).unwrap()
    }

    #[test]
    fn seeds_spine_guide_cover_and_conventions() {
        let seed = seed_keep_set(&sample(), &Logger::silent());
        let expected = [
            "OEBPS/Images/cover.jpg",
            "OEBPS/Images/logo.png",
            "OEBPS/Text/Generic Cross Sales.xhtml",
            "OEBPS/Text/a.xhtml",
            "OEBPS/Text/nav.xhtml",
            "OEBPS/toc.ncx",
        ];
        assert_eq!(seed.iter().map(String::as_str).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn cover_falls_back_to_item_property() {
        let opf = SAMPLE_OPF
            .replace(r#"<meta name="cover" content="cover"/>"#, "")
            .replace(
                r#"href="Images/img3.png" media-type="image/png""#,
                r#"href="Images/img3.png" media-type="image/png" properties="cover-image""#,
            );
        let package = Package::parse("OEBPS/content.opf", opf.as_bytes()).unwrap();
        assert_eq!(cover_path(&package).as_deref(), Some("OEBPS/Images/img3.png"));
    }

    #[test]
    fn contents_pattern_is_case_tolerant_on_first_letter() {
        let opf = SAMPLE_OPF.replace("Images/img2.png", "Text/Contents.xhtml");
        let package = Package::parse("OEBPS/content.opf", opf.as_bytes()).unwrap();
        let seed = seed_keep_set(&package, &Logger::silent());
        assert!(seed.contains("OEBPS/Text/Contents.xhtml"));
    }
}
