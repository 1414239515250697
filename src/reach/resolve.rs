//! Reference resolution against the archive root.
//!
//! Every path inside the engine is an archive-root-relative key using `/`
//! separators, with no `.` or `..` segments.

use percent_encoding::percent_decode_str;

/// Collapse `.` and `..` segments of a root-relative path.
///
/// Returns `None` for absolute paths and for paths that climb above the
/// root.
pub fn normalize_path(path: &str) -> Option<String> {
    let path = path.replace('\\', "/");
    if path.starts_with('/') {
        return None;
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// Directory part of an archive path (`""` for top-level files).
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..i])
}

/// Whether `reference` starts with a URI scheme such as `http:`, `data:`
/// or `mailto:`.
fn has_scheme(reference: &str) -> bool {
    let Some(colon) = reference.find(':') else {
        return false;
    };
    let scheme = &reference[..colon];
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Resolve `reference`, found in a file under `base_dir`, to an archive
/// path.
///
/// External URLs, `data:`/`mailto:` URIs, root-absolute paths and pure
/// in-document anchors yield `None`, as does anything escaping the root.
/// Fragments and query strings are dropped and percent-escapes decoded.
pub fn resolve(base_dir: &str, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() || reference.starts_with('#') || reference.starts_with('/') {
        return None;
    }
    if has_scheme(reference) {
        return None;
    }

    let end = reference.find(['#', '?']).unwrap_or(reference.len());
    let path = &reference[..end];
    if path.is_empty() {
        return None;
    }
    let decoded = percent_decode_str(path).decode_utf8().ok()?;

    if base_dir.is_empty() {
        normalize_path(&decoded)
    } else {
        normalize_path(&format!("{base_dir}/{decoded}"))
    }
}
