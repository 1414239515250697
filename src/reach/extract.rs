//! Raw reference extraction per content kind.

use thiserror::Error;

use super::css::{css_references, parse_css};
use super::markup::scan_markup;

/// How a piece of text should be tokenized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// XHTML, HTML, SVG or NCX documents.
    Markup,
    Stylesheet,
    /// The value of a `style` attribute.
    InlineStyle,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("markup tokenizer rejected the document: {0}")]
    Markup(String),
}

/// Every raw reference string in `text`, one per occurrence.
///
/// Nothing is resolved or filtered here beyond what the tokenizers
/// already drop (comments); the path resolver discards external and
/// anchor references.
pub fn extract(kind: ContentKind, text: &str) -> Result<Vec<String>, ExtractError> {
    match kind {
        ContentKind::Stylesheet | ContentKind::InlineStyle => Ok(css_references(&parse_css(text))),
        ContentKind::Markup => {
            let scan = scan_markup(text).map_err(ExtractError::Markup)?;
            let mut refs = scan.links;
            for css in scan.inline_styles.iter().chain(&scan.style_blocks) {
                refs.extend(css_references(&parse_css(css)));
            }
            Ok(refs)
        }
    }
}
