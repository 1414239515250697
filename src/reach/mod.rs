//! Reference discovery and reachability over an exploded package.
//!
//! - [`resolve`]: archive-root path arithmetic for hrefs
//! - [`extract`]: raw references out of markup and stylesheets
//! - [`ReachabilityEngine`]: worklist mark phase plus the sweep

mod css;
mod engine;
mod extract;
mod keep;
mod markup;
mod resolve;

pub use css::{CssNode, css_references, parse_css};
pub use engine::{PruneReport, ReachabilityEngine, Traversal};
pub use extract::{ContentKind, ExtractError, extract};
pub use keep::KeepSet;
pub use markup::{MarkupScan, scan_markup};
pub use resolve::{normalize_path, parent_dir, resolve};
