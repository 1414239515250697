//! Keep and purge rules layered around reachability.

mod essential;
mod glob;
mod purge;

pub use essential::{ESSENTIAL_PATTERNS, cover_path, seed_keep_set};
pub use glob::{PatternSet, glob_match, matches_item};
pub use purge::{DEFAULT_PURGE_PATTERNS, PurgeReport, purge};
