//! # epub-shrink
//!
//! Shrinks EPUB packages in two passes:
//!
//! 1. **Prune.** Known junk is purged, then everything the manifest
//!    declares but no document, stylesheet, spine or guide entry can reach
//!    is deleted from disk and from the package document.
//! 2. **Compress.** Remaining raster images are recompressed, lossless
//!    first, then at falling JPEG/PNG quality until the repacked archive
//!    fits a target size or the quality floor is reached.
//!
//! Inputs may be local files or HTTP(S) URLs.
//!
//! ## Example
//!
//! ```no_run
//! use epub_shrink::{Cli, Logger, ShrinkConfig, shrink};
//! use clap::Parser;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cli = Cli::parse_from(["epub-shrink", "book.epub", "-t", "2048"]);
//!     let config = ShrinkConfig::from_cli(&cli)?;
//!     let report = shrink(&config, &Logger::new(config.verbosity)).await?;
//!     println!("{} -> {} bytes", report.original_size, report.final_size);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod fsutil;
pub mod images;
pub mod io;
pub mod logger;
pub mod package;
pub mod reach;
pub mod rules;
pub mod shrink;
pub mod zip;

#[cfg(test)]
mod testing;

pub use cli::Cli;
pub use config::{Input, SearchPolicy, ShrinkConfig};
pub use driver::{CompressionAttempt, CompressionDriver, SearchOutcome, next_quality};
pub use error::{ShrinkError, Warning};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use logger::{Logger, Verbosity};
pub use package::Package;
pub use reach::{KeepSet, ReachabilityEngine};
pub use shrink::{PruneSummary, ShrinkReport, prune_tree, shrink, shrink_archive};
pub use zip::{ZipExtractor, ZipFileEntry};
