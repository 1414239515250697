//! ZIP archive container: read, explode, repack.
//!
//! - [`structures`]: binary records (EOCD, central and local headers)
//! - [`parser`]: Central Directory parsing over any [`ReadAt`](crate::io::ReadAt)
//! - [`extractor`]: STORED/DEFLATE extraction with CRC-32 checks
//! - [`writer`]: deterministic repacking with the type marker first
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archives
//! - Output is never ZIP64; a package over 4 GiB fails to repack

mod extractor;
mod parser;
mod structures;
mod writer;

pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use structures::*;
pub use writer::{TYPE_MARKER, ZipWriter, packing_order, repack};
