//! Raster image inventory and recompression.
//!
//! [`Census`] records what is left after pruning; [`compress_all`] runs an
//! [`ImageCodec`] over it on a rayon pool.

mod census;
mod codec;
mod quality;

pub use census::{Census, ImageAsset, RasterFormat};
pub use codec::{ImageCodec, NativeCodec, ToolCodec};
pub use quality::estimate_jpeg_quality;

use rayon::ThreadPool;
use rayon::prelude::*;
use std::path::Path;

use crate::error::Warning;
use crate::logger::Logger;
use crate::{debug, warn};

/// Compress every asset under `root` at `quality`. Images are independent
/// of each other, so they run in parallel; a failure only costs that
/// image its reduction.
pub fn compress_all(
    codec: &dyn ImageCodec,
    root: &Path,
    assets: &[ImageAsset],
    quality: u8,
    pool: &ThreadPool,
    log: &Logger,
) -> Vec<Warning> {
    pool.install(|| {
        assets
            .par_iter()
            .filter_map(|asset| {
                let path = root.join(&asset.path);
                match codec.compress(&path, asset.format, quality) {
                    Ok(()) => {
                        if log.is_verbose() {
                            let after = std::fs::metadata(&path).map(|m| m.len()).unwrap_or_default();
                            debug!(log, "image"; "{} q{}: {} -> {}", asset.path, quality, asset.size, after);
                        }
                        None
                    }
                    Err(e) => {
                        let warning = Warning::CompressionFailed {
                            path: asset.path.clone(),
                            reason: format!("{e:#}"),
                        };
                        warn!(log, "image"; "{}", warning);
                        Some(warning)
                    }
                }
            })
            .collect()
    })
}
