//! Inventory of the raster images left after pruning.

use image::ImageFormat;
use jwalk::WalkDir;
use std::collections::BTreeMap;
use std::path::Path;

use super::quality::estimate_jpeg_quality;
use crate::logger::Logger;
use crate::reach::normalize_path;
use crate::{debug, log};

/// Formats the compression pass knows how to re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RasterFormat {
    Jpeg,
    Png,
    Webp,
}

impl RasterFormat {
    /// Classify by file extension, case-insensitively.
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(RasterFormat::Jpeg),
            "png" => Some(RasterFormat::Png),
            "webp" => Some(RasterFormat::Webp),
            _ => None,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            RasterFormat::Jpeg => ImageFormat::Jpeg,
            RasterFormat::Png => ImageFormat::Png,
            RasterFormat::Webp => ImageFormat::WebP,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RasterFormat::Jpeg => "jpeg",
            RasterFormat::Png => "png",
            RasterFormat::Webp => "webp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    /// Archive-root-relative path.
    pub path: String,
    pub format: RasterFormat,
    pub width: u32,
    pub height: u32,
    pub size: u64,
    /// Encoder quality guessed from the quantization tables (JPEG only).
    pub estimated_quality: Option<u8>,
}

/// Images grouped by format, each group in path order.
#[derive(Debug, Clone, Default)]
pub struct Census {
    by_format: BTreeMap<RasterFormat, Vec<ImageAsset>>,
}

impl Census {
    /// Walk `root` and record every decodable raster image.
    ///
    /// Files whose header cannot be read are left out; the compression
    /// pass would fail on them anyway.
    pub fn take(root: &Path, estimate_quality: bool, log: &Logger) -> Self {
        let mut census = Census::default();

        let mut entries: Vec<_> = WalkDir::new(root)
            .skip_hidden(false)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .collect();
        entries.sort_by_key(|e| e.path());

        for entry in entries {
            let file = entry.path();
            let Some(path) = file
                .strip_prefix(root)
                .ok()
                .and_then(|rel| normalize_path(&rel.to_string_lossy()))
            else {
                continue;
            };
            let Some(format) = RasterFormat::from_path(&path) else {
                continue;
            };
            let (width, height) = match image::image_dimensions(&file) {
                Ok(dims) => dims,
                Err(e) => {
                    debug!(log, "census"; "skipping {}: {}", path, e);
                    continue;
                }
            };

            let size = entry.metadata().map(|m| m.len()).unwrap_or_default();
            let estimated_quality = match format {
                RasterFormat::Jpeg if estimate_quality => std::fs::read(&file)
                    .ok()
                    .and_then(|bytes| estimate_jpeg_quality(&bytes)),
                _ => None,
            };

            debug!(log, "census"; "{} {}x{} {} bytes{}", path, width, height, size,
                estimated_quality.map(|q| format!(" q~{q}")).unwrap_or_default());
            census.by_format.entry(format).or_default().push(ImageAsset {
                path,
                format,
                width,
                height,
                size,
                estimated_quality,
            });
        }

        for (format, assets) in &census.by_format {
            log!(log, "census"; "{} {} image(s)", assets.len(), format.name());
        }
        census
    }

    pub fn of(&self, format: RasterFormat) -> &[ImageAsset] {
        self.by_format.get(&format).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn assets(&self) -> impl Iterator<Item = &ImageAsset> {
        self.by_format.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_format.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest estimated JPEG quality, the level above which lossy passes
    /// cannot shrink anything.
    pub fn max_source_quality(&self) -> Option<u8> {
        self.of(RasterFormat::Jpeg)
            .iter()
            .filter_map(|a| a.estimated_quality)
            .max()
    }
}
