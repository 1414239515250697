//! Per-image re-encoding.

use anyhow::{Context, Result, bail};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{ColorType, DynamicImage};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::census::RasterFormat;
use crate::config::LOSSLESS;

/// Rewrites one image file in place at a quality level.
///
/// Implementations must leave the file untouched on error and must never
/// replace it with something larger.
pub trait ImageCodec: Send + Sync {
    fn compress(&self, path: &Path, format: RasterFormat, quality: u8) -> Result<()>;
}

/// Pure-Rust re-encoding through the `image` crate.
///
/// At quality 100 PNG and WebP are re-encoded losslessly and JPEG is left
/// alone. Below 100 JPEG is re-encoded at that quality and PNG is
/// posterized before encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

impl ImageCodec for NativeCodec {
    fn compress(&self, path: &Path, format: RasterFormat, quality: u8) -> Result<()> {
        if format == RasterFormat::Jpeg && quality >= LOSSLESS {
            return Ok(());
        }

        let original = std::fs::read(path)?;
        let img = image::load_from_memory_with_format(&original, format.image_format())
            .with_context(|| format!("cannot decode {}", path.display()))?;

        let encoded = match format {
            RasterFormat::Jpeg => encode_jpeg(&img, quality)?,
            RasterFormat::Png => encode_png(&posterize(&img, quality))?,
            RasterFormat::Webp => encode_webp(&img)?,
        };

        if encoded.len() < original.len() {
            std::fs::write(path, encoded)?;
        }
        Ok(())
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, LOSSLESS));
    match img.color() {
        ColorType::L8 => encoder.encode_image(&img.to_luma8())?,
        _ => encoder.encode_image(&img.to_rgb8())?,
    }
    Ok(out)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    img.write_with_encoder(PngEncoder::new_with_quality(
        &mut out,
        CompressionType::Best,
        FilterType::Adaptive,
    ))?;
    Ok(out)
}

fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>> {
    let img = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };
    let mut out = Vec::new();
    img.write_with_encoder(WebPEncoder::new_lossless(&mut out))?;
    Ok(out)
}

/// Low bits cleared per colour channel at a given quality.
fn dropped_bits(quality: u8) -> u32 {
    match quality {
        LOSSLESS..=u8::MAX => 0,
        90..=99 => 1,
        70..=89 => 2,
        40..=69 => 3,
        _ => 4,
    }
}

/// Fewer distinct colours compress better under DEFLATE. Alpha is kept.
fn posterize(img: &DynamicImage, quality: u8) -> DynamicImage {
    let bits = dropped_bits(quality);
    if bits == 0 {
        return img.clone();
    }
    let mask = 0xFFu8 << bits;

    if img.color().has_alpha() {
        let mut buf = img.to_rgba8();
        for pixel in buf.pixels_mut() {
            for channel in &mut pixel.0[..3] {
                *channel &= mask;
            }
        }
        DynamicImage::ImageRgba8(buf)
    } else {
        let mut buf = img.to_rgb8();
        for channel in buf.iter_mut() {
            *channel &= mask;
        }
        DynamicImage::ImageRgb8(buf)
    }
}

/// Lossless passes through `jpegoptim` and `oxipng` when they are on the
/// `PATH`; everything else goes to [`NativeCodec`].
#[derive(Debug, Clone, Default)]
pub struct ToolCodec {
    jpegoptim: Option<PathBuf>,
    oxipng: Option<PathBuf>,
    native: NativeCodec,
}

impl ToolCodec {
    pub fn detect() -> Self {
        Self {
            jpegoptim: which::which("jpegoptim").ok(),
            oxipng: which::which("oxipng").ok(),
            native: NativeCodec,
        }
    }

    pub fn has_tools(&self) -> bool {
        self.jpegoptim.is_some() || self.oxipng.is_some()
    }

    fn external(&self, format: RasterFormat) -> Option<(&Path, &'static [&'static str])> {
        match format {
            RasterFormat::Jpeg => self
                .jpegoptim
                .as_deref()
                .map(|bin| (bin, &["--strip-all", "--quiet"][..])),
            RasterFormat::Png => self
                .oxipng
                .as_deref()
                .map(|bin| (bin, &["-o", "4", "--strip", "safe", "--quiet"][..])),
            RasterFormat::Webp => None,
        }
    }
}

impl ImageCodec for ToolCodec {
    fn compress(&self, path: &Path, format: RasterFormat, quality: u8) -> Result<()> {
        if quality >= LOSSLESS {
            if let Some((bin, args)) = self.external(format) {
                let status = Command::new(bin)
                    .args(args)
                    .arg(path)
                    .status()
                    .with_context(|| format!("cannot run {}", bin.display()))?;
                if !status.success() {
                    bail!("{} exited with {}", bin.display(), status);
                }
                return Ok(());
            }
        }
        self.native.compress(path, format, quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_jpeg, write_png};

    fn size(path: &Path) -> u64 {
        std::fs::metadata(path).unwrap().len()
    }

    #[test]
    fn lossless_jpeg_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        write_jpeg(&path, 32, 32, 95);
        let before = std::fs::read(&path).unwrap();

        NativeCodec.compress(&path, RasterFormat::Jpeg, 100).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn lossy_jpeg_shrinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        write_jpeg(&path, 64, 64, 95);
        let before = size(&path);

        NativeCodec.compress(&path, RasterFormat::Jpeg, 20).unwrap();
        assert!(size(&path) < before);
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn never_grows_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        write_jpeg(&path, 32, 32, 10);
        let before = size(&path);

        NativeCodec.compress(&path, RasterFormat::Jpeg, 95).unwrap();
        assert!(size(&path) <= before);
    }

    #[test]
    fn png_stays_decodable_with_same_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_png(&path, 40, 30);
        let before = size(&path);

        NativeCodec.compress(&path, RasterFormat::Png, 30).unwrap();
        assert!(size(&path) <= before);
        assert_eq!(image::image_dimensions(&path).unwrap(), (40, 30));
    }

    #[test]
    fn undecodable_input_is_an_error_and_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"garbage").unwrap();

        assert!(NativeCodec.compress(&path, RasterFormat::Png, 50).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"garbage");
    }

    #[test]
    fn posterize_levels_fall_with_quality() {
        assert_eq!(dropped_bits(100), 0);
        assert!(dropped_bits(95) <= dropped_bits(75));
        assert!(dropped_bits(75) <= dropped_bits(15));
        assert_eq!(dropped_bits(0), 4);
    }
}
