//! Source quality estimate from a JPEG's luminance quantization table.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

/// Annex K luminance table the IJG quality scale is defined against.
const STD_LUMINANCE: [u16; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, //
    12, 12, 14, 19, 26, 58, 60, 55, //
    14, 13, 16, 24, 40, 57, 69, 56, //
    14, 17, 22, 29, 51, 87, 80, 62, //
    18, 22, 37, 56, 68, 109, 103, 77, //
    24, 35, 55, 64, 81, 104, 113, 92, //
    49, 64, 78, 87, 103, 121, 120, 101, //
    72, 92, 95, 98, 112, 100, 103, 99,
];

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const DQT: u8 = 0xDB;
const TEM: u8 = 0x01;

/// Estimate the 1..=100 quality the encoder was run at, by inverting the
/// IJG scaling of table 0. `None` when the stream has no readable table.
pub fn estimate_jpeg_quality(bytes: &[u8]) -> Option<u8> {
    let table = luminance_table(bytes)?;
    let sum: u32 = table.iter().map(|&v| u32::from(v)).sum();
    let std_sum: u32 = STD_LUMINANCE.iter().map(|&v| u32::from(v)).sum();

    let scale = f64::from(sum) * 100.0 / f64::from(std_sum);
    let quality = if scale <= 100.0 {
        (200.0 - scale) / 2.0
    } else {
        5000.0 / scale
    };
    Some(quality.round().clamp(1.0, 100.0) as u8)
}

/// Quantization table 0, in stream order.
fn luminance_table(bytes: &[u8]) -> Option<[u16; 64]> {
    let mut cursor = Cursor::new(bytes);
    if cursor.read_u8().ok()? != 0xFF || cursor.read_u8().ok()? != SOI {
        return None;
    }

    loop {
        if cursor.read_u8().ok()? != 0xFF {
            return None;
        }
        let mut marker = cursor.read_u8().ok()?;
        while marker == 0xFF {
            marker = cursor.read_u8().ok()?;
        }

        match marker {
            TEM | 0xD0..=0xD7 => continue,
            SOS | EOI => return None,
            _ => {}
        }

        let len = cursor.read_u16::<BigEndian>().ok()?;
        let mut segment = vec![0u8; usize::from(len.checked_sub(2)?)];
        cursor.read_exact(&mut segment).ok()?;

        if marker == DQT {
            if let Some(table) = table_zero(&segment) {
                return Some(table);
            }
        }
    }
}

/// A DQT segment may carry several tables back to back.
fn table_zero(segment: &[u8]) -> Option<[u16; 64]> {
    let mut cursor = Cursor::new(segment);
    while let Ok(info) = cursor.read_u8() {
        let precision = info >> 4;
        let id = info & 0x0F;

        let mut table = [0u16; 64];
        for value in table.iter_mut() {
            *value = if precision == 0 {
                u16::from(cursor.read_u8().ok()?)
            } else {
                cursor.read_u16::<BigEndian>().ok()?
            };
        }
        if id == 0 {
            return Some(table);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage};

    fn encode(quality: u8) -> Vec<u8> {
        let img = RgbImage::from_fn(24, 24, |x, y| Rgb([(x * 9) as u8, (y * 7) as u8, 128]));
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality)
            .encode_image(&img)
            .unwrap();
        out
    }

    #[test]
    fn recovers_encoder_quality() {
        for quality in [30u8, 50, 75, 90] {
            let estimate = estimate_jpeg_quality(&encode(quality)).unwrap();
            assert!(
                estimate.abs_diff(quality) <= 2,
                "q={quality} estimated as {estimate}"
            );
        }
    }

    #[test]
    fn maximum_quality_estimates_near_the_top() {
        assert!(estimate_jpeg_quality(&encode(100)).unwrap() >= 98);
    }

    #[test]
    fn non_jpeg_input_has_no_estimate() {
        assert_eq!(estimate_jpeg_quality(b"\x89PNG\r\n\x1a\n"), None);
        assert_eq!(estimate_jpeg_quality(&[0xFF, 0xD8, 0xFF, 0xDA, 0, 2]), None);
        assert_eq!(estimate_jpeg_quality(&[]), None);
    }
}
