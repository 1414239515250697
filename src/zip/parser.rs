//! Central-directory parser.
//!
//! Reads the End of Central Directory from the archive tail (ZIP64 aware),
//! then the Central Directory, then each entry's Local File Header to find
//! where its data starts.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::structures::*;

/// Largest archive comment the format allows.
const MAX_COMMENT_SIZE: usize = u16::MAX as usize;

/// Extra-field tag of the ZIP64 extended information block.
const ZIP64_EXTRA_TAG: u16 = 0x0001;

/// A 32-bit size or offset field that defers to the ZIP64 extra field.
const SATURATED: u64 = 0xFFFF_FFFF;

/// Where the central directory sits and how many entries it holds.
struct DirectoryBounds {
    offset: u64,
    size: u64,
    entries: u64,
}

/// Low-level ZIP reader, generic over the byte source.
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    async fn read_vec(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.reader.read_exact_at(offset, &mut buf).await?;
        Ok(buf)
    }

    /// Locate the EOCD record, returning it with its file offset.
    ///
    /// The record is the last signature whose comment length exactly
    /// reaches the end of the file; one tail read covers the longest
    /// possible comment.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let record = EndOfCentralDirectory::SIZE;
        if self.size < record as u64 {
            bail!("not a ZIP archive: {} bytes", self.size);
        }

        let window = ((MAX_COMMENT_SIZE + record) as u64).min(self.size);
        let start = self.size - window;
        let tail = self.read_vec(start, window as usize).await?;

        let found = (0..=tail.len() - record).rev().find(|&i| {
            tail[i..i + 4] == EndOfCentralDirectory::SIGNATURE[..]
                && usize::from(u16::from_le_bytes([tail[i + 20], tail[i + 21]]))
                    == tail.len() - i - record
        });
        let Some(i) = found else {
            bail!("not a ZIP archive: no end of central directory record");
        };

        let eocd = EndOfCentralDirectory::from_bytes(&tail[i..i + record])?;
        Ok((eocd, start + i as u64))
    }

    /// Read the ZIP64 EOCD through the locator that precedes the EOCD.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .context("ZIP64 locator would start before the archive")?;
        let locator = Zip64EOCDLocator::from_bytes(
            &self.read_vec(locator_offset, Zip64EOCDLocator::SIZE).await?,
        )?;
        Zip64EOCD::from_bytes(&self.read_vec(locator.eocd64_offset, Zip64EOCD::MIN_SIZE).await?)
    }

    async fn directory_bounds(&self) -> Result<DirectoryBounds> {
        let (eocd, eocd_offset) = self.find_eocd().await?;
        let bounds = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            DirectoryBounds {
                offset: eocd64.cd_offset,
                size: eocd64.cd_size,
                entries: eocd64.total_entries,
            }
        } else {
            DirectoryBounds {
                offset: u64::from(eocd.cd_offset),
                size: u64::from(eocd.cd_size),
                entries: u64::from(eocd.total_entries),
            }
        };

        if bounds.offset.saturating_add(bounds.size) > self.size {
            bail!("central directory lies beyond the end of the archive");
        }
        Ok(bounds)
    }

    /// Every entry recorded in the Central Directory, in directory order.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let bounds = self.directory_bounds().await?;
        let directory = self.read_vec(bounds.offset, bounds.size as usize).await?;

        let mut cursor = Cursor::new(directory.as_slice());
        (0..bounds.entries)
            .map(|_| read_central_header(&mut cursor))
            .collect()
    }

    /// Offset of an entry's data, past its variable-length local header.
    pub async fn data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let header = self.read_vec(entry.lfh_offset, LFH_SIZE).await?;
        if header[0..4] != LFH_SIGNATURE[..] {
            bail!("bad local header for {}", entry.file_name);
        }

        // Name and extra lengths close the fixed part
        let mut cursor = Cursor::new(&header[LFH_SIZE - 4..]);
        let name_len = u64::from(cursor.read_u16::<LittleEndian>()?);
        let extra_len = u64::from(cursor.read_u16::<LittleEndian>()?);
        Ok(entry.lfh_offset + LFH_SIZE as u64 + name_len + extra_len)
    }
}

/// Decode one Central Directory File Header and advance past it.
fn read_central_header(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
    let mut signature = [0u8; 4];
    cursor.read_exact(&mut signature)?;
    if signature != CDFH_SIGNATURE {
        bail!("bad central directory header at {}", cursor.position() - 4);
    }

    // version made by, version needed
    cursor.set_position(cursor.position() + 4);
    let flags = cursor.read_u16::<LittleEndian>()?;
    let method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed = u64::from(cursor.read_u32::<LittleEndian>()?);
    let uncompressed = u64::from(cursor.read_u32::<LittleEndian>()?);
    let name_len = cursor.read_u16::<LittleEndian>()?;
    let extra_len = cursor.read_u16::<LittleEndian>()?;
    let comment_len = cursor.read_u16::<LittleEndian>()?;
    // disk number, internal and external attributes
    cursor.set_position(cursor.position() + 8);
    let lfh_offset = u64::from(cursor.read_u32::<LittleEndian>()?);

    let mut name = vec![0u8; usize::from(name_len)];
    cursor.read_exact(&mut name)?;
    let file_name = String::from_utf8_lossy(&name).into_owned();

    let mut extra = vec![0u8; usize::from(extra_len)];
    cursor.read_exact(&mut extra)?;
    let [uncompressed_size, compressed_size, lfh_offset] =
        widen_from_extra(&extra, [uncompressed, compressed, lfh_offset])?;

    cursor.set_position(cursor.position() + u64::from(comment_len));

    Ok(ZipFileEntry {
        is_directory: file_name.ends_with('/'),
        file_name,
        flags,
        compression_method: CompressionMethod::from_u16(method),
        compressed_size,
        uncompressed_size,
        crc32,
        lfh_offset,
        last_mod_time,
        last_mod_date,
    })
}

/// Replace saturated 32-bit fields with their ZIP64 values. The block
/// stores only the saturated ones, in this fixed order.
fn widen_from_extra(extra: &[u8], mut fields: [u64; 3]) -> Result<[u64; 3]> {
    let mut cursor = Cursor::new(extra);
    while cursor.position() + 4 <= extra.len() as u64 {
        let tag = cursor.read_u16::<LittleEndian>()?;
        let len = u64::from(cursor.read_u16::<LittleEndian>()?);
        let end = cursor.position() + len;

        if tag == ZIP64_EXTRA_TAG {
            for field in fields.iter_mut().filter(|f| **f == SATURATED) {
                if cursor.position() + 8 > end {
                    break;
                }
                *field = cursor.read_u64::<LittleEndian>()?;
            }
        }
        cursor.set_position(end);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip64_extra_only_widens_saturated_fields() {
        let mut extra = Vec::new();
        extra.extend_from_slice(&0x7075u16.to_le_bytes()); // unrelated block
        extra.extend_from_slice(&2u16.to_le_bytes());
        extra.extend_from_slice(&[0, 0]);
        extra.extend_from_slice(&ZIP64_EXTRA_TAG.to_le_bytes());
        extra.extend_from_slice(&8u16.to_le_bytes());
        extra.extend_from_slice(&(5u64 << 32).to_le_bytes());

        let widened = widen_from_extra(&extra, [10, SATURATED, 30]).unwrap();
        assert_eq!(widened, [10, 5u64 << 32, 30]);
    }

    #[test]
    fn empty_extra_changes_nothing() {
        assert_eq!(widen_from_extra(&[], [1, 2, 3]).unwrap(), [1, 2, 3]);
    }
}
