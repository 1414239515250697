use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::ShrinkError;
use crate::io::ReadAt;
use crate::reach::normalize_path;
use anyhow::{Context, Result, bail};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Inflate one entry into memory and verify its CRC-32.
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        if entry.is_encrypted() {
            bail!("Encrypted entry not supported: {}", entry.file_name);
        }

        let data_offset = self.parser.data_offset(entry).await?;
        // Header sizes are untrusted; the payload must lie inside the archive
        let archive_size = self.parser.reader().size();
        if !matches!(data_offset.checked_add(entry.compressed_size), Some(end) if end <= archive_size) {
            bail!(
                "{} claims {} compressed bytes past the end of the archive",
                entry.file_name,
                entry.compressed_size
            );
        }
        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser
            .reader()
            .read_exact_at(data_offset, &mut raw)
            .await?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                let mut out = Vec::new();
                DeflateDecoder::new(raw.as_slice())
                    .take(entry.uncompressed_size.saturating_add(1))
                    .read_to_end(&mut out)
                    .with_context(|| format!("corrupt deflate stream in {}", entry.file_name))?;
                if out.len() as u64 > entry.uncompressed_size {
                    bail!(
                        "{} inflates past its declared {} bytes",
                        entry.file_name,
                        entry.uncompressed_size
                    );
                }
                out
            }
            CompressionMethod::Unknown(method) => bail!(
                "Unsupported compression method {} for {} (only STORED and DEFLATE)",
                method,
                entry.file_name
            ),
        };

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            bail!("CRC mismatch in {}", entry.file_name);
        }

        Ok(data)
    }

    /// Extract file to disk
    pub async fn extract_to_file(&self, entry: &ZipFileEntry, output_path: &Path) -> Result<()> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let data = self.extract_to_memory(entry).await?;
        let mut file = fs::File::create(output_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        Ok(())
    }

    /// Explode the whole archive under `root`, returning the archive paths
    /// written. Entries that would land outside `root` abort the run.
    pub async fn extract_all(&self, root: &Path) -> Result<Vec<String>> {
        let entries = self.list_files().await?;
        let mut written = Vec::with_capacity(entries.len());

        for entry in entries.iter().filter(|e| !e.is_directory) {
            let Some(relative) = normalize_path(&entry.file_name) else {
                return Err(ShrinkError::UnsafeEntry(entry.file_name.clone()).into());
            };
            self.extract_to_file(entry, &root.join(&relative)).await?;
            written.push(relative);
        }

        Ok(written)
    }
}
