//! Deterministic archive writer.
//!
//! The type-marker entry (`mimetype`) goes first and STORED; everything
//! else is DEFLATE-compressed in sorted path order with a fixed timestamp,
//! so the same tree always packs to the same bytes.

use flate2::Compression;
use flate2::Crc;
use flate2::write::DeflateEncoder;
use jwalk::WalkDir;
use std::io::Write;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use anyhow::{Context, Result, bail};

use super::structures::{CompressionMethod, EndOfCentralDirectory, EntryRecord};

/// Name of the entry that must lead the archive uncompressed.
pub const TYPE_MARKER: &str = "mimetype";

/// Streaming writer for a single-disk, non-ZIP64 archive.
pub struct ZipWriter<W: AsyncWrite + Unpin> {
    out: W,
    offset: u64,
    records: Vec<EntryRecord>,
}

impl<W: AsyncWrite + Unpin> ZipWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            offset: 0,
            records: Vec::new(),
        }
    }

    /// Append one entry.
    pub async fn add_entry(
        &mut self,
        name: &str,
        data: &[u8],
        method: CompressionMethod,
    ) -> Result<()> {
        let mut crc = Crc::new();
        crc.update(data);

        let payload = match method {
            CompressionMethod::Stored => data.to_vec(),
            CompressionMethod::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
                encoder.write_all(data)?;
                encoder.finish()?
            }
            CompressionMethod::Unknown(m) => bail!("cannot write compression method {m}"),
        };

        let record = EntryRecord {
            file_name: name.to_string(),
            method,
            crc32: crc.sum(),
            compressed_size: fits_u32(payload.len() as u64, name)?,
            uncompressed_size: fits_u32(data.len() as u64, name)?,
            lfh_offset: fits_u32(self.offset, name)?,
        };

        let header = record.local_header()?;
        self.out.write_all(&header).await?;
        self.out.write_all(&payload).await?;
        self.offset += (header.len() + payload.len()) as u64;
        self.records.push(record);
        Ok(())
    }

    /// Write the central directory and end record, returning the sink.
    pub async fn finish(mut self) -> Result<W> {
        if self.records.len() > u16::MAX as usize {
            bail!("too many entries for a non-ZIP64 archive");
        }

        let cd_offset = fits_u32(self.offset, "central directory")?;
        let mut cd_size = 0u64;
        for record in &self.records {
            let header = record.central_header()?;
            self.out.write_all(&header).await?;
            cd_size += header.len() as u64;
        }

        let eocd = EndOfCentralDirectory::new(
            self.records.len() as u16,
            fits_u32(cd_size, "central directory")?,
            cd_offset,
        );
        self.out.write_all(&eocd.to_bytes()?).await?;
        self.out.flush().await?;
        Ok(self.out)
    }
}

fn fits_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value).with_context(|| format!("{what} exceeds the 4 GiB non-ZIP64 limit"))
}

/// Archive-relative paths of every file under `root`, `/`-separated and
/// sorted, with the type marker first when present.
pub fn packing_order(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .skip_hidden(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let path = e.path();
            let rel = path.strip_prefix(root).ok()?;
            let parts: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            Some(parts.join("/"))
        })
        .collect();
    files.sort();

    if let Some(pos) = files.iter().position(|f| f == TYPE_MARKER) {
        let marker = files.remove(pos);
        files.insert(0, marker);
    }
    files
}

/// Pack the tree at `root` into `output`, returning the archive size.
pub async fn repack(root: &Path, output: &Path) -> Result<u64> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let file = fs::File::create(output)
        .await
        .with_context(|| format!("cannot create {}", output.display()))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));

    for name in packing_order(root) {
        let data = fs::read(root.join(&name)).await?;
        let method = if name == TYPE_MARKER {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflate
        };
        writer.add_entry(&name, &data, method).await?;
    }

    let mut out = writer.finish().await?;
    out.flush().await?;
    drop(out);

    Ok(fs::metadata(output).await?.len())
}
