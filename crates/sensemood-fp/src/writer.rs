//! .mfp file writer

use crate::format::{FingerprintRecord, MfpHeader, MAX_PATH_LEN};
use crate::reader::MfpReader;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only writer for .mfp files
pub struct MfpWriter {
    path: PathBuf,
    header: MfpHeader,
    writer: BufWriter<File>,
}

impl MfpWriter {
    /// Open an existing .mfp file for appending, or create it with a fresh header.
    ///
    /// An existing file must carry the same dimension. A truncated trailing
    /// record left by an interrupted write is cut off before appending.
    pub fn open(path: &Path, dimension: u16) -> Result<Self> {
        let exists = path.exists() && std::fs::metadata(path)?.len() > 0;

        if !exists {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            let file = File::create(path)
                .with_context(|| format!("Failed to create .mfp file: {}", path.display()))?;
            let header = MfpHeader::new(dimension);
            let mut writer = BufWriter::new(file);
            writer.write_all(&header.to_bytes())?;
            writer.flush()?;

            return Ok(Self {
                path: path.to_path_buf(),
                header,
                writer,
            });
        }

        let existing = MfpReader::read(path)?;
        if existing.header.dimension != dimension {
            anyhow::bail!(
                "Fingerprint dimension mismatch in {}: file has {}, expected {}",
                path.display(),
                existing.header.dimension,
                dimension
            );
        }

        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open .mfp file: {}", path.display()))?;
        if existing.truncated {
            let len = file.metadata()?.len();
            let partial = len.saturating_sub(existing.valid_len);
            if partial >= FingerprintRecord::max_encoded_len(dimension as usize) as u64 {
                anyhow::bail!(
                    "Refusing to cut {} trailing bytes from {}",
                    partial,
                    path.display()
                );
            }
            file.set_len(existing.valid_len)?;
        }

        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open .mfp file: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            header: existing.header,
            writer: BufWriter::new(file),
        })
    }

    pub fn header(&self) -> &MfpHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it to disk
    pub fn append(&mut self, record: &FingerprintRecord) -> Result<()> {
        if record.values.len() != self.header.dimension as usize {
            anyhow::bail!(
                "Record for {} has {} values, file dimension is {}",
                record.track,
                record.values.len(),
                self.header.dimension
            );
        }
        if record.track.len() > MAX_PATH_LEN {
            anyhow::bail!(
                "Track path is {} bytes, the limit is {}",
                record.track.len(),
                MAX_PATH_LEN
            );
        }

        self.writer.write_all(&record.encode())?;
        self.writer.flush()?;

        Ok(())
    }
}
