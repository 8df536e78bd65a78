//! .mfp file reader

use crate::format::{FingerprintRecord, MfpHeader, HEADER_SIZE, MAX_PATH_LEN, RECORD_CRC};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Contents of a .mfp file
#[derive(Debug, Clone)]
pub struct MfpFile {
    pub header: MfpHeader,
    /// Records in file order, including superseded ones
    pub records: Vec<FingerprintRecord>,
    /// True if the file ended inside a record
    pub truncated: bool,
    /// Byte length covered by the header and complete records
    pub valid_len: u64,
}

impl MfpFile {
    /// Latest record per track, in order of each track's first appearance
    pub fn latest_records(&self) -> Vec<FingerprintRecord> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut latest: Vec<FingerprintRecord> = Vec::new();

        for record in &self.records {
            match positions.get(record.track.as_str()) {
                Some(&idx) => latest[idx].values = record.values.clone(),
                None => {
                    positions.insert(record.track.as_str(), latest.len());
                    latest.push(record.clone());
                }
            }
        }

        latest
    }
}

pub struct MfpReader;

impl MfpReader {
    /// Read .mfp file
    pub fn read(path: &Path) -> Result<MfpFile> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read .mfp file: {}", path.display()))?;
        Self::parse(&bytes).with_context(|| format!("Invalid .mfp file: {}", path.display()))
    }

    /// Parse .mfp content from memory
    pub fn parse(bytes: &[u8]) -> Result<MfpFile> {
        if bytes.len() < HEADER_SIZE {
            anyhow::bail!("File too short for header ({} bytes)", bytes.len());
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(&bytes[..HEADER_SIZE]);
        let header = MfpHeader::from_bytes(&header_bytes)?;
        let dimension = header.dimension as usize;

        let mut records = Vec::new();
        let mut offset = HEADER_SIZE;
        let mut truncated = false;

        while offset < bytes.len() {
            let remaining = &bytes[offset..];
            match decode_record(remaining, dimension, offset)? {
                Some((record, len)) => {
                    records.push(record);
                    offset += len;
                }
                None => {
                    check_partial_tail(remaining, dimension, offset)?;
                    truncated = true;
                    break;
                }
            }
        }

        Ok(MfpFile {
            header,
            records,
            truncated,
            valid_len: offset as u64,
        })
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Decode the record at the start of `bytes`, returning it with its encoded
/// length, or `None` if `bytes` ends before the record does
fn decode_record(
    bytes: &[u8],
    dimension: usize,
    offset: usize,
) -> Result<Option<(FingerprintRecord, usize)>> {
    if bytes.len() < 4 {
        return Ok(None);
    }

    let path_len = read_u32(bytes) as usize;
    if path_len > MAX_PATH_LEN {
        anyhow::bail!(
            "Corrupt record at byte offset {}: path length {} exceeds {}",
            offset,
            path_len,
            MAX_PATH_LEN
        );
    }

    let body_len = 4 + path_len + dimension * 4;
    if bytes.len() < body_len + 4 {
        return Ok(None);
    }

    let body = &bytes[..body_len];
    if RECORD_CRC.checksum(body) != read_u32(&bytes[body_len..]) {
        anyhow::bail!("Checksum mismatch in record at byte offset {}", offset);
    }

    let track = String::from_utf8(body[4..4 + path_len].to_vec())
        .with_context(|| format!("Track path at byte offset {} is not UTF-8", offset))?;

    let values = body[4 + path_len..]
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(Some((FingerprintRecord { track, values }, body_len + 4)))
}

/// True if a complete, checksum-valid record starts at `bytes[0]`
fn is_valid_record(bytes: &[u8], dimension: usize) -> bool {
    if bytes.len() < 4 {
        return false;
    }
    let path_len = read_u32(bytes) as usize;
    if path_len > MAX_PATH_LEN {
        return false;
    }
    let body_len = 4 + path_len + dimension * 4;
    bytes.len() >= body_len + 4
        && RECORD_CRC.checksum(&bytes[..body_len]) == read_u32(&bytes[body_len..])
}

/// An incomplete record is only accepted as the remains of one interrupted
/// append: shorter than the longest possible record, with no intact record after it.
fn check_partial_tail(tail: &[u8], dimension: usize, offset: usize) -> Result<()> {
    if tail.len() >= FingerprintRecord::max_encoded_len(dimension) {
        anyhow::bail!(
            "Corrupt record at byte offset {}: {} trailing bytes cannot be a partial record",
            offset,
            tail.len()
        );
    }
    if let Some(at) = (1..tail.len()).find(|&i| is_valid_record(&tail[i..], dimension)) {
        anyhow::bail!(
            "Corrupt record at byte offset {}: intact record found at byte offset {}",
            offset,
            offset + at
        );
    }
    Ok(())
}
