//! .mfp file format structures

use crc::{Crc, CRC_32_ISO_HDLC};
use serde::{Deserialize, Serialize};

/// Magic bytes for .mfp files: "MFPS"
pub const MAGIC: [u8; 4] = [0x4D, 0x46, 0x50, 0x53];

/// Current format version
pub const VERSION: u16 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 24;

/// Longest track path a record may carry, in bytes
pub const MAX_PATH_LEN: usize = 32 * 1024;

/// Checksum applied to every record
pub(crate) const RECORD_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// File header (24 bytes fixed size)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MfpHeader {
    /// Magic bytes: "MFPS"
    pub magic: [u8; 4],
    /// Format version
    pub version: u16,
    /// Number of values in every fingerprint
    pub dimension: u16,
    /// Flags (reserved, always 0 in version 1)
    pub flags: u32,
    /// Creation time (unix seconds)
    pub created_at: i64,
    /// Reserved
    pub reserved: u32,
}

impl MfpHeader {
    pub fn new(dimension: u16) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            dimension,
            flags: 0,
            created_at: chrono::Utc::now().timestamp(),
            reserved: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.dimension.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.flags.to_le_bytes());
        bytes[12..20].copy_from_slice(&self.created_at.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.reserved.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> anyhow::Result<Self> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != MAGIC {
            anyhow::bail!("Invalid .mfp file: magic bytes mismatch");
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            anyhow::bail!("Unsupported .mfp version: {}", version);
        }

        let mut created_at = [0u8; 8];
        created_at.copy_from_slice(&bytes[12..20]);

        Ok(Self {
            magic,
            version,
            dimension: u16::from_le_bytes([bytes[6], bytes[7]]),
            flags: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            created_at: i64::from_le_bytes(created_at),
            reserved: u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]),
        })
    }
}

/// One stored fingerprint keyed by track path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub track: String,
    pub values: Vec<f32>,
}

impl FingerprintRecord {
    pub fn new(track: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            track: track.into(),
            values,
        }
    }

    /// Encoded size of a record with the longest allowed path
    pub fn max_encoded_len(dimension: usize) -> usize {
        4 + MAX_PATH_LEN + dimension * 4 + 4
    }

    /// Encode as `[path_len u32][path][values f32 ...][crc32]`, little-endian
    pub fn encode(&self) -> Vec<u8> {
        let path = self.track.as_bytes();
        let mut bytes = Vec::with_capacity(4 + path.len() + self.values.len() * 4 + 4);

        bytes.extend_from_slice(&(path.len() as u32).to_le_bytes());
        bytes.extend_from_slice(path);
        for value in &self.values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        let checksum = RECORD_CRC.checksum(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_bytes() {
        let header = MfpHeader::new(13);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"MFPS");

        let parsed = MfpHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_rejects_bad_magic() {
        let mut bytes = MfpHeader::new(13).to_bytes();
        bytes[0] = b'X';
        assert!(MfpHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_record_layout() {
        let record = FingerprintRecord::new("a.mp3", vec![1.0, -2.0]);
        let bytes = record.encode();
        // 4 (len) + 5 (path) + 2 * 4 (values) + 4 (crc)
        assert_eq!(bytes.len(), 21);
        assert_eq!(&bytes[0..4], &5u32.to_le_bytes());
        assert_eq!(&bytes[4..9], b"a.mp3");
        assert_eq!(&bytes[9..13], &1.0f32.to_le_bytes());
    }
}
