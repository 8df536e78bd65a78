//! SenseMood fingerprint store file formats
//!
//! A fixed-width binary append log (`.mfp`) and a JSON document, both keyed
//! by track path and carrying the fingerprint dimension explicitly.

pub mod format;
pub mod json_format;
pub mod reader;
pub mod writer;

pub use format::{FingerprintRecord, MfpHeader, HEADER_SIZE, MAGIC, MAX_PATH_LEN, VERSION};
pub use json_format::{FpJsonMetadata, FpJsonStore, FpJsonTrack};
pub use reader::{MfpFile, MfpReader};
pub use writer::MfpWriter;
