//! The 20-byte archive header (spec.md §3).

use crate::consts::HEADER_SIZE;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchiveHeader {
    pub identifier: u32,
    pub version: i32,
    pub entry_count: i32,
    pub toc_size: i32,
    pub toc_entry_size: i16,
    pub unknown: i16,
}

impl ArchiveHeader {
    pub fn decode(data: &[u8]) -> Result<ArchiveHeader> {
        if data.len() < HEADER_SIZE {
            return Err(Error::MalformedArchive(format!(
                "header needs {HEADER_SIZE} bytes, got {}",
                data.len()
            )));
        }
        Ok(ArchiveHeader {
            identifier: u32::from_le_bytes(data[0..4].try_into().unwrap()),
            version: i32::from_le_bytes(data[4..8].try_into().unwrap()),
            entry_count: i32::from_le_bytes(data[8..12].try_into().unwrap()),
            toc_size: i32::from_le_bytes(data[12..16].try_into().unwrap()),
            toc_entry_size: i16::from_le_bytes(data[16..18].try_into().unwrap()),
            unknown: i16::from_le_bytes(data[18..20].try_into().unwrap()),
        })
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.identifier.to_le_bytes());
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&self.entry_count.to_le_bytes());
        out[12..16].copy_from_slice(&self.toc_size.to_le_bytes());
        out[16..18].copy_from_slice(&self.toc_entry_size.to_le_bytes());
        out[18..20].copy_from_slice(&self.unknown.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let header = ArchiveHeader {
            identifier: 0xA94E2A52,
            version: 1,
            entry_count: 2,
            toc_size: 64,
            toc_entry_size: 16,
            unknown: 0,
        };
        let bytes = header.encode();
        assert_eq!(ArchiveHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(ArchiveHeader::decode(&[0u8; 10]).is_err());
    }
}
