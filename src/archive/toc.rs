//! Table-of-contents record codec (spec.md §4.2).

use crate::consts::BLOCK_SIZE;
use crate::error::{Error, Result};

pub(crate) const RECORD_SIZE: usize = 16;

/// One table-of-contents record. `entry_size` records the width of the
/// on-disk record (which may exceed `RECORD_SIZE` with trailing padding);
/// `padding` holds those trailing bytes verbatim so re-encoding preserves
/// the original layout exactly, padding included.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TocEntry {
    pub size: i64,
    pub rsc_flags: i64,
    pub resource_type: u32,
    pub offset_block: u32,
    pub used_blocks: u16,
    pub flags: u16,
    pub is_resource_file: bool,
    pub entry_size: usize,
    padding: Vec<u8>,
}

impl TocEntry {
    /// Builds a fresh record (no resource flags, no padding beyond what
    /// `entry_size` demands) for an entry with no prior on-disk record.
    pub fn new(size: i64, entry_size: usize) -> TocEntry {
        TocEntry {
            size,
            rsc_flags: 0,
            resource_type: 0,
            offset_block: 0,
            used_blocks: 0,
            flags: 0,
            is_resource_file: false,
            entry_size,
            padding: vec![0u8; entry_size.saturating_sub(RECORD_SIZE)],
        }
    }

    pub fn decode(data: &[u8]) -> Result<TocEntry> {
        if data.len() < RECORD_SIZE {
            return Err(Error::MalformedArchive(format!(
                "TOC record needs {RECORD_SIZE} bytes, got {}",
                data.len()
            )));
        }

        let raw = u32::from_le_bytes(data[0..4].try_into().unwrap());
        let is_resource_file = raw & 0xC000_0000 != 0;
        let resource_type = u32::from_le_bytes(data[4..8].try_into().unwrap());
        let offset_block = u32::from_le_bytes(data[8..12].try_into().unwrap());
        let used_blocks = u16::from_le_bytes(data[12..14].try_into().unwrap());
        let flags = u16::from_le_bytes(data[14..16].try_into().unwrap());

        let (size, rsc_flags) = if is_resource_file {
            let effective = (used_blocks as i64) * (BLOCK_SIZE as i64) - (flags as i64 & 0x7FF);
            (effective.max(0), raw as i64)
        } else {
            (raw as i64, 0)
        };

        Ok(TocEntry {
            size,
            rsc_flags,
            resource_type,
            offset_block,
            used_blocks,
            flags,
            is_resource_file,
            entry_size: data.len(),
            padding: data[RECORD_SIZE..].to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.entry_size];
        let first = if self.is_resource_file {
            self.rsc_flags as u32
        } else {
            self.size as u32
        };
        out[0..4].copy_from_slice(&first.to_le_bytes());
        out[4..8].copy_from_slice(&self.resource_type.to_le_bytes());
        out[8..12].copy_from_slice(&self.offset_block.to_le_bytes());
        out[12..14].copy_from_slice(&self.used_blocks.to_le_bytes());
        out[14..16].copy_from_slice(&self.flags.to_le_bytes());
        let padding_end = RECORD_SIZE + self.padding.len();
        if padding_end <= out.len() {
            out[RECORD_SIZE..padding_end].copy_from_slice(&self.padding);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_resource_size_is_the_raw_u32() {
        let mut data = [0u8; 16];
        data[0..4].copy_from_slice(&42u32.to_le_bytes());
        let toc = TocEntry::decode(&data).unwrap();
        assert!(!toc.is_resource_file);
        assert_eq!(toc.size, 42);
    }

    #[test]
    fn resource_size_derives_from_used_blocks_and_flags() {
        let mut data = [0u8; 16];
        let raw = 0xC000_0000u32;
        data[0..4].copy_from_slice(&raw.to_le_bytes());
        data[12..14].copy_from_slice(&2u16.to_le_bytes()); // used_blocks
        data[14..16].copy_from_slice(&0x10u16.to_le_bytes()); // flags padding
        let toc = TocEntry::decode(&data).unwrap();
        assert!(toc.is_resource_file);
        assert_eq!(toc.size, 2 * 0x800 - 0x10);
    }

    #[test]
    fn resource_size_clamps_at_zero() {
        let mut data = [0u8; 16];
        data[0..4].copy_from_slice(&0xC000_0000u32.to_le_bytes());
        data[12..14].copy_from_slice(&0u16.to_le_bytes());
        data[14..16].copy_from_slice(&0x7FFu16.to_le_bytes());
        let toc = TocEntry::decode(&data).unwrap();
        assert_eq!(toc.size, 0);
    }

    #[test]
    fn encode_preserves_original_entry_size_with_padding() {
        let mut data = vec![0u8; 20]; // 4 bytes of trailing padding
        data[0..4].copy_from_slice(&7u32.to_le_bytes());
        data[16..20].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let toc = TocEntry::decode(&data).unwrap();
        let encoded = toc.encode();
        assert_eq!(encoded.len(), 20);
        assert_eq!(encoded, data);
        assert_eq!(&encoded[16..20], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn round_trips_for_non_resource_entry() {
        let mut data = [0u8; 16];
        data[0..4].copy_from_slice(&123u32.to_le_bytes());
        data[4..8].copy_from_slice(&9u32.to_le_bytes());
        data[8..12].copy_from_slice(&5u32.to_le_bytes());
        data[12..14].copy_from_slice(&1u16.to_le_bytes());
        let toc = TocEntry::decode(&data).unwrap();
        assert_eq!(toc.encode(), data);
    }
}
