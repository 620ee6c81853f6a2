//! A single archive entry (spec.md §3 "Archive entry").

use super::toc::TocEntry;

/// One named entry in an [`super::Archive`]. `data` is owned by the
/// entry; [`ArchiveEntry::data`] hands callers a defensive copy so they
/// can't mutate the archive's backing bytes through a shared reference.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchiveEntry {
    pub(super) index: usize,
    pub(super) name: String,
    pub(super) toc: TocEntry,
    pub(super) data: Vec<u8>,
}

impl ArchiveEntry {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn toc(&self) -> &TocEntry {
        &self.toc
    }

    /// A defensive copy of this entry's payload.
    pub fn data(&self) -> Vec<u8> {
        self.data.clone()
    }
}
