//! The archive container codec (spec.md §4.3): parsing, block-aligned
//! layout reconstruction, and the four editing operations a caller uses
//! to add, remove, enumerate, and re-serialize entries.

mod entry;
mod header;
mod toc;

pub use entry::ArchiveEntry;
pub use header::ArchiveHeader;
pub use toc::TocEntry;

use crate::cipher::Cipher;
use crate::consts::{ARCHIVE_MAGIC, BLOCK_SIZE, DEFAULT_TOC_ENTRY_SIZE, HEADER_SIZE};
use crate::error::{Error, Result};

/// A loaded archive: its header, an ordered list of entries, and
/// whether it was encrypted on disk. Mutations (`add_entry`,
/// `remove_entry`) keep `entries()` in file order and re-run
/// [`Archive::rebuild`] so every invariant in spec.md §3 holds again
/// before the next operation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Archive {
    header: ArchiveHeader,
    entries: Vec<ArchiveEntry>,
    encrypted: bool,
}

impl Archive {
    /// Parses an archive image. Detects encryption from the magic at
    /// offset 0, decrypts the header and TOC region if needed, then
    /// slices every entry's payload out of the (already magic-checked)
    /// original buffer.
    #[tracing::instrument(skip(data, cipher))]
    pub fn load(data: &[u8], cipher: &Cipher) -> Result<Archive> {
        if data.len() < 4 {
            return Err(Error::MalformedArchive("buffer shorter than the magic".into()));
        }
        let magic = u32::from_be_bytes(data[0..4].try_into().unwrap());
        let encrypted = magic != ARCHIVE_MAGIC;

        let mut header_bytes = data
            .get(0..HEADER_SIZE)
            .ok_or_else(|| Error::MalformedArchive("buffer shorter than the header".into()))?
            .to_vec();
        if encrypted {
            cipher.decrypt_in_place(&mut header_bytes)?;
        }
        let header = ArchiveHeader::decode(&header_bytes)?;

        if header.toc_size < 0 || header.entry_count < 0 || header.toc_entry_size < 0 {
            return Err(Error::MalformedArchive("negative header field".into()));
        }

        let toc_region_end = HEADER_SIZE
            .checked_add(header.toc_size as usize)
            .ok_or_else(|| Error::MalformedArchive("TOC size overflow".into()))?;
        let mut toc_bytes = data
            .get(HEADER_SIZE..toc_region_end)
            .ok_or_else(|| Error::MalformedArchive("TOC region exceeds buffer".into()))?
            .to_vec();
        if encrypted {
            cipher.decrypt_in_place(&mut toc_bytes)?;
        }

        let entry_count = header.entry_count as usize;
        let toc_entry_size = header.toc_entry_size as usize;
        let records_end = entry_count
            .checked_mul(toc_entry_size)
            .ok_or_else(|| Error::MalformedArchive("TOC record table overflow".into()))?;
        if records_end > toc_bytes.len() {
            return Err(Error::MalformedArchive("TOC record table exceeds TOC region".into()));
        }

        let name_table = &toc_bytes[records_end..];
        let names: Vec<&str> = std::str::from_utf8(name_table)
            .map_err(|_| Error::MalformedArchive("name table is not valid UTF-8".into()))?
            .split('\0')
            .collect();
        if names.len() < entry_count {
            return Err(Error::MalformedArchive("fewer names than TOC entries".into()));
        }

        let mut entries = Vec::with_capacity(entry_count);
        for i in 0..entry_count {
            let record = &toc_bytes[i * toc_entry_size..(i + 1) * toc_entry_size];
            let toc = TocEntry::decode(record)?;

            let start = (toc.offset_block as usize)
                .checked_mul(BLOCK_SIZE)
                .ok_or_else(|| Error::MalformedArchive("entry offset overflow".into()))?;
            if toc.size < 0 {
                return Err(Error::MalformedArchive("entry has a negative size".into()));
            }
            let end = start
                .checked_add(toc.size as usize)
                .ok_or_else(|| Error::MalformedArchive("entry size overflow".into()))?;
            let payload = data
                .get(start..end)
                .ok_or_else(|| Error::MalformedArchive(format!("entry {i} payload out of bounds")))?;

            entries.push(ArchiveEntry {
                index: i,
                name: names[i].to_string(),
                toc,
                data: payload.to_vec(),
            });
        }

        Ok(Archive {
            header,
            entries,
            encrypted,
        })
    }

    /// Whether this archive was encrypted when loaded (and therefore
    /// will be re-encrypted by [`Archive::bytes`]).
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Entries in file order, matching the order they appear in the TOC.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Appends a new entry, defaulting its TOC fields, then sorts all
    /// entries by name, reassigns indices, and rebuilds the layout.
    pub fn add_entry(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let entry_size = self
            .entries
            .first()
            .map(|e| e.toc.entry_size)
            .unwrap_or(DEFAULT_TOC_ENTRY_SIZE);
        let toc = TocEntry::new(data.len() as i64, entry_size);
        self.entries.push(ArchiveEntry {
            index: self.entries.len(),
            name: name.into(),
            toc,
            data,
        });
        self.entries.sort_by(|a, b| a.name.cmp(&b.name));
        for (i, e) in self.entries.iter_mut().enumerate() {
            e.index = i;
        }
        self.rebuild();
    }

    /// Removes the entry at `index`, reassigns remaining indices, and
    /// rebuilds the layout.
    pub fn remove_entry(&mut self, index: usize) -> Result<ArchiveEntry> {
        if index >= self.entries.len() {
            return Err(Error::OutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        let removed = self.entries.remove(index);
        for (i, e) in self.entries.iter_mut().enumerate() {
            e.index = i;
        }
        self.rebuild();
        Ok(removed)
    }

    /// Recomputes `entryCount`, `tocSize`, and every entry's
    /// `offsetBlock`/`size`/`usedBlocks` from the current entry list, in
    /// file order, laid out back to back starting at the first
    /// block-aligned offset after the header and TOC region.
    fn rebuild(&mut self) {
        self.header.entry_count = self.entries.len() as i32;

        let name_table_len: usize = self.entries.iter().map(|e| e.name.len() + 1).sum();
        let toc_entry_size = self.header.toc_entry_size as usize;
        let toc_size = self.entries.len() * toc_entry_size + name_table_len;
        self.header.toc_size = toc_size as i32;

        let mut cur_block = first_data_block(toc_size);
        for entry in &mut self.entries {
            entry.toc.offset_block = cur_block as u32;
            entry.toc.size = entry.data.len() as i64;
            let used_blocks = div_ceil(entry.data.len(), BLOCK_SIZE);
            entry.toc.used_blocks = used_blocks as u16;
            cur_block += used_blocks;
        }
    }

    /// Serializes the archive back to bytes, re-running [`Archive::rebuild`]
    /// first so the layout reflects any pending edits.
    #[tracing::instrument(skip(self, cipher))]
    pub fn bytes(&mut self, cipher: &Cipher) -> Result<Vec<u8>> {
        self.rebuild();

        let mut header_bytes = self.header.encode().to_vec();
        if self.encrypted {
            cipher.encrypt_in_place(&mut header_bytes)?;
        }

        let mut toc_region = Vec::with_capacity(self.header.toc_size as usize);
        for entry in &self.entries {
            toc_region.extend_from_slice(&entry.toc.encode());
        }
        let name_table = self
            .entries
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>()
            .join("\0")
            + "\0";
        toc_region.extend_from_slice(name_table.as_bytes());
        if self.encrypted {
            cipher.encrypt_in_place(&mut toc_region)?;
        }

        let metadata_blocks = first_data_block(self.header.toc_size as usize);
        let mut metadata = vec![0u8; metadata_blocks * BLOCK_SIZE];
        if HEADER_SIZE + toc_region.len() > metadata.len() {
            return Err(Error::MalformedArchive(
                "TOC region does not fit before the first data block".into(),
            ));
        }
        metadata[0..HEADER_SIZE].copy_from_slice(&header_bytes);
        metadata[HEADER_SIZE..HEADER_SIZE + toc_region.len()].copy_from_slice(&toc_region);

        let mut out = metadata;
        for entry in &self.entries {
            let padded_len = entry.toc.used_blocks as usize * BLOCK_SIZE;
            let mut padded = vec![0u8; padded_len];
            padded[0..entry.data.len()].copy_from_slice(&entry.data);
            out.extend_from_slice(&padded);
        }
        Ok(out)
    }
}

fn first_data_block(toc_size: usize) -> usize {
    div_ceil(toc_size + HEADER_SIZE, BLOCK_SIZE)
}

fn div_ceil(numerator: usize, denominator: usize) -> usize {
    (numerator + denominator - 1) / denominator
}
