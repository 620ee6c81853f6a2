//! Named constants for the archive and script wire formats.

/// Alignment unit for archive entry placement.
pub const BLOCK_SIZE: usize = 0x800;

/// Fixed size of the archive header.
pub const HEADER_SIZE: usize = 20;

/// Big-endian magic present at offset 0 of a plaintext archive.
pub const ARCHIVE_MAGIC: u32 = 0xA94E2A52;

/// Default on-disk width of a TOC record used when an archive has no
/// existing entries to infer it from.
pub const DEFAULT_TOC_ENTRY_SIZE: usize = 16;

/// Fixed-size header for plaintext/encrypted scripts; the compressed
/// variant appends a trailing `u32` and is 28 bytes.
pub const SCRIPT_HEADER_SIZE: usize = 24;
pub const SCRIPT_HEADER_SIZE_COMPRESSED: usize = 28;

pub const SCRIPT_MAGIC_PLAIN: u32 = 0x0D524353;
pub const SCRIPT_MAGIC_ENCRYPTED: u32 = 0x0E726373;
pub const SCRIPT_MAGIC_ENCRYPTED_COMPRESSED: u32 = 0x0E726353;

/// Candidate byte offsets into the host executable that may hold the
/// AES-256 key. Scanned in order by [`crate::cipher::find_key`].
pub const KEY_CANDIDATE_OFFSETS: &[usize] = &[
    0xA94204, 0xB607C4, 0xB56BC4, 0xB75C9C, 0xB7AEF4, 0xBE6540, 0xBE7540, 0xC95FD8, 0xC5B33C, 0xC5B73C,
];

/// SHA-1 digest the recovered 32-byte key must match.
pub const KEY_DIGEST: [u8; 20] = [
    0xDE, 0xA3, 0x75, 0xEF, 0x1E, 0x6E, 0xF2, 0x22, 0x3A, 0x12, 0x21, 0xC2, 0xC5, 0x75, 0xC4, 0x7B, 0xF1, 0x7E, 0xFA,
    0x5E,
];

/// Number of nested applications of the AES primitive per 16-byte block.
pub const CIPHER_ROUNDS: usize = 16;
