//! Error variants shared by every layer of this crate.

use thiserror::Error;

/// The result type returned by every fallible operation in this crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Every way a load, encode, or edit operation in this crate can fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// None of the candidate offsets in the host executable produced a key
    /// whose SHA-1 matches the expected digest.
    #[error("no candidate offset in the host executable produced a valid AES key")]
    KeyNotFound,

    /// A cipher operation was attempted before [`crate::cipher::find_key`]
    /// succeeded.
    #[error("AES key has not been recovered yet")]
    KeyUnset,

    /// The archive's header, TOC, or an entry's payload bounds are
    /// inconsistent with the buffer supplied to `Archive::load`.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// The script header or one of its code/locals/globals segments is
    /// inconsistent with the buffer supplied to `Script::load`.
    #[error("malformed script: {0}")]
    MalformedScript(String),

    /// The script uses a format feature this crate does not implement
    /// (currently: the compressed script variant).
    #[error("unsupported script feature: {0}")]
    Unsupported(String),

    /// An edit operation's index argument was outside `0..=len` (insert)
    /// or `0..len` (remove/edit/duplicate/move).
    #[error("index {index} out of range (length {len})")]
    OutOfRange { index: usize, len: usize },

    /// `insert`/`edit` was called with no instruction to insert.
    #[error("attempted to insert or assign a null instruction")]
    NullInstruction,
}
