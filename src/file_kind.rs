//! File extension classification, used by a caller deciding whether to
//! hand a path to the archive or script codec.

/// The kind of file a path names, inferred from its extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileKind {
    /// A `.img` archive.
    Img,
    /// A `.rpf` archive (same container family as `.img`).
    Rpf,
    /// A `.sco` script entry.
    Sco,
    Unknown,
}

/// Classifies `path` by its extension. Case-sensitive, matching the
/// on-disk convention this format actually uses.
pub fn classify(path: &str) -> FileKind {
    if path.ends_with(".img") {
        FileKind::Img
    } else if path.ends_with(".rpf") {
        FileKind::Rpf
    } else if path.ends_with(".sco") {
        FileKind::Sco
    } else {
        FileKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_extensions() {
        assert_eq!(classify("vehicles.img"), FileKind::Img);
        assert_eq!(classify("data.rpf"), FileKind::Rpf);
        assert_eq!(classify("mission1.sco"), FileKind::Sco);
    }

    #[test]
    fn unknown_extension_falls_back() {
        assert_eq!(classify("readme.txt"), FileKind::Unknown);
        assert_eq!(classify("no_extension"), FileKind::Unknown);
    }
}
