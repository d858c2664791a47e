//! The archive engine: flavour detection, index parsing, lazy entry
//! decompression, staged `add_entry`, and `rebuild`.
//!
//! One module parameterised over [`Flavour`] rather than one module per
//! game family, since all seven flavours share one directory shape up to
//! field widths and offsets.

mod entry;
mod format;
mod layout;

pub use entry::{ArchiveEntry, EntryKind};
pub use format::Archive;
pub use layout::Flavour;

use std::io;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unrecognized archive magic bytes")]
    UnknownFormat,

    #[error("archive directory is corrupt: {reason}")]
    CorruptIndex { reason: &'static str },

    #[error("entry {name:?} has an invalid offset/size: {reason}")]
    CorruptEntry { name: String, reason: &'static str },

    #[error("entry {name:?} decompressed to {actual} bytes, expected {expected}")]
    DecompressionMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("an entry named {0:?} already exists in this archive")]
    DuplicateName(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;

/// Matches a glob of the shape `*.ext` or a literal name, case-insensitively,
/// against `candidate`. Anything other than a leading `*.` is treated as a
/// literal match.
pub(crate) fn glob_matches(glob: &str, candidate: &bstr::BStr) -> bool {
    use bstr::ByteSlice as _;

    let glob = glob.as_bytes().to_ascii_lowercase();
    let candidate = candidate.to_ascii_lowercase();

    if let Some(ext) = glob.strip_prefix(b"*.") {
        match candidate.rfind_byte(b'.') {
            Some(dot) => candidate[dot + 1..] == *ext,
            None => false,
        }
    } else {
        candidate == glob
    }
}

#[cfg(test)]
mod tests {
    use super::glob_matches;
    use bstr::ByteSlice as _;

    #[test]
    fn extension_glob_is_case_insensitive() {
        assert!(glob_matches("*.DEF", b"Creature.def".as_bstr()));
        assert!(!glob_matches("*.bmp", b"creature.def".as_bstr()));
    }

    #[test]
    fn literal_glob_matches_whole_name() {
        assert!(glob_matches("Icon.pcx", b"ICON.PCX".as_bstr()));
        assert!(!glob_matches("Icon.pcx", b"Icon2.pcx".as_bstr()));
    }
}
