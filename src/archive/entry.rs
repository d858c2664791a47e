use crate::derive::ascii_key;

ascii_key!(Key);

/// Coarse classification inferred from an entry's file extension at insert
/// time. Decoding never branches on this field; callers reach for `def`,
/// `pixels::decode_pcx`, or `pixels::decode_bmp` explicitly; `entry_kind` is
/// carried opaquely and exists only for `list`-style reporting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EntryKind {
    #[default]
    Generic,
    Image,
    Sound,
    Video,
    Text,
}

impl EntryKind {
    #[must_use]
    pub(crate) fn guess(name: &bstr::BStr) -> Self {
        use bstr::ByteSlice as _;

        let ext = name
            .rfind_byte(b'.')
            .map(|dot| name[dot + 1..].to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_slice() {
            b"pcx" | b"bmp" | b"def" => EntryKind::Image,
            b"snd" | b"wav" => EntryKind::Sound,
            b"vid" | b"smk" | b"bik" => EntryKind::Video,
            b"txt" | b"lwd" => EntryKind::Text,
            _ => EntryKind::Generic,
        }
    }
}

/// One directory record. `offset`/`packed_size`/`unpacked_size` are
/// validated against the archive length at parse time; by the time an
/// `ArchiveEntry` exists, `offset + packed_size <= archive_length` already
/// holds.
#[derive(Clone, Debug)]
pub struct ArchiveEntry {
    pub(crate) key: Key,
    pub(crate) offset: u32,
    pub(crate) packed_size: u32,
    pub(crate) unpacked_size: u32,
    pub(crate) flags: u32,
    pub(crate) kind: EntryKind,
}

impl ArchiveEntry {
    #[must_use]
    pub fn name(&self) -> &bstr::BStr {
        self.key.as_str()
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub fn packed_size(&self) -> u32 {
        self.packed_size
    }

    #[must_use]
    pub fn unpacked_size(&self) -> u32 {
        self.unpacked_size
    }

    #[must_use]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    #[must_use]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.packed_size != self.unpacked_size
    }
}

#[cfg(test)]
mod tests {
    use super::EntryKind;
    use bstr::ByteSlice as _;

    #[test]
    fn guesses_kind_from_extension_case_insensitively() {
        assert_eq!(EntryKind::guess(b"Hero.DEF".as_bstr()), EntryKind::Image);
        assert_eq!(EntryKind::guess(b"battle.WAV".as_bstr()), EntryKind::Sound);
        assert_eq!(EntryKind::guess(b"intro.smk".as_bstr()), EntryKind::Video);
        assert_eq!(EntryKind::guess(b"readme".as_bstr()), EntryKind::Generic);
    }
}
