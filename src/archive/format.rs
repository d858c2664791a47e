use super::entry::{ArchiveEntry, EntryKind, Key};
use super::layout::Flavour;
use super::{Error, Result};
use crate::compress;
use crate::containers::Blob;
use crate::io::{BorrowedSource, Endian, Source as _};
use crate::BatchReport;
use bstr::{BStr, BString, ByteSlice as _};
use std::collections::HashMap;
use std::io;

struct Staged {
    key: Key,
    bytes: Vec<u8>,
    want_compressed: bool,
}

/// An opened archive: flavour, the entries read from its directory, and any
/// entries staged via [`Archive::add_entry`] but not yet written out by
/// [`Archive::rebuild`]. Owns its backing buffer; every `ArchiveEntry`'s
/// payload is a sub-range of it, read lazily through [`Archive::open_entry`].
pub struct Archive<'a> {
    flavour: Flavour,
    data: Blob<'a>,
    entries: Vec<ArchiveEntry>,
    index: HashMap<Key, usize>,
    staged: Vec<Staged>,
}

struct Parsed {
    flavour: Flavour,
    entries: Vec<ArchiveEntry>,
    index: HashMap<Key, usize>,
}

/// Parses an archive directory out of `bytes`. Detection reads the first 4
/// magic bytes; the directory is read at the flavour's fixed offset and
/// every record is range-validated against `bytes.len()`. Shared by
/// [`Archive::read`] (borrowed bytes) and [`Archive::open`] (a
/// memory-mapped file). Both only need a `&[u8]` view to parse the
/// directory; what differs is how the payload bytes are retained.
fn parse(bytes: &[u8]) -> Result<Parsed> {
    let flavour = Flavour::detect(bytes).ok_or(Error::UnknownFormat)?;
    let layout = flavour.layout();

    let mut source = BorrowedSource::from(bytes);
    source.seek_absolute(layout.entry_count_offset)?;
    let entry_count = source.read::<u32>(Endian::Little)? as usize;

    source.seek_absolute(layout.directory_offset)?;
    let directory_end = layout
        .directory_offset
        .checked_add(entry_count * layout.record_width)
        .ok_or(Error::CorruptIndex {
            reason: "entry count overflows the directory region",
        })?;
    if directory_end > bytes.len() {
        return Err(Error::CorruptIndex {
            reason: "directory extends past end of file",
        });
    }

    let mut entries = Vec::with_capacity(entry_count);
    let mut index = HashMap::with_capacity(entry_count);

    for _ in 0..entry_count {
        let raw_name = source.read_bytes(layout.name_width)?;
        let name = trim_nul(raw_name.as_bytes());
        let offset = source.read::<u32>(Endian::Little)?;

        let (unpacked_size, flags, packed_size) = if layout.compressible {
            let unpacked_size = source.read::<u32>(Endian::Little)?;
            let flags = source.read::<u32>(Endian::Little)?;
            let packed_size = source.read::<u32>(Endian::Little)?;
            let packed_size = if packed_size == 0 { unpacked_size } else { packed_size };
            (unpacked_size, flags, packed_size)
        } else {
            let size = source.read::<u32>(Endian::Little)?;
            (size, 0, size)
        };

        let name = BString::from(name);
        let start = offset as usize;
        let end = start.checked_add(packed_size as usize).ok_or(Error::CorruptEntry {
            name: name.to_string(),
            reason: "offset + packed_size overflows",
        })?;
        if start < directory_end || end > bytes.len() {
            return Err(Error::CorruptEntry {
                name: name.to_string(),
                reason: "offset/size out of range for this archive",
            });
        }

        let key = Key::from(name.clone());
        if index.contains_key(&key) {
            return Err(Error::CorruptIndex {
                reason: "duplicate entry name in directory",
            });
        }

        let kind = EntryKind::guess(name.as_bstr());
        index.insert(key.clone(), entries.len());
        entries.push(ArchiveEntry {
            key,
            offset,
            packed_size,
            unpacked_size,
            flags,
            kind,
        });
    }

    Ok(Parsed { flavour, entries, index })
}

impl<'a> Archive<'a> {
    /// Parses an archive directory out of an in-memory or borrowed buffer.
    pub fn read(bytes: &'a [u8]) -> Result<Self> {
        let Parsed { flavour, entries, index } = parse(bytes)?;
        Ok(Self {
            flavour,
            data: Blob::from(bytes),
            entries,
            index,
            staged: Vec::new(),
        })
    }

    /// Memory-maps `path` and parses its directory, returning an archive
    /// that owns the mapping rather than borrowing from a caller-held
    /// buffer, the large-archive counterpart to [`Archive::read`].
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Archive<'static>> {
        let file = std::fs::File::open(path).map_err(Error::Io)?;
        let mmap = std::sync::Arc::new(unsafe { memmap2::Mmap::map(&file) }.map_err(Error::Io)?);
        let Parsed { flavour, entries, index } = parse(&mmap)?;
        Ok(Archive {
            flavour,
            data: Blob {
                bytes: crate::containers::Bytes::from_mapped(0, mmap.len(), mmap),
            },
            entries,
            index,
            staged: Vec::new(),
        })
    }

    #[must_use]
    pub fn flavour(&self) -> Flavour {
        self.flavour
    }

    #[must_use]
    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter()
    }

    /// Returns `None` if no entry (parsed or staged) has this name;
    /// otherwise the bytes (decompressed if necessary) or the failure that
    /// prevented that.
    #[must_use]
    pub fn open_entry(&self, name: &str) -> Option<Result<Vec<u8>>> {
        let key = Key::from(name);

        if let Some(&idx) = self.index.get(&key) {
            let entry = &self.entries[idx];
            let start = entry.offset as usize;
            let end = start + entry.packed_size as usize;
            let packed = &self.data.as_bytes()[start..end];

            return Some(if entry.is_compressed() {
                compress::decompress(packed, entry.unpacked_size as usize).map_err(|err| {
                    let actual = match err {
                        compress::Error::LengthMismatch { actual, .. } => actual,
                        _ => 0,
                    };
                    Error::DecompressionMismatch {
                        name: entry.name().to_string(),
                        expected: entry.unpacked_size as usize,
                        actual,
                    }
                })
            } else {
                Ok(packed.to_vec())
            });
        }

        self.staged
            .iter()
            .find(|s| s.key == key)
            .map(|s| Ok(s.bytes.clone()))
    }

    /// Stages a new entry. Rejects a name already present (parsed or
    /// staged), case-insensitively. Nothing is written until [`rebuild`].
    ///
    /// [`rebuild`]: Archive::rebuild
    pub fn add_entry(&mut self, name: &str, bytes: Vec<u8>, compress: bool) -> Result<()> {
        let key = Key::from(name);
        if self.index.contains_key(&key) || self.staged.iter().any(|s| s.key == key) {
            return Err(Error::DuplicateName(name.to_string()));
        }

        self.staged.push(Staged {
            key,
            bytes,
            want_compressed: compress,
        });
        Ok(())
    }

    /// Serialises a fresh archive: header bytes (preserved verbatim up to
    /// the directory) with the entry count patched, directory, then
    /// payload, in insertion order. Never tolerant: any failure aborts and
    /// no partial output is returned.
    pub fn rebuild(&self) -> Result<Vec<u8>> {
        let layout = self.flavour.layout();
        let header = &self.data.as_bytes()[..layout.directory_offset];

        struct Resolved<'e> {
            name: &'e BStr,
            bytes: Vec<u8>,
            flags: u32,
            compress: bool,
        }

        let mut resolved = Vec::with_capacity(self.entries.len() + self.staged.len());
        for entry in &self.entries {
            let bytes = self.open_entry(entry.name().to_string().as_str()).expect("entry indexed")?;
            resolved.push(Resolved {
                name: entry.name(),
                bytes,
                flags: entry.flags,
                compress: entry.is_compressed(),
            });
        }
        for staged in &self.staged {
            resolved.push(Resolved {
                name: staged.key.as_str(),
                bytes: staged.bytes.clone(),
                flags: 0,
                compress: staged.want_compressed,
            });
        }

        let entry_count = resolved.len() as u32;
        let directory_size = resolved.len() * layout.record_width;
        let payload_start = layout.directory_offset + directory_size;

        let mut out = Vec::with_capacity(payload_start + resolved.iter().map(|r| r.bytes.len()).sum::<usize>());
        out.extend_from_slice(header);
        out[layout.entry_count_offset..layout.entry_count_offset + 4]
            .copy_from_slice(&entry_count.to_le_bytes());

        let mut payload = Vec::new();
        let mut directory = Vec::with_capacity(directory_size);

        for r in &resolved {
            let packed = if layout.compressible && r.compress {
                compress::compress(&r.bytes)
            } else {
                None
            };
            let (stored, packed_size) = match packed {
                Some(packed) if packed.len() < r.bytes.len() => {
                    let len = packed.len();
                    (packed, len)
                }
                _ => (r.bytes.clone(), r.bytes.len()),
            };

            write_name(&mut directory, r.name, layout.name_width)?;
            let offset = (payload_start + payload.len()) as u32;
            directory.extend_from_slice(&offset.to_le_bytes());
            if layout.compressible {
                directory.extend_from_slice(&(r.bytes.len() as u32).to_le_bytes());
                directory.extend_from_slice(&r.flags.to_le_bytes());
                directory.extend_from_slice(&(packed_size as u32).to_le_bytes());
            } else {
                directory.extend_from_slice(&(r.bytes.len() as u32).to_le_bytes());
            }

            payload.extend_from_slice(&stored);
        }

        out.extend_from_slice(&directory);
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Tolerant batch extraction: every entry matching `glob` (or every
    /// entry, if `glob` is `None`) is opened and handed to `sink`; failures
    /// are collected rather than aborting the batch.
    pub fn extract_filtered(
        &self,
        glob: Option<&str>,
        mut sink: impl FnMut(&ArchiveEntry, &[u8]) -> io::Result<()>,
    ) -> BatchReport<Error> {
        let mut report = BatchReport::default();

        for entry in &self.entries {
            if let Some(glob) = glob {
                if !super::glob_matches(glob, entry.name()) {
                    continue;
                }
            }

            let name = entry.name().to_string();
            match self.open_entry(&name) {
                Some(Ok(bytes)) => match sink(entry, &bytes) {
                    Ok(()) => report.push_ok(()),
                    Err(e) => report.push_err(name, Error::Io(e)),
                },
                Some(Err(e)) => report.push_err(name, e),
                None => unreachable!("entry came from self.entries"),
            }
        }

        report
    }
}

fn trim_nul(raw: &[u8]) -> &[u8] {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    &raw[..len]
}

fn write_name(out: &mut Vec<u8>, name: &BStr, width: usize) -> Result<()> {
    if name.len() >= width {
        return Err(Error::CorruptEntry {
            name: name.to_string(),
            reason: "name too long for this flavour's directory record",
        });
    }
    let start = out.len();
    out.resize(start + width, 0);
    out[start..start + name.len()].copy_from_slice(name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Archive;

    fn sample_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let directory_offset = 288usize;
        let record_width = 32usize;
        let mut out = vec![0u8; directory_offset];
        out[0..4].copy_from_slice(b"LOD\0");
        out[92..96].copy_from_slice(&(entries.len() as u32).to_le_bytes());

        let mut directory = Vec::new();
        let mut payload = Vec::new();
        for (name, bytes) in entries {
            let mut record = vec![0u8; record_width];
            record[..name.len()].copy_from_slice(name.as_bytes());
            let offset = (directory_offset + entries.len() * record_width + payload.len()) as u32;
            record[16..20].copy_from_slice(&offset.to_le_bytes());
            record[20..24].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
            record[24..28].copy_from_slice(&0u32.to_le_bytes());
            record[28..32].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
            directory.extend_from_slice(&record);
            payload.extend_from_slice(bytes);
        }

        out.extend_from_slice(&directory);
        out.extend_from_slice(&payload);
        out
    }

    #[test]
    fn lists_all_three_entries() {
        let bytes = sample_archive(&[("a.pcx", b"1"), ("b.bmp", b"22"), ("c.def", b"333")]);
        let archive = Archive::read(&bytes).unwrap();
        let names: Vec<_> = archive.entries().map(|e| e.name().to_string()).collect();
        assert_eq!(names, vec!["a.pcx", "b.bmp", "c.def"]);
    }

    #[test]
    fn extracts_with_extension_filter() {
        let bytes = sample_archive(&[("a.pcx", b"1"), ("b.bmp", b"22"), ("c.def", b"333")]);
        let archive = Archive::read(&bytes).unwrap();

        let mut written = Vec::new();
        let report = archive.extract_filtered(Some("*.def"), |entry, data| {
            written.push((entry.name().to_string(), data.to_vec()));
            Ok(())
        });

        assert_eq!(written, vec![("c.def".to_string(), b"333".to_vec())]);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn add_then_rebuild_round_trips() {
        let bytes = sample_archive(&[("a.pcx", b"1"), ("b.bmp", b"22"), ("c.def", b"333")]);
        let mut archive = Archive::read(&bytes).unwrap();
        archive
            .add_entry("new.bmp", vec![0xABu8; 1024], false)
            .unwrap();

        let rebuilt = archive.rebuild().unwrap();
        let reparsed = Archive::read(&rebuilt).unwrap();
        assert_eq!(reparsed.entries().count(), 4);

        let extracted = reparsed.open_entry("new.bmp").unwrap().unwrap();
        assert_eq!(extracted, vec![0xABu8; 1024]);
    }

    #[test]
    fn rejects_duplicate_names() {
        let bytes = sample_archive(&[("a.pcx", b"1")]);
        let mut archive = Archive::read(&bytes).unwrap();
        assert!(archive.add_entry("A.PCX", vec![1, 2, 3], false).is_err());
    }

    #[test]
    fn unknown_magic_is_rejected() {
        let bytes = vec![0u8; 400];
        assert!(Archive::read(&bytes).is_err());
    }

    #[test]
    fn rebuild_round_trips_through_anyhow_helper() -> anyhow::Result<()> {
        use crate::test_support::roundtrip;

        let names = roundtrip(
            "archive rebuild",
            || Ok(sample_archive(&[("a.pcx", b"1"), ("b.bmp", b"22")])),
            |bytes| {
                let archive = Archive::read(bytes)?;
                let rebuilt = archive.rebuild()?;
                let reparsed = Archive::read(&rebuilt)?;
                Ok(reparsed.entries().map(|e| e.name().to_string()).collect::<Vec<_>>())
            },
        )?;

        assert_eq!(names, vec!["a.pcx", "b.bmp"]);
        Ok(())
    }
}
