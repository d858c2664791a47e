//! The DEF sprite/animation decoder and encoder: header, 256-colour
//! palette, per-group frame tables, and per-frame compressed pixel blocks
//! in four encoding modes.

mod decode;
mod encode;

pub use encode::{encode_def, EncodeGroup, EncodedFrame};

use crate::containers::Blob;
use crate::io::{BorrowedSource, Endian, Source as _};
use crate::strings::FixedName;
use crate::BatchReport;
use bstr::BString;
use std::collections::HashMap;
use std::io;

const HEADER_LEN: usize = 16;
const PALETTE_LEN: usize = 768;
const GROUP_RECORD_LEN: usize = 16;
const FRAME_NAME_WIDTH: usize = 13;
const FRAME_HEADER_LEN: usize = 32;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("DEF header, group table, or frame offsets are invalid: {reason}")]
    InvalidDef { reason: &'static str },

    #[error("frame pixel stream under/overran its row: {reason}")]
    InvalidPixelStream { reason: &'static str },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Clone, Copy, Debug)]
pub struct DefHeader {
    pub def_type: u32,
    pub full_width: u32,
    pub full_height: u32,
    pub group_count: u32,
}

pub type DefPalette = [(u8, u8, u8); 256];

/// One group's metadata: the decoded name/offset table. Frame bodies are
/// decoded lazily through [`Def::decode_frame`].
#[derive(Clone, Debug)]
pub struct DefGroup {
    pub group_index: u32,
    pub unknown1: u32,
    pub unknown2: u32,
    pub frame_names: Vec<BString>,
    pub frame_offsets: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct DefFrame {
    pub size_on_disk: u32,
    pub encoding: u32,
    pub full_width: u32,
    pub full_height: u32,
    pub width: u32,
    pub height: u32,
    pub left: i32,
    pub top: i32,
    pub pixels: Box<[u8]>,
}

/// A decoded DEF: header and group tables are read eagerly; frame pixel
/// bodies are decoded lazily on first request and cached by on-disk
/// offset, so frames sharing an offset (duplicate names) share one decode.
pub struct Def<'a> {
    data: Blob<'a>,
    header: DefHeader,
    palette: DefPalette,
    groups: Vec<DefGroup>,
    cache: HashMap<u32, DefFrame>,
}

impl<'a> Def<'a> {
    pub fn read(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN + PALETTE_LEN {
            return Err(Error::InvalidDef {
                reason: "file shorter than header + palette",
            });
        }

        let mut source = BorrowedSource::from(bytes);
        let def_type = source.read::<u32>(Endian::Little)?;
        let full_width = source.read::<u32>(Endian::Little)?;
        let full_height = source.read::<u32>(Endian::Little)?;
        let group_count = source.read::<u32>(Endian::Little)?;

        let mut palette: DefPalette = [(0, 0, 0); 256];
        for entry in &mut palette {
            let r = source.read::<u8>(Endian::Little)?;
            let g = source.read::<u8>(Endian::Little)?;
            let b = source.read::<u8>(Endian::Little)?;
            *entry = (r, g, b);
        }

        let mut groups = Vec::with_capacity(group_count as usize);
        for _ in 0..group_count {
            let group_index = source.read::<u32>(Endian::Little)?;
            let frame_count = source.read::<u32>(Endian::Little)?;
            let unknown1 = source.read::<u32>(Endian::Little)?;
            let unknown2 = source.read::<u32>(Endian::Little)?;

            let mut frame_names = Vec::with_capacity(frame_count as usize);
            for _ in 0..frame_count {
                frame_names.push(source.read_protocol::<FixedName<FRAME_NAME_WIDTH>>(Endian::Little)?);
            }

            let mut frame_offsets = Vec::with_capacity(frame_count as usize);
            for _ in 0..frame_count {
                frame_offsets.push(source.read::<u32>(Endian::Little)?);
            }

            if frame_offsets.len() != frame_names.len() {
                return Err(Error::InvalidDef {
                    reason: "frame_offsets.len() != frame_names.len()",
                });
            }
            for &offset in &frame_offsets {
                if (offset as usize) + FRAME_HEADER_LEN > bytes.len() {
                    return Err(Error::InvalidDef {
                        reason: "frame offset out of range",
                    });
                }
            }

            groups.push(DefGroup {
                group_index,
                unknown1,
                unknown2,
                frame_names,
                frame_offsets,
            });
        }

        Ok(Self {
            data: Blob::from(bytes),
            header: DefHeader {
                def_type,
                full_width,
                full_height,
                group_count,
            },
            palette,
            groups,
            cache: HashMap::new(),
        })
    }

    #[must_use]
    pub fn header(&self) -> DefHeader {
        self.header
    }

    #[must_use]
    pub fn palette(&self) -> &DefPalette {
        &self.palette
    }

    #[must_use]
    pub fn groups(&self) -> &[DefGroup] {
        &self.groups
    }

    /// Decodes (and caches) the frame at `(group_index, frame_index)`.
    pub fn decode_frame(&mut self, group_index: usize, frame_index: usize) -> Result<&DefFrame> {
        let offset = *self
            .groups
            .get(group_index)
            .and_then(|g| g.frame_offsets.get(frame_index))
            .ok_or(Error::InvalidDef {
                reason: "group or frame index out of range",
            })?;

        if !self.cache.contains_key(&offset) {
            let frame = decode::decode_frame_at(self.data.as_bytes(), offset as usize)?;
            self.cache.insert(offset, frame);
        }
        Ok(self.cache.get(&offset).expect("just inserted"))
    }

    /// Eagerly decodes every frame in every group, collecting failures
    /// rather than aborting (used by `testdef`-shaped callers).
    pub fn decode_all_frames(&mut self) -> BatchReport<Error, (usize, usize)> {
        let mut report = BatchReport::default();
        let indices: Vec<(usize, usize)> = self
            .groups
            .iter()
            .enumerate()
            .flat_map(|(g, group)| (0..group.frame_names.len()).map(move |f| (g, f)))
            .collect();

        for (g, f) in indices {
            match self.decode_frame(g, f) {
                Ok(_) => report.push_ok((g, f)),
                Err(e) => report.push_err(format!("group {g} frame {f}"), e),
            }
        }
        report
    }
}
