//! Minimal PCX/BMP pixel source: just enough to recover a palette plus an
//! indexed buffer, or a 24-bit RGB buffer. No writer, no depths beyond
//! 8-bit paletted and 24-bit RGB. Everything else is an external
//! collaborator's job.

mod bmp;
mod pcx;

pub use bmp::decode_bmp;
pub use pcx::decode_pcx;

use std::io;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("input ended before a complete image could be read")]
    Truncated,

    #[error("not a PCX file (bad identifier byte)")]
    NotPcx,

    #[error("not a BMP file (bad identifier bytes)")]
    NotBmp,

    #[error("unsupported pixel depth: {0} bits")]
    UnsupportedDepth(u16),

    #[error("unsupported BMP compression mode: {0}")]
    UnsupportedCompression(u32),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;

/// A 256-colour RGB palette, as recovered from a PCX trailer or a BMP
/// colour table.
pub type Palette = [(u8, u8, u8); 256];

/// The two decoded pixel shapes this module produces: indexed (8-bit
/// paletted, with the palette alongside) or truecolour (24-bit RGB, row
/// major, no padding).
pub enum DecodedImage {
    Indexed {
        width: u32,
        height: u32,
        palette: Box<Palette>,
        indices: Vec<u8>,
    },
    Rgb {
        width: u32,
        height: u32,
        rgb: Vec<u8>,
    },
}
