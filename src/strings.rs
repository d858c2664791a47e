use crate::io::{BinaryReadable, BinaryWriteable, Source};
use bstr::{BStr, BString};
use std::io::{self, Write};

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("a string is too large to fit in a fixed-width field of {max} bytes")]
    TooLarge { max: usize },
}

impl From<Error> for io::Error {
    fn from(value: Error) -> Self {
        Self::new(io::ErrorKind::InvalidData, value)
    }
}

/// A fixed-width, NUL-padded ASCII field. Archive entry names and DEF group
/// frame names are both stored this way, just at different widths (16/40
/// bytes for archive entries depending on flavour, 13 bytes for DEF frame
/// names). Reading always consumes exactly `N` bytes; the result is
/// truncated at the first NUL.
pub(crate) struct FixedName<const N: usize>;

impl<const N: usize> BinaryReadable for FixedName<N> {
    type Item = BString;

    fn from_le_stream<'bytes, In>(stream: &mut In) -> io::Result<Self::Item>
    where
        In: ?Sized + Source<'bytes>,
    {
        let mut raw = [0u8; N];
        stream.read_into(&mut raw)?;
        let len = raw.iter().position(|&b| b == 0).unwrap_or(N);
        Ok(BString::from(&raw[..len]))
    }
}

impl<const N: usize> BinaryWriteable for FixedName<N> {
    type Item = BStr;

    fn to_le_stream<Out>(stream: &mut Out, item: &Self::Item) -> io::Result<()>
    where
        Out: ?Sized + Write,
    {
        if item.len() >= N {
            return Err(Error::TooLarge { max: N - 1 }.into());
        }

        let mut raw = [0u8; N];
        raw[..item.len()].copy_from_slice(item);
        stream.write_all(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::FixedName;
    use crate::io::{BorrowedSource, Endian, Sink, Source as _};
    use bstr::ByteSlice as _;

    #[test]
    fn reads_and_trims_at_first_nul() {
        let raw = b"icons.pcx\0\0\0\0\0\0\0";
        let mut source = BorrowedSource::from(&raw[..]);
        let name = source
            .read_protocol::<FixedName<16>>(Endian::Little)
            .unwrap();
        assert_eq!(name.as_bstr(), b"icons.pcx".as_bstr());
    }

    #[test]
    fn writes_padded_to_width() {
        let mut out = Vec::new();
        let mut sink = Sink::new(&mut out);
        sink.write_protocol::<FixedName<8>>(b"abc".as_bstr(), Endian::Little)
            .unwrap();
        assert_eq!(out, b"abc\0\0\0\0\0");
    }

    #[test]
    fn rejects_names_that_do_not_fit() {
        let mut out = Vec::new();
        let mut sink = Sink::new(&mut out);
        let err = sink.write_protocol::<FixedName<4>>(b"abcd".as_bstr(), Endian::Little);
        assert!(err.is_err());
    }
}
