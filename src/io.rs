use crate::containers::Bytes;
use core::{mem, ops::Range};
use std::io::{self, Write};

/// Byte order used when streaming a value. Every on-disk layout this crate
/// decodes is little-endian (see the crate Non-goals); callers always pass
/// `Endian::Little`, but the machinery stays generic so a stray big-endian
/// field never gets silently misread.
pub(crate) enum Endian {
    Little,
    #[allow(dead_code)]
    Big,
}

pub(crate) trait Source<'bytes> {
    fn as_bytes(&self) -> &[u8];

    fn read_bytes(&mut self, len: usize) -> io::Result<Bytes<'bytes>>;

    #[must_use]
    fn read_bytes_to_end(&mut self) -> Bytes<'bytes>;

    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<()>;

    fn seek_absolute(&mut self, pos: usize) -> io::Result<()>;

    #[must_use]
    fn stream_position(&self) -> usize;

    fn read<T>(&mut self, endian: Endian) -> io::Result<T>
    where
        T: BinaryReadable<Item = T>,
    {
        T::from_stream(self, endian)
    }

    fn read_protocol<T>(&mut self, endian: Endian) -> io::Result<T::Item>
    where
        T: BinaryReadable,
    {
        T::from_stream(self, endian)
    }

    fn save_restore_position<F, T>(&mut self, f: F) -> io::Result<T>
    where
        F: FnOnce(&mut Self) -> T,
    {
        let position = self.stream_position();
        let result = f(self);
        self.seek_absolute(position)?;
        Ok(result)
    }

    fn seek_relative(&mut self, offset: isize) -> io::Result<()> {
        if let Some(pos) = self.stream_position().checked_add_signed(offset) {
            self.seek_absolute(pos)
        } else {
            Err(io::ErrorKind::UnexpectedEof.into())
        }
    }
}

macro_rules! make_sourceable {
    ($this:ty, $bytes_lifetime:lifetime $(,$this_lifetime:lifetime)?) => {
        impl $(<$this_lifetime>)? Source<$bytes_lifetime> for $this {
            fn as_bytes(&self) -> &[u8] {
                &self.source[..]
            }

            fn read_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
                let len = buf.len();
                let start = self.pos;
                let stop = start + len;
                if stop > self.source.len() {
                    Err(io::ErrorKind::UnexpectedEof.into())
                } else {
                    self.pos += len;
                    buf.copy_from_slice(&self.source[start..stop]);
                    Ok(())
                }
            }

            fn read_bytes(&mut self, len: usize) -> io::Result<Bytes<$bytes_lifetime>> {
                let start = self.pos;
                let stop = start + len;
                if stop > self.source.len() {
                    Err(io::ErrorKind::UnexpectedEof.into())
                } else {
                    self.pos += len;
                    Ok(self.make_bytes(start..stop))
                }
            }

            fn read_bytes_to_end(&mut self) -> Bytes<$bytes_lifetime> {
                let len = self.source.len();
                let start = self.pos;
                self.pos = len;
                self.make_bytes(start..len)
            }

            fn seek_absolute(&mut self, pos: usize) -> io::Result<()> {
                if pos > self.source.len() {
                    Err(io::ErrorKind::UnexpectedEof.into())
                } else {
                    self.pos = pos;
                    Ok(())
                }
            }

            fn stream_position(&self) -> usize {
                self.pos
            }
        }
    };
}

pub(crate) struct BorrowedSource<'bytes> {
    source: &'bytes [u8],
    pos: usize,
}

impl<'bytes> BorrowedSource<'bytes> {
    #[must_use]
    fn make_bytes(&self, range: Range<usize>) -> Bytes<'bytes> {
        Bytes::from_borrowed(&self.source[range])
    }
}

impl<'bytes> From<&'bytes [u8]> for BorrowedSource<'bytes> {
    fn from(source: &'bytes [u8]) -> Self {
        Self { source, pos: 0 }
    }
}

make_sourceable!(BorrowedSource<'bytes>, 'bytes, 'bytes);

pub(crate) trait BinaryReadable {
    type Item;

    fn from_le_stream<'bytes, In>(stream: &mut In) -> io::Result<Self::Item>
    where
        In: ?Sized + Source<'bytes>;

    fn from_be_stream<'bytes, In>(stream: &mut In) -> io::Result<Self::Item>
    where
        In: ?Sized + Source<'bytes>,
    {
        Self::from_le_stream(stream)
    }

    fn from_stream<'bytes, In>(stream: &mut In, endian: Endian) -> io::Result<Self::Item>
    where
        In: ?Sized + Source<'bytes>,
    {
        match endian {
            Endian::Little => Self::from_le_stream(stream),
            Endian::Big => Self::from_be_stream(stream),
        }
    }
}

pub(crate) trait BinaryWriteable {
    type Item: ?Sized;

    fn to_le_stream<Out>(stream: &mut Out, item: &Self::Item) -> io::Result<()>
    where
        Out: ?Sized + Write;

    fn to_stream<Out>(stream: &mut Out, item: &Self::Item, endian: Endian) -> io::Result<()>
    where
        Out: ?Sized + Write,
    {
        match endian {
            Endian::Little | Endian::Big => Self::to_le_stream(stream, item),
        }
    }
}

macro_rules! make_binary_streamable {
    ($t:ty) => {
        impl BinaryReadable for $t {
            type Item = $t;

            fn from_le_stream<'bytes, In>(stream: &mut In) -> io::Result<Self::Item>
            where
                In: ?Sized + Source<'bytes>,
            {
                let mut bytes = [0u8; mem::size_of::<Self::Item>()];
                stream.read_into(&mut bytes)?;
                Ok(Self::from_le_bytes(bytes))
            }
        }

        impl BinaryWriteable for $t {
            type Item = $t;

            fn to_le_stream<Out>(stream: &mut Out, item: &Self::Item) -> io::Result<()>
            where
                Out: ?Sized + Write,
            {
                let bytes = item.to_le_bytes();
                stream.write_all(&bytes)
            }
        }
    };
}

make_binary_streamable!(u8);
make_binary_streamable!(u16);
make_binary_streamable!(u32);
make_binary_streamable!(u64);

make_binary_streamable!(i8);
make_binary_streamable!(i16);
make_binary_streamable!(i32);

macro_rules! make_binary_streamable_tuple {
    ($($idx:tt $t:ident),+) => {
        impl<$($t,)+> BinaryReadable for ($($t,)+)
        where
            $($t: BinaryReadable,)+
        {
            type Item = ($($t::Item,)+);

            fn from_le_stream<'bytes, In>(stream: &mut In) -> io::Result<Self::Item>
            where
                In: ?Sized + Source<'bytes>,
            {
                Ok(($(
                    $t::from_le_stream(stream)?,
                )+))
            }
        }
    };
}

make_binary_streamable_tuple!(0 T0, 1 T1);
make_binary_streamable_tuple!(0 T0, 1 T1, 2 T2);
make_binary_streamable_tuple!(0 T0, 1 T1, 2 T2, 3 T3);

pub(crate) struct Sink<'stream, Out>
where
    Out: Write,
{
    stream: &'stream mut Out,
}

impl<'stream, Out> Sink<'stream, Out>
where
    Out: Write,
{
    #[must_use]
    pub(crate) fn new(stream: &'stream mut Out) -> Self {
        Self { stream }
    }

    pub(crate) fn write<T>(&mut self, item: &T, endian: Endian) -> io::Result<()>
    where
        T: BinaryWriteable<Item = T>,
    {
        T::to_stream(&mut self.stream, item, endian)
    }

    pub(crate) fn write_protocol<T>(&mut self, item: &T::Item, endian: Endian) -> io::Result<()>
    where
        T: BinaryWriteable,
    {
        T::to_stream(&mut self.stream, item, endian)
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)
    }
}
