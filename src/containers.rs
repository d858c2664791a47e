use memmap2::Mmap;
use std::sync::Arc;

mod detail {
    use memmap2::Mmap;
    use std::sync::Arc;

    pub enum Bytes<'a> {
        Owned(Vec<u8>),
        Borrowed(&'a [u8]),
        Mapped {
            offset: usize,
            len: usize,
            mmap: Arc<Mmap>,
        },
    }
}

use detail::Bytes::*;

/// The raw byte storage behind a `Source`: either borrowed from the caller,
/// owned (e.g. after decompression), or a window into a shared memory
/// mapping. This is what lets the archive engine treat a `Vec<u8>` and a
/// memory-mapped archive file uniformly.
pub(crate) struct Bytes<'a> {
    bytes: detail::Bytes<'a>,
}

impl<'a> Bytes<'a> {
    #[must_use]
    pub(crate) fn as_bytes(&self) -> &[u8] {
        match &self.bytes {
            Owned(x) => x,
            Borrowed(x) => x,
            Mapped { offset, len, mmap } => &mmap[*offset..*offset + *len],
        }
    }

    #[must_use]
    pub(crate) fn from_borrowed(bytes: &'a [u8]) -> Self {
        Self {
            bytes: Borrowed(bytes),
        }
    }

    #[must_use]
    pub(crate) fn from_owned(bytes: Vec<u8>) -> Self {
        Self { bytes: Owned(bytes) }
    }

    #[must_use]
    pub(crate) fn from_mapped(offset: usize, len: usize, mmap: Arc<Mmap>) -> Bytes<'static> {
        Bytes {
            bytes: Mapped { offset, len, mmap },
        }
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    #[must_use]
    pub(crate) fn into_owned(self) -> Bytes<'static> {
        Bytes {
            bytes: match self.bytes {
                Owned(x) => Owned(x),
                Borrowed(x) => Owned(x.to_owned()),
                Mapped { offset, len, mmap } => Mapped { offset, len, mmap },
            },
        }
    }
}

impl<'a> Default for Bytes<'a> {
    fn default() -> Self {
        Self {
            bytes: Owned(Vec::new()),
        }
    }
}

/// Owned or borrowed payload handed back to callers by the archive engine
/// and the DEF/pixel decoders: a thin, cheaply-clonable handle over
/// `Bytes`.
#[derive(Default)]
pub struct Blob<'a> {
    pub(crate) bytes: Bytes<'a>,
}

crate::derive::container_wrapper!(Blob);

impl<'a> From<&'a [u8]> for Blob<'a> {
    fn from(value: &'a [u8]) -> Self {
        Self {
            bytes: Bytes::from_borrowed(value),
        }
    }
}

impl From<Vec<u8>> for Blob<'static> {
    fn from(value: Vec<u8>) -> Self {
        Self {
            bytes: Bytes::from_owned(value),
        }
    }
}
