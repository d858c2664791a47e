/// Generates the common read-only accessors (`as_bytes`, `len`, `is_empty`,
/// `into_owned`, `new`) for a `struct Foo<'a> { bytes: Bytes<'a> }`-shaped
/// wrapper.
macro_rules! container_wrapper {
    ($this:ident) => {
        impl<'a> $this<'a> {
            #[must_use]
            pub fn as_bytes(&self) -> &[u8] {
                self.bytes.as_bytes()
            }

            #[must_use]
            pub fn into_owned(self) -> $this<'static> {
                $this {
                    bytes: self.bytes.into_owned(),
                }
            }

            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.bytes.is_empty()
            }

            #[must_use]
            pub fn len(&self) -> usize {
                self.bytes.len()
            }

            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }
        }
    };
}

pub(crate) use container_wrapper;

/// Generates an ASCII, case-insensitive `Eq`/`Ord`/`Hash` newtype around a
/// normalized `BString` name, used to key archive entries and DEF group
/// frames by name.
macro_rules! ascii_key {
    ($this:ident) => {
        #[derive(Clone, Debug, Default)]
        pub struct $this {
            normalized: bstr::BString,
            pub(crate) original: bstr::BString,
        }

        impl $this {
            #[must_use]
            pub fn as_str(&self) -> &bstr::BStr {
                use bstr::ByteSlice as _;
                self.original.as_bstr()
            }
        }

        impl<T> From<T> for $this
        where
            T: Into<bstr::BString>,
        {
            fn from(value: T) -> Self {
                let original: bstr::BString = value.into();
                let normalized = original.to_ascii_lowercase().into();
                Self {
                    normalized,
                    original,
                }
            }
        }

        impl PartialEq for $this {
            fn eq(&self, other: &Self) -> bool {
                self.normalized == other.normalized
            }
        }

        impl Eq for $this {}

        impl PartialOrd for $this {
            fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $this {
            fn cmp(&self, other: &Self) -> core::cmp::Ordering {
                self.normalized.cmp(&other.normalized)
            }
        }

        impl core::hash::Hash for $this {
            fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
                self.normalized.hash(state);
            }
        }
    };
}

pub(crate) use ascii_key;
