//! Shared test-only helpers. Not compiled into the published crate.

#![cfg(test)]

use anyhow::Context as _;

/// Builds a byte buffer, then reads it back through `read_back`, wrapping
/// each stage in [`anyhow::Context`] so a failing test names which side of
/// the round trip broke. Shared by the archive and DEF test modules, which
/// both round-trip a built byte buffer through a parser.
pub(crate) fn roundtrip<T>(
    label: &str,
    build: impl FnOnce() -> anyhow::Result<Vec<u8>>,
    read_back: impl FnOnce(&[u8]) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let bytes = build().with_context(|| format!("{label}: building fixture"))?;
    read_back(&bytes).with_context(|| format!("{label}: reading back"))
}
