#![warn(
    clippy::pedantic,
    clippy::single_char_lifetime_names,
    clippy::std_instead_of_core
)]
#![allow(clippy::enum_glob_use, clippy::missing_errors_doc)]

mod compress;
mod containers;
mod derive;
mod io;
mod strings;
#[cfg(test)]
mod test_support;

pub mod archive;
pub mod compose;
pub mod def;
pub mod pixels;

pub use bstr::{BStr, BString};

/// Collects the outcome of a tolerant batch operation. The "per-entry and
/// per-DEF failures are logged and skipped" policy from the error handling
/// design becomes a value the caller inspects instead of a side channel to
/// a logger: this crate carries no logging dependency and never writes to
/// stdout/stderr itself.
#[derive(Debug)]
pub struct BatchReport<E, T = ()> {
    pub succeeded: Vec<T>,
    pub failed: Vec<(String, E)>,
}

impl<E, T> Default for BatchReport<E, T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<E, T> BatchReport<E, T> {
    pub(crate) fn push_ok(&mut self, item: T) {
        self.succeeded.push(item);
    }

    pub(crate) fn push_err(&mut self, name: impl Into<String>, error: E) {
        self.failed.push((name.into(), error));
    }

    #[must_use]
    pub fn is_fully_successful(&self) -> bool {
        self.failed.is_empty()
    }
}

pub mod prelude {
    pub use crate::BatchReport;
}
