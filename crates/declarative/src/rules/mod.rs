//! Built-in rules
//!
//! Leaf rules are thin: each one is a check and an ensure expressed in
//! terms of [`Target`](crate::Target) operations. [`Multi`] composes
//! them into a tree.

pub mod apt;
pub mod cmd;
pub mod file;
pub mod meta;
pub mod multi;

pub use cmd::Cmd;
pub use meta::Meta;
pub use multi::Multi;

use std::borrow::Cow;

/// Quote a word for a POSIX shell
pub(crate) fn quote(word: &str) -> Cow<'_, str> {
    shell_escape::unix::escape(Cow::Borrowed(word))
}
