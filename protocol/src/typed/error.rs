//! Error types for typed-message construction and decoding.

use thiserror::Error;

use super::schema::IntentKind;

/// Errors raised while building, encoding or decoding a boosted intent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// A value does not fit the width its field declares.
    #[error("field `{field}` does not fit in {bits} bits")]
    Overflow {
        /// Wire name of the field.
        field: &'static str,
        /// Declared width.
        bits: usize,
    },

    /// A `bool` word holds something other than 0 or 1.
    #[error("field `{0}` is not a valid bool")]
    InvalidBool(&'static str),

    /// The leading tag names no known intent kind.
    #[error("unknown intent tag {0}")]
    UnknownTag(u8),

    /// The encoding's shape (dynamic prefix present or absent) disagrees
    /// with the kind its tag names.
    #[error("layout does not match a {0:?} intent")]
    LayoutMismatch(IntentKind),

    /// The head word of the `bytes` field does not point right after the
    /// static head.
    #[error("non-canonical dynamic offset: expected {expected}, got {got}")]
    BadDynamicOffset {
        /// The only offset a canonical encoder produces.
        expected: usize,
        /// The offset found in the input.
        got: String,
    },

    /// The `bytes` tail is not padded with zeros.
    #[error("non-zero padding after dynamic bytes")]
    DirtyPadding,

    /// The input ends before the layout does.
    #[error("truncated encoding: need {needed} bytes, have {actual}")]
    Truncated {
        /// Bytes the layout requires.
        needed: usize,
        /// Bytes available.
        actual: usize,
    },

    /// The input continues after the layout ends.
    #[error("trailing bytes: layout ends at {expected}, input is {actual} bytes")]
    TrailingBytes {
        /// Where the layout ends.
        expected: usize,
        /// Total input length.
        actual: usize,
    },
}
