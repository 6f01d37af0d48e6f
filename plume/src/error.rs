//! Error types for record decoding.

/// Specific error kinds for decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeErrorKind {
    /// The cursor does not point at the start of the value the caller expected
    #[error("not at beginning of value")]
    NotAtBeginningOfValue,

    /// Input ran out before the current value was complete
    #[error("unexpected end of input {context}")]
    UnexpectedEndOfInput {
        /// What was being read when input ran out
        context: &'static str,
    },

    /// A literal such as `null` or `true` did not match byte for byte
    #[error("invalid character {found:?} {context}")]
    InvalidCharacter {
        /// The byte that was found, as a char
        found: char,
        /// What was being read
        context: &'static str,
    },

    /// An object key was not followed by `:`
    #[error("expected colon after object key")]
    ExpectedColonAfterKey,

    /// An object member or array element was not followed by `,` or a closing delimiter
    #[error("expected comma after element")]
    ExpectedCommaAfterElement,

    /// Nothing resembling a value followed `:`
    #[error("expected value after colon")]
    ExpectedValueAfterColon,

    /// Strict mode only: a key resolved to no field of the record
    #[error("unknown field `{field}`{}", did_you_mean(.suggestion))]
    UnknownField {
        /// The key as it appeared on the wire, unescaped
        field: String,
        /// The closest known key, if one is similar enough
        suggestion: Option<&'static str>,
    },

    /// A number was malformed or out of range for its target type
    #[error("invalid number `{literal}` for {target}")]
    InvalidNumber {
        /// The literal text as it appeared in the input
        literal: String,
        /// The target type name
        target: &'static str,
    },

    /// A string contained an invalid escape or invalid UTF-8
    #[error("invalid string: {reason}")]
    InvalidString {
        /// What was wrong with it
        reason: &'static str,
    },

    /// Objects and arrays nested deeper than [`MAX_DEPTH`](crate::MAX_DEPTH)
    #[error("nesting exceeds {} levels", crate::MAX_DEPTH)]
    ExceededMaxDepth,

    /// Non-whitespace input followed the decoded value
    #[error("trailing characters after value")]
    TrailingCharacters,

    /// The underlying reader failed
    #[error("I/O error: {0}")]
    Io(String),
}

fn did_you_mean(suggestion: &Option<&'static str>) -> String {
    match suggestion {
        Some(known) => format!(" (did you mean `{known}`?)"),
        None => String::new(),
    }
}

impl DecodeErrorKind {
    /// Get an error code for this kind of error.
    pub const fn code(&self) -> &'static str {
        match self {
            DecodeErrorKind::NotAtBeginningOfValue => "plume::not_at_beginning_of_value",
            DecodeErrorKind::UnexpectedEndOfInput { .. } => "plume::unexpected_end_of_input",
            DecodeErrorKind::InvalidCharacter { .. } => "plume::invalid_character",
            DecodeErrorKind::ExpectedColonAfterKey => "plume::expected_colon_after_key",
            DecodeErrorKind::ExpectedCommaAfterElement => "plume::expected_comma_after_element",
            DecodeErrorKind::ExpectedValueAfterColon => "plume::expected_value_after_colon",
            DecodeErrorKind::UnknownField { .. } => "plume::unknown_field",
            DecodeErrorKind::InvalidNumber { .. } => "plume::invalid_number",
            DecodeErrorKind::InvalidString { .. } => "plume::invalid_string",
            DecodeErrorKind::ExceededMaxDepth => "plume::exceeded_max_depth",
            DecodeErrorKind::TrailingCharacters => "plume::trailing_characters",
            DecodeErrorKind::Io(_) => "plume::io",
        }
    }
}

/// Error type for decoding, carrying the absolute byte offset it occurred at.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at offset {offset}")]
pub struct DecodeError {
    /// The specific kind of error
    pub kind: DecodeErrorKind,
    /// Byte offset into the input where the error occurred
    pub offset: usize,
}

impl DecodeError {
    /// Create a new error at `offset`.
    pub const fn new(kind: DecodeErrorKind, offset: usize) -> Self {
        DecodeError { kind, offset }
    }

    /// Stable error code, see [`DecodeErrorKind::code`].
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub(crate) const fn eof(context: &'static str, offset: usize) -> Self {
        Self::new(DecodeErrorKind::UnexpectedEndOfInput { context }, offset)
    }

    pub(crate) const fn not_at_value(offset: usize) -> Self {
        Self::new(DecodeErrorKind::NotAtBeginningOfValue, offset)
    }

    pub(crate) const fn invalid_char(found: u8, context: &'static str, offset: usize) -> Self {
        Self::new(
            DecodeErrorKind::InvalidCharacter {
                found: found as char,
                context,
            },
            offset,
        )
    }

    pub(crate) const fn invalid_string(reason: &'static str, offset: usize) -> Self {
        Self::new(DecodeErrorKind::InvalidString { reason }, offset)
    }

    pub(crate) fn invalid_number(literal: &[u8], target: &'static str, offset: usize) -> Self {
        Self::new(
            DecodeErrorKind::InvalidNumber {
                literal: String::from_utf8_lossy(literal).into_owned(),
                target,
            },
            offset,
        )
    }

    pub(crate) fn io(err: std::io::Error, offset: usize) -> Self {
        Self::new(DecodeErrorKind::Io(err.to_string()), offset)
    }
}

/// Result alias used throughout the decoder.
pub type Result<T, E = DecodeError> = core::result::Result<T, E>;
