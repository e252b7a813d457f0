//! Error types for decoding, analysis and validation.
//!
//! Every fallible operation in this crate returns one of three focused error
//! kinds. [`Error`] wraps all of them for callers that drive the whole
//! pipeline and only want a single error type.
//!
//! ## Error kinds
//! - [`ValueError`]: a malformed or out-of-range identifier, or a forge input
//!   that does not fit its 32-bit field.
//! - [`SchemeError`]: a residual partition scheme whose widths do not describe
//!   exactly 32 bits.
//! - [`ValidationError`]: a corpus that cannot produce statistics.

/// A result type defaulting to the crate-level [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `aweme-id` can produce.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Scheme(#[from] SchemeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A malformed or out-of-range input value.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValueError {
    /// The textual id was empty (after trimming whitespace).
    #[error("empty id")]
    EmptyId,

    /// The textual id contained something other than ASCII decimal digits.
    #[error("invalid id {input:?}: unexpected character {found:?} at offset {offset}")]
    InvalidDigit {
        input: String,
        found: char,
        offset: usize,
    },

    /// The textual id is a valid decimal number but does not fit in 64 bits.
    #[error("id {input:?} exceeds the unsigned 64-bit range")]
    IdOverflow { input: String },

    /// A forge input does not fit its 32-bit field.
    #[error("{field} value {value} exceeds the 32-bit range")]
    FieldOverflow { field: &'static str, value: u64 },
}

/// An invalid residual partition scheme.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SchemeError {
    /// The scheme declares no fields at all.
    #[error("scheme {scheme:?} declares no fields")]
    Empty { scheme: String },

    /// The declared widths do not add up to the 32 residual bits.
    #[error("scheme {scheme:?} widths sum to {total} bits, expected 32")]
    WidthMismatch { scheme: String, total: u32 },

    /// A single field is zero bits wide or wider than the residual.
    #[error("scheme {scheme:?} field {field:?} has invalid width {width}")]
    InvalidWidth {
        scheme: String,
        field: String,
        width: u8,
    },

    /// Two fields share a name, so lookups by name would be ambiguous.
    #[error("scheme {scheme:?} declares field {field:?} more than once")]
    DuplicateField { scheme: String, field: String },

    /// A role (shard or sequence) points at a field that does not exist.
    #[error("scheme {scheme:?} has no field {field:?}")]
    UnknownField { scheme: String, field: String },

    /// Grouping by a named field was requested without any scheme to
    /// resolve it against.
    #[error("cannot group by field {field:?} without a scheme")]
    NoScheme { field: String },

    /// The catalog has no scheme registered under this name.
    #[error("unknown scheme {scheme:?}")]
    UnknownScheme { scheme: String },

    /// The catalog already holds a scheme with this name.
    #[error("scheme {scheme:?} is already registered")]
    AlreadyRegistered { scheme: String },
}

/// A corpus that cannot produce error statistics.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// No samples were supplied, so mean/min/max are undefined.
    #[error("cannot validate an empty corpus")]
    EmptyCorpus,

    /// Samples were supplied but every one of them was malformed.
    #[error("none of the {skipped} samples could be validated")]
    NoUsableSamples { skipped: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_errors_name_the_offending_input() {
        let err = ValueError::InvalidDigit {
            input: "12a4".into(),
            found: 'a',
            offset: 2,
        };
        assert_eq!(
            err.to_string(),
            r#"invalid id "12a4": unexpected character 'a' at offset 2"#
        );

        let err = ValueError::FieldOverflow {
            field: "residual",
            value: 1 << 32,
        };
        assert_eq!(err.to_string(), "residual value 4294967296 exceeds the 32-bit range");
    }

    #[test]
    fn crate_error_is_transparent() {
        let err: Error = SchemeError::WidthMismatch {
            scheme: "broken".into(),
            total: 31,
        }
        .into();
        assert_eq!(err.to_string(), r#"scheme "broken" widths sum to 31 bits, expected 32"#);
        assert!(matches!(err, Error::Scheme(_)));

        let err: Error = ValidationError::EmptyCorpus.into();
        assert_eq!(err.to_string(), "cannot validate an empty corpus");
    }
}
