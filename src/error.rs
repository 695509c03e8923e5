//! Error handling for decoding and encoding SPEAD items.

use thiserror::Error;

/// Errors produced while decoding or encoding SPEAD items.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpeadError {
    /// A descriptor could not be constructed, usually because its embedded
    /// array header is malformed.
    #[error("cannot parse descriptor: {0}")]
    DescriptorParse(String),

    /// A shape declared more than one unknown dimension.
    #[error("shape has multiple unknown dimensions")]
    MultipleUnknownDimensions,

    /// The raw buffer holds fewer elements than the resolved shape requires.
    #[error("item has too few elements for shape ({available} < {required})")]
    TooFewElements {
        /// Element slots available in the raw buffer.
        available: usize,
        /// Elements required by the resolved shape.
        required: usize,
    },

    /// A value does not fit in the field it is being encoded into.
    #[error("{value} is out of range for {field}")]
    ValueOutOfRange {
        /// Display form of the offending value.
        value: String,
        /// The target field, e.g. `u12` or `6 bits`.
        field: String,
    },

    /// A format declared an unsupported `(code, length)` pair.
    #[error("unhandled format ({code}, {bits})")]
    UnhandledFormat {
        /// The field type code.
        code: char,
        /// The field width in bits.
        bits: u32,
    },

    /// A format with no fields.
    #[error("format must contain at least one field")]
    EmptyFormat,

    /// A value's shape disagrees with the descriptor's fixed dimensions.
    #[error("value has shape {actual:?}, expected {expected:?}")]
    IncompatibleShape {
        /// Shape of the supplied value.
        actual: Vec<usize>,
        /// Shape declared by the descriptor (negative entries are variable).
        expected: Vec<i64>,
    },

    /// A nested value does not conform to the expected shape.
    #[error("value does not conform to the expected shape: {0}")]
    ValueShape(String),

    /// Serialization was attempted on an item that has no value.
    #[error("cannot send an item with no value")]
    MissingValue,

    /// A bit reader ran past the end of its source buffer.
    #[error("bit stream exhausted: needed {needed} bits, {available} available")]
    BitStreamExhausted {
        /// Bits requested by the failing read.
        needed: u32,
        /// Bits that remained in the source.
        available: usize,
    },

    /// A value's type does not match what the descriptor expects.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}

/// Result alias used throughout the crate.
pub type SpeadResult<T> = Result<T, SpeadError>;
