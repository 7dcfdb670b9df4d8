//! Binary codecs for Ethereum wire formats
//!
//! - [`abi`]: Solidity ABI head/tail encoding, selectors, event topics
//! - [`rlp`]: recursive length prefix encoding for transaction serialization

pub mod abi;
pub mod rlp;

use thiserror::Error;

/// Failure modes shared by the ABI and RLP codecs
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown ABI type `{0}`")]
    UnknownType(String),

    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("array length mismatch: type wants {expected} elements, value has {got}")]
    ArrayLengthMismatch { expected: usize, got: usize },

    #[error("tuple arity mismatch: type wants {expected} components, value has {got}")]
    TupleArityMismatch { expected: usize, got: usize },

    #[error("integer out of range for {ty}")]
    IntegerOutOfRange { ty: String },

    #[error("fixed bytes length mismatch: bytes{expected} given {got} bytes")]
    FixedBytesLength { expected: usize, got: usize },

    #[error("truncated data: needed {needed} bytes at offset {offset}, region holds {len}")]
    Truncated {
        needed: usize,
        offset: usize,
        len: usize,
    },

    #[error("offset {offset} points outside the enclosing region of {len} bytes")]
    OffsetOutOfBounds { offset: usize, len: usize },

    #[error("topic count mismatch: expected {expected}, got {got}")]
    TopicCountMismatch { expected: usize, got: usize },

    #[error("invalid signature `{0}`")]
    InvalidSignature(String),

    #[error("non-canonical RLP: {0}")]
    NonCanonical(&'static str),

    #[error("RLP input truncated")]
    RlpTruncated,

    #[error("trailing bytes after RLP item")]
    RlpTrailingBytes,

    #[error("decoded value does not fit in the requested type")]
    ValueOutOfRange,
}
