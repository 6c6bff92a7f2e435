//! Wire-level error types.

use thiserror::Error;

/// Errors produced while encoding or decoding DHCPv6 messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Destination buffer cannot hold the option being emitted.
    ///
    /// Callers size buffers for header + all options + per-option worst
    /// case up front, so hitting this means the sizing was wrong.
    #[error("buffer too small: need {needed} bytes, {capacity} available")]
    BufferTooSmall {
        /// Bytes required to emit the option.
        needed: usize,
        /// Bytes remaining in the destination.
        capacity: usize,
    },

    /// Message or option region ends before its declared length.
    #[error("message truncated at offset {offset}")]
    Truncated {
        /// Byte offset where the region ran out.
        offset: usize,
    },

    /// Message type octet is not a known DHCPv6 message type.
    #[error("invalid message type {0}")]
    InvalidMessageType(u8),

    /// Message shorter than the fixed 4-byte header.
    #[error("message shorter than header: {0} bytes")]
    ShortMessage(usize),

    /// Option payload does not match the fixed layout its code requires.
    ///
    /// Covers the correctness-critical IA case: a declared option length
    /// below the fixed IA-NA (12-byte) or IA-TA (4-byte) header must be
    /// rejected here rather than producing an out-of-bounds inner region.
    #[error("malformed option {code}: {len} byte payload")]
    MalformedOption {
        /// Option code as it appeared on the wire.
        code: u16,
        /// Declared payload length.
        len: usize,
    },

    /// Option payload larger than a 16-bit length can describe.
    #[error("option payload of {0} bytes exceeds 16-bit length field")]
    OversizedOption(usize),

    /// DUID outside the 1..=130 byte range RFC 8415 §11.1 allows.
    #[error("DUID of {0} bytes outside 1..=130")]
    InvalidDuidLength(usize),
}

/// Result alias for wire operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
