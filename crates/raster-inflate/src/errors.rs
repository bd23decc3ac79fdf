use std::fmt::{Debug, Formatter};

/// Severity-free classification of what went wrong; the truncation policy
/// (§7) means callers care more about `data` than about matching on this.
pub enum DecodeErrorStatus {
    /// A read ran past the end of the input mid-block or mid-header: the
    /// §7 "truncated" category. Recovery policy lives with the caller.
    InsufficientData,
    /// A structurally invalid stream: reserved block type, oversubscribed
    /// Huffman table, a stored-block length that doesn't match its
    /// one's-complement, or a back-reference before the start of output.
    /// The §7 "malformed" category.
    CorruptData(&'static str),
    OutputLimitExceeded(usize, usize),
    MismatchedAdler(u32, u32),
}

impl Debug for DecodeErrorStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientData => writeln!(f, "Insufficient data to complete decoding"),
            Self::CorruptData(msg) => writeln!(f, "Corrupt deflate stream: {msg}"),
            Self::OutputLimitExceeded(expected, found) => writeln!(
                f,
                "Output limit exceeded, expected a maximum of {expected} but found {found}"
            ),
            Self::MismatchedAdler(expected, found) => writeln!(
                f,
                "Mismatched adler32, expected {expected:08x} but found {found:08x}"
            ),
        }
    }
}

/// Wraps a decode error together with whatever output had been produced so
/// far, so truncated-input callers can still deliver a partial image rather
/// than nothing (§7 policy 2).
pub struct InflateDecodeErrors {
    pub error: DecodeErrorStatus,
    pub data: Vec<u8>,
}

impl InflateDecodeErrors {
    pub fn new(error: DecodeErrorStatus, data: Vec<u8>) -> InflateDecodeErrors {
        InflateDecodeErrors { error, data }
    }
}

impl Debug for InflateDecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:?}", self.error)
    }
}
