use std::fmt::{Debug, Formatter};

/// PNG-specific decode errors, classified against the §7 taxonomy by
/// [`PngDecoderErrors::category`].
#[non_exhaustive]
pub enum PngDecoderErrors {
    BadSignature,
    GenericStatic(&'static str),
    Generic(String),
    TooLargeDimensions(&'static str, usize, usize),
    Truncated(&'static str),
    Unsupported(&'static str),
}

impl PngDecoderErrors {
    pub fn category(&self) -> raster_core::ErrorCategory {
        use raster_core::ErrorCategory::*;
        match self {
            PngDecoderErrors::BadSignature => Malformed,
            PngDecoderErrors::GenericStatic(_) | PngDecoderErrors::Generic(_) => Malformed,
            PngDecoderErrors::TooLargeDimensions(..) => Policy,
            PngDecoderErrors::Truncated(_) => Truncated,
            PngDecoderErrors::Unsupported(_) => Unsupported,
        }
    }
}

impl From<&'static str> for PngDecoderErrors {
    fn from(val: &'static str) -> Self {
        PngDecoderErrors::GenericStatic(val)
    }
}

impl From<String> for PngDecoderErrors {
    fn from(val: String) -> Self {
        PngDecoderErrors::Generic(val)
    }
}

impl Debug for PngDecoderErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadSignature => writeln!(f, "Bad PNG signature, not a png"),
            Self::GenericStatic(msg) => writeln!(f, "{msg}"),
            Self::Generic(msg) => writeln!(f, "{msg}"),
            Self::TooLargeDimensions(dim, expected, found) => {
                writeln!(f, "Too large dimensions for {dim}, {found} exceeds {expected}")
            }
            Self::Truncated(msg) => writeln!(f, "Truncated PNG: {msg}"),
            Self::Unsupported(msg) => writeln!(f, "Unsupported PNG variant: {msg}"),
        }
    }
}
