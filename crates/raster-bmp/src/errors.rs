use std::fmt::{Debug, Formatter};

/// BMP-specific decode errors, classified against the §7 taxonomy by
/// [`BmpDecoderErrors::category`].
#[non_exhaustive]
pub enum BmpDecoderErrors {
    InvalidMagicBytes,
    GenericStatic(&'static str),
    Generic(String),
    TooLargeDimensions(&'static str, usize, usize),
    OverflowOccurred,
    Truncated(&'static str),
    Unsupported(&'static str),
}

impl BmpDecoderErrors {
    pub fn category(&self) -> raster_core::ErrorCategory {
        use raster_core::ErrorCategory::*;
        match self {
            BmpDecoderErrors::InvalidMagicBytes => Malformed,
            BmpDecoderErrors::GenericStatic(_) | BmpDecoderErrors::Generic(_) => Malformed,
            BmpDecoderErrors::TooLargeDimensions(..) => Policy,
            BmpDecoderErrors::OverflowOccurred => Policy,
            BmpDecoderErrors::Truncated(_) => Truncated,
            BmpDecoderErrors::Unsupported(_) => Unsupported,
        }
    }
}

impl Debug for BmpDecoderErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMagicBytes => writeln!(f, "Invalid magic bytes, file does not start with BM"),
            Self::GenericStatic(msg) => writeln!(f, "{msg}"),
            Self::Generic(msg) => writeln!(f, "{msg}"),
            Self::TooLargeDimensions(dim, expected, found) => {
                writeln!(f, "Too large dimensions for {dim}, {found} exceeds {expected}")
            }
            Self::OverflowOccurred => writeln!(f, "A size calculation overflowed"),
            Self::Truncated(msg) => writeln!(f, "Truncated BMP: {msg}"),
            Self::Unsupported(msg) => writeln!(f, "Unsupported BMP variant: {msg}"),
        }
    }
}
