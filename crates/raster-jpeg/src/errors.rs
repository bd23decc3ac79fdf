use std::fmt::{Debug, Formatter};

/// JPEG-specific decode errors, classified against the §7 taxonomy by
/// [`JpegDecoderErrors::category`].
#[non_exhaustive]
pub enum JpegDecoderErrors {
    NoMarkerFound,
    GenericStatic(&'static str),
    Generic(String),
    TooLargeDimensions(&'static str, usize, usize),
    Truncated(&'static str),
    Unsupported(&'static str),
}

impl JpegDecoderErrors {
    pub fn category(&self) -> raster_core::ErrorCategory {
        use raster_core::ErrorCategory::*;
        match self {
            JpegDecoderErrors::NoMarkerFound => Malformed,
            JpegDecoderErrors::GenericStatic(_) | JpegDecoderErrors::Generic(_) => Malformed,
            JpegDecoderErrors::TooLargeDimensions(..) => Policy,
            JpegDecoderErrors::Truncated(_) => Truncated,
            JpegDecoderErrors::Unsupported(_) => Unsupported,
        }
    }
}

impl From<&'static str> for JpegDecoderErrors {
    fn from(val: &'static str) -> Self {
        JpegDecoderErrors::GenericStatic(val)
    }
}

impl From<String> for JpegDecoderErrors {
    fn from(val: String) -> Self {
        JpegDecoderErrors::Generic(val)
    }
}

impl Debug for JpegDecoderErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMarkerFound => writeln!(f, "Did not find SOI marker, not a jpeg"),
            Self::GenericStatic(msg) => writeln!(f, "{msg}"),
            Self::Generic(msg) => writeln!(f, "{msg}"),
            Self::TooLargeDimensions(dim, expected, found) => {
                writeln!(f, "Too large dimensions for {dim}, {found} exceeds {expected}")
            }
            Self::Truncated(msg) => writeln!(f, "Truncated JPEG: {msg}"),
            Self::Unsupported(msg) => writeln!(f, "Unsupported JPEG variant: {msg}"),
        }
    }
}
