/// Color-space tag carried by a [`crate::surface::PixelSource`] DCT descriptor.
///
/// Unlike the teacher's `ColorSpace`, this is not a general-purpose pixel
/// layout tag: it only distinguishes the handful of spaces the JPEG stage
/// needs to know about before it can hand pixels to the normalizer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ColorSpace {
    Unknown,
    Srgb,
    YCbCr,
    Cmyk,
    Ycck,
}

impl ColorSpace {
    pub const fn num_components(self) -> usize {
        match self {
            Self::Unknown => 0,
            Self::Srgb => 3,
            Self::YCbCr => 3,
            Self::Cmyk | Self::Ycck => 4,
        }
    }
}
