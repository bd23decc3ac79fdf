//! The pixel-source descriptor every decoder hands to the normalizer, and
//! the single output shape ([`NormalizedSurface`]) the sink ever receives.

use crate::colorspace::ColorSpace;

/// An optional palette attached to a [`PixelSource`].
///
/// Entries are not assumed to already be BGRA8: they carry their own four
/// channel masks so the normalizer can run the same mask-extraction
/// algorithm on them that it runs on the image pixels.
pub struct Palette<'a> {
    pub data: &'a [u8],
    pub entry_count: usize,
    pub bits_per_entry: u8,
    pub r_mask: u64,
    pub g_mask: u64,
    pub b_mask: u64,
    pub a_mask: u64,
}

/// The normalized contract consumed by C10, as specified in §3.
pub struct PixelSource<'a> {
    pub width: usize,
    pub height: usize,
    /// 1, 2, 4, 8, 16, 24, 32, 48, 64
    pub bits_per_pixel: u16,
    /// Row byte-alignment boundary: 1, 2, or 4.
    pub row_alignment: u8,
    pub flip_x: bool,
    pub flip_y: bool,
    pub big_endian: bool,
    pub r_mask: u64,
    pub g_mask: u64,
    pub b_mask: u64,
    /// All-zero means "opaque".
    pub a_mask: u64,
    pub palette: Option<Palette<'a>>,
    /// Exact-match transparent-color key, pre-palette-dereference. `None`
    /// means "no keying".
    pub transparent_key: Option<u64>,
    pub data: &'a [u8],
}

impl<'a> PixelSource<'a> {
    pub fn row_stride_bytes(&self) -> usize {
        let bits_per_row = self.width as u64 * self.bits_per_pixel as u64;
        let bytes = (bits_per_row + 7) / 8;
        let align = self.row_alignment.max(1) as u64;
        (((bytes + align - 1) / align) * align) as usize
    }
}

/// Describes a fully color-converted JPEG coefficient-plane handoff: by the
/// time C8 is done (including any YCCK/CMYK-to-BGR conversion and K-channel
/// combination) the data is already BGR float samples, so the normalizer's
/// job here is only clamp-and-pack (§4.10 step 9), not mask extraction.
pub struct DctPlane<'a> {
    pub width: usize,
    pub height: usize,
    pub color_space: ColorSpace,
    /// 3 floats per pixel, in (B, G, R) order.
    pub samples: &'a [f32],
}

/// width·height BGRA8 pixels, top-down, row-major, straight alpha: the only
/// output shape the sink ever receives.
#[derive(Clone, Debug)]
pub struct NormalizedSurface {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl NormalizedSurface {
    pub fn new(width: usize, height: usize) -> Self {
        NormalizedSurface {
            width,
            height,
            pixels: vec![0u8; width * height * 4],
        }
    }
}
