//! BMP file/info header parsing (C9 header-family dispatch).

use raster_core::ZByteReader;

use crate::errors::BmpDecoderErrors;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum Compression {
    Rgb,
    Rle8,
    Rle4,
    Bitfields,
    Jpeg,
    Png,
    AlphaBitfields,
}

impl Compression {
    fn from_u32(v: u32) -> Option<Compression> {
        match v {
            0 => Some(Compression::Rgb),
            1 => Some(Compression::Rle8),
            2 => Some(Compression::Rle4),
            3 => Some(Compression::Bitfields),
            4 => Some(Compression::Jpeg),
            5 => Some(Compression::Png),
            6 => Some(Compression::AlphaBitfields),
            _ => None,
        }
    }
}

pub struct BmpHeader {
    pub width: i32,
    pub height: i32,
    pub bits_per_pixel: u16,
    pub compression: Compression,
    pub colors_used: u32,
    pub r_mask: u32,
    pub g_mask: u32,
    pub b_mask: u32,
    pub a_mask: u32,
    /// Absolute file offset where the palette (if any) starts.
    pub palette_offset: usize,
    /// Absolute file offset of the start of pixel data, taken from the file
    /// header's `BitmapOffset` field rather than computed, matching how BMP
    /// files are actually laid out (a gap is legal between the palette and
    /// the pixel data).
    pub pixel_data_offset: usize,
}

/// Standard 16-bpp 5-5-5 triple used when `RGB` compression leaves no
/// explicit bitfields (BITMAPINFOHEADER V3-NT rule, §4.9).
const DEFAULT_16BPP_MASKS: (u32, u32, u32) = (0x7C00, 0x03E0, 0x001F);
/// Standard 24/32-bpp (B, G, R) triple.
const DEFAULT_888_MASKS: (u32, u32, u32) = (0xFF0000, 0x00FF00, 0x0000FF);

/// Parses the 14-byte `BMP_FileHeader` plus whichever info header follows,
/// returning a header-family-normalized [`BmpHeader`].
///
/// BITMAPCOREHEADER (size 12) is accepted only for the depths it can
/// represent (1/4/8/24, always RGB); the OS/2 BITMAPOS2Header family (size
/// 16 or 64) is rejected as unsupported, mirroring the original decoder this
/// was distilled from.
pub fn parse_header(data: &[u8]) -> Result<BmpHeader, BmpDecoderErrors> {
    let mut reader = ZByteReader::new(data);

    if reader.get_u8_err().map_err(BmpDecoderErrors::Truncated)? != b'B'
        || reader.get_u8_err().map_err(BmpDecoderErrors::Truncated)? != b'M'
    {
        return Err(BmpDecoderErrors::InvalidMagicBytes);
    }
    reader.skip(4); // file size
    reader.skip(4); // reserved
    let bitmap_offset = reader.get_u32_le_err().map_err(BmpDecoderErrors::Truncated)? as usize;
    let info_header_size = reader.get_u32_le_err().map_err(BmpDecoderErrors::Truncated)? as usize;

    match info_header_size {
        12 => parse_core_header(&mut reader, bitmap_offset),
        16 | 64 => Err(BmpDecoderErrors::Unsupported("OS/2 BMP info header")),
        _ => parse_win_header(&mut reader, info_header_size, bitmap_offset),
    }
}

fn parse_core_header(
    reader: &mut ZByteReader, bitmap_offset: usize,
) -> Result<BmpHeader, BmpDecoderErrors> {
    let width = reader.get_u16_le_err().map_err(BmpDecoderErrors::Truncated)? as i32;
    let height = reader.get_u16_le_err().map_err(BmpDecoderErrors::Truncated)? as i32;
    if reader.get_u16_le_err().map_err(BmpDecoderErrors::Truncated)? != 1 {
        return Err(BmpDecoderErrors::GenericStatic("Invalid BMP header: planes != 1"));
    }
    let bits_per_pixel = reader.get_u16_le_err().map_err(BmpDecoderErrors::Truncated)?;
    if !matches!(bits_per_pixel, 1 | 4 | 8 | 24) {
        return Err(BmpDecoderErrors::Unsupported(
            "BITMAPCOREHEADER with a depth other than 1/4/8/24",
        ));
    }
    let (r, g, b) = DEFAULT_888_MASKS;
    Ok(BmpHeader {
        width,
        height,
        bits_per_pixel,
        compression: Compression::Rgb,
        colors_used: 0,
        r_mask: r,
        g_mask: g,
        b_mask: b,
        a_mask: 0,
        palette_offset: 14 + 12,
        pixel_data_offset: bitmap_offset,
    })
}

fn parse_win_header(
    reader: &mut ZByteReader, info_header_size: usize, bitmap_offset: usize,
) -> Result<BmpHeader, BmpDecoderErrors> {
    let width = reader.get_u32_le_err().map_err(BmpDecoderErrors::Truncated)? as i32;
    let height = reader.get_u32_le_err().map_err(BmpDecoderErrors::Truncated)? as i32;
    if reader.get_u16_le_err().map_err(BmpDecoderErrors::Truncated)? != 1 {
        return Err(BmpDecoderErrors::GenericStatic("Invalid BMP header: planes != 1"));
    }
    let bits_per_pixel = reader.get_u16_le_err().map_err(BmpDecoderErrors::Truncated)?;
    if !matches!(bits_per_pixel, 0 | 1 | 2 | 4 | 8 | 16 | 24 | 32) {
        return Err(BmpDecoderErrors::Generic(format!(
            "Unsupported BMP bit depth {bits_per_pixel}"
        )));
    }
    let compression = if info_header_size >= 20 {
        Compression::from_u32(reader.get_u32_le_err().map_err(BmpDecoderErrors::Truncated)?)
            .ok_or(BmpDecoderErrors::GenericStatic("Unrecognized BMP compression scheme"))?
    } else {
        Compression::Rgb
    };
    reader.skip(4); // image data size
    reader.skip(4); // x pixels per meter
    reader.skip(4); // y pixels per meter
    let colors_used = reader.get_u32_le_err().map_err(BmpDecoderErrors::Truncated)?;
    reader.skip(4); // colors important

    let (mut r_mask, mut g_mask, mut b_mask) = match bits_per_pixel {
        16 => DEFAULT_16BPP_MASKS,
        _ => DEFAULT_888_MASKS,
    };
    let mut a_mask = 0u32;

    if matches!(compression, Compression::Bitfields | Compression::AlphaBitfields) {
        // The reader sits exactly at header-end here. For a 40-byte
        // BITMAPINFOHEADER the masks are the 12 (or 16) bytes appended right
        // after the header; for a V4/V5 header they're in-header fields at
        // this same relative offset. Either way, read them from the current
        // position rather than gating on `info_header_size`.
        r_mask = reader.get_u32_le_err().map_err(BmpDecoderErrors::Truncated)?;
        g_mask = reader.get_u32_le_err().map_err(BmpDecoderErrors::Truncated)?;
        b_mask = reader.get_u32_le_err().map_err(BmpDecoderErrors::Truncated)?;
        if compression == Compression::AlphaBitfields || info_header_size >= 56 {
            a_mask = reader.get_u32_le_err().map_err(BmpDecoderErrors::Truncated)?;
        }
    } else if info_header_size > 52 {
        // V4+ with plain RGB: an explicit alpha mask is still carried for
        // formats where one makes sense (not 16/24-bit RGB).
        if !(compression == Compression::Rgb && matches!(bits_per_pixel, 16 | 24)) {
            a_mask = 0xFF000000;
        }
    }

    let palette_offset = 14 + info_header_size
        + match compression {
            Compression::Bitfields => 12,
            Compression::AlphaBitfields => 16,
            _ => 0,
        };

    Ok(BmpHeader {
        width,
        height,
        bits_per_pixel,
        compression,
        colors_used,
        r_mask,
        g_mask,
        b_mask,
        a_mask,
        palette_offset,
        pixel_data_offset: bitmap_offset,
    })
}

impl BmpHeader {
    pub fn abs_width(&self) -> usize {
        self.width.unsigned_abs() as usize
    }

    pub fn abs_height(&self) -> usize {
        self.height.unsigned_abs() as usize
    }

    /// Positive height means the file stores rows bottom-up, which is the
    /// common case and requires a vertical flip to present top-down.
    pub fn flip_y(&self) -> bool {
        self.height > 0
    }

    pub fn palette_entry_count(&self) -> usize {
        if self.colors_used != 0 {
            self.colors_used as usize
        } else if self.bits_per_pixel < 16 {
            1usize << self.bits_per_pixel
        } else {
            0
        }
    }
}
