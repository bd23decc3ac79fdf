use log::trace;
use raster_core::surface::{Palette, PixelSource};
use raster_core::{DecoderOptions, ImageSink, ScratchBuffer, ZByteReader};

use crate::errors::PngDecoderErrors;
use crate::filters::defilter_plane;
use crate::interlace::{pass_dimensions, scatter_pass};

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Checks the 8-byte PNG signature without committing to a full parse; the
/// dispatcher (C11) uses this to route a buffer here in the first place.
pub fn probe(bytes: &[u8]) -> bool {
    bytes.len() >= 8 && bytes[0..8] == PNG_SIGNATURE
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum ColorType {
    Gray,
    Rgb,
    Palette,
    GrayAlpha,
    Rgba,
}

impl ColorType {
    fn from_u8(v: u8) -> Option<ColorType> {
        match v {
            0 => Some(ColorType::Gray),
            2 => Some(ColorType::Rgb),
            3 => Some(ColorType::Palette),
            4 => Some(ColorType::GrayAlpha),
            6 => Some(ColorType::Rgba),
            _ => None,
        }
    }

    fn channels(self) -> usize {
        match self {
            ColorType::Gray | ColorType::Palette => 1,
            ColorType::GrayAlpha => 2,
            ColorType::Rgb => 3,
            ColorType::Rgba => 4,
        }
    }

    fn depth_allowed(self, depth: u8) -> bool {
        match self {
            ColorType::Gray => matches!(depth, 1 | 2 | 4 | 8 | 16),
            ColorType::Palette => matches!(depth, 1 | 2 | 4 | 8),
            ColorType::Rgb | ColorType::GrayAlpha | ColorType::Rgba => matches!(depth, 8 | 16),
        }
    }
}

struct IhdrInfo {
    width: usize,
    height: usize,
    depth: u8,
    color: ColorType,
    interlaced: bool,
}

fn parse_ihdr(data: &[u8]) -> Result<IhdrInfo, PngDecoderErrors> {
    if data.len() != 13 {
        return Err(PngDecoderErrors::GenericStatic("IHDR chunk must be 13 bytes"));
    }
    let mut reader = ZByteReader::new(data);
    let width = reader.get_u32_be() as usize;
    let height = reader.get_u32_be() as usize;
    if width == 0 || height == 0 {
        return Err(PngDecoderErrors::GenericStatic("width or height is zero"));
    }
    let depth = reader.get_u8();
    let color_code = reader.get_u8();
    let color = ColorType::from_u8(color_code)
        .ok_or(PngDecoderErrors::GenericStatic("unrecognized PNG color type"))?;
    if !color.depth_allowed(depth) {
        return Err(PngDecoderErrors::GenericStatic(
            "bit depth is not valid for this color type",
        ));
    }
    if reader.get_u8() != 0 {
        return Err(PngDecoderErrors::GenericStatic("unrecognized compression method"));
    }
    if reader.get_u8() != 0 {
        return Err(PngDecoderErrors::GenericStatic("unrecognized filter method"));
    }
    let interlace = reader.get_u8();
    if interlace > 1 {
        return Err(PngDecoderErrors::GenericStatic("unrecognized interlace method"));
    }
    Ok(IhdrInfo {
        width,
        height,
        depth,
        color,
        interlaced: interlace == 1,
    })
}

fn validate_dimensions(info: &IhdrInfo, options: &DecoderOptions) -> Result<(), PngDecoderErrors> {
    if info.width > options.max_width() {
        return Err(PngDecoderErrors::TooLargeDimensions("width", options.max_width(), info.width));
    }
    if info.height > options.max_height() {
        return Err(PngDecoderErrors::TooLargeDimensions("height", options.max_height(), info.height));
    }
    Ok(())
}

fn row_stride_bytes(width: usize, channels: usize, depth: u8) -> usize {
    (width * channels * depth as usize + 7) / 8
}

fn filter_bpp(channels: usize, depth: u8) -> usize {
    ((channels * depth as usize + 7) / 8).max(1)
}

/// Channel bit-offset within the packed pixel word for channel index `i`
/// (0 = first channel in memory order) out of `channels` total, each
/// `depth` bits wide. PNG's optional big-endian 16-bit byte swap (applied
/// uniformly over the whole pixel word by the normalizer) means the first
/// channel ends up at the *highest* bit position when `big_endian` is set.
fn channel_offset(i: usize, channels: usize, depth: u8, big_endian: bool) -> u32 {
    let depth = depth as u32;
    if big_endian {
        ((channels - 1 - i) as u32) * depth
    } else {
        (i as u32) * depth
    }
}

fn channel_mask(i: usize, channels: usize, depth: u8, big_endian: bool) -> u64 {
    let bits = depth as u32;
    let offset = channel_offset(i, channels, depth, big_endian);
    ((1u64 << bits) - 1) << offset
}

/// Builds a BGRA8-per-entry augmented palette: RGB from PLTE, alpha from
/// tRNS (padded with 255 for entries tRNS didn't cover).
fn build_palette(plte: &[u8], trns: &[u8]) -> Vec<u8> {
    let entries = plte.len() / 3;
    let mut out = Vec::with_capacity(entries * 4);
    for i in 0..entries {
        let r = plte[i * 3];
        let g = plte[i * 3 + 1];
        let b = plte[i * 3 + 2];
        let a = trns.get(i).copied().unwrap_or(255);
        out.extend_from_slice(&[b, g, r, a]);
    }
    out
}

struct Chunks<'a> {
    ihdr: Option<IhdrInfo>,
    plte: Vec<u8>,
    trns: Vec<u8>,
    idat: Vec<u8>,
    data: &'a [u8],
}

fn walk_chunks(data: &[u8]) -> Result<Chunks, PngDecoderErrors> {
    let mut reader = ZByteReader::new(data);
    let mut ihdr = None;
    let mut plte = Vec::new();
    let mut trns = Vec::new();
    let mut idat = Vec::new();
    let mut seen_first = false;

    loop {
        if reader.remaining_bytes() < 8 {
            return Err(PngDecoderErrors::Truncated("chunk stream ends before IEND"));
        }
        let length = reader.get_u32_be() as usize;
        let chunk_type = reader.get_as_ref(4).map_err(PngDecoderErrors::Truncated)?;
        let chunk_type: [u8; 4] = chunk_type.try_into().unwrap();
        let body = reader.get_as_ref(length).map_err(PngDecoderErrors::Truncated)?;
        reader.skip(4); // CRC, not verified in this core

        if !seen_first {
            if &chunk_type != b"IHDR" {
                return Err(PngDecoderErrors::GenericStatic("first chunk is not IHDR"));
            }
            ihdr = Some(parse_ihdr(body)?);
            seen_first = true;
            continue;
        }

        match &chunk_type {
            b"PLTE" => plte = body.to_vec(),
            b"tRNS" => trns = body.to_vec(),
            b"IDAT" => idat.extend_from_slice(body),
            b"IEND" => break,
            _ => trace!("skipping PNG chunk {:?}", chunk_type),
        }
    }

    Ok(Chunks {
        ihdr,
        plte,
        trns,
        idat,
        data,
    })
}

pub fn decode<S: ImageSink + ?Sized>(data: &[u8], options: &DecoderOptions, sink: &mut S) -> bool {
    match decode_inner(data, options, sink) {
        Ok(()) => true,
        Err(err) => {
            sink.log_error(&format!("{err:?}"), err.category());
            false
        }
    }
}

fn decode_inner<S: ImageSink + ?Sized>(
    data: &[u8], options: &DecoderOptions, sink: &mut S,
) -> Result<(), PngDecoderErrors> {
    if !probe(data) {
        return Err(PngDecoderErrors::BadSignature);
    }
    let chunks = walk_chunks(&data[8..])?;
    let info = chunks
        .ihdr
        .ok_or(PngDecoderErrors::GenericStatic("missing IHDR"))?;
    validate_dimensions(&info, options)?;

    trace!(
        "PNG {}x{}, depth {}, interlace {}",
        info.width,
        info.height,
        info.depth,
        info.interlaced
    );

    if info.color == ColorType::Palette && chunks.plte.is_empty() {
        return Err(PngDecoderErrors::GenericStatic("palette color type without a PLTE chunk"));
    }

    let channels = info.color.channels();
    let full_row_stride = row_stride_bytes(info.width, channels, info.depth);
    let bpp = filter_bpp(channels, info.depth);

    let expected_len = if info.interlaced {
        (0..7)
            .map(|p| {
                let (x, y) = pass_dimensions(p, info.width, info.height);
                if x == 0 || y == 0 {
                    0
                } else {
                    (row_stride_bytes(x, channels, info.depth) + 1) * y
                }
            })
            .sum()
    } else {
        (full_row_stride + 1) * info.height
    };

    let inflated = raster_inflate::decode_zlib(&chunks.idat, expected_len, options)
        .map_err(|e| PngDecoderErrors::Generic(format!("{e:?}")))?;

    let plane = if info.interlaced {
        let mut dest = vec![0u8; full_row_stride * info.height];
        let mut offset = 0usize;
        for p in 0..7 {
            let (x, y) = pass_dimensions(p, info.width, info.height);
            if x == 0 || y == 0 {
                continue;
            }
            let pass_row_stride = row_stride_bytes(x, channels, info.depth);
            let chunk_size = pass_row_stride + 1;
            let needed = chunk_size * y;
            let slice = inflated
                .get(offset..offset + needed)
                .ok_or(PngDecoderErrors::Truncated("interlaced pass data is short"))?;
            let pass_plane = defilter_plane(slice, y, pass_row_stride, bpp)?;
            scatter_pass(
                &mut dest,
                full_row_stride,
                &pass_plane,
                pass_row_stride,
                p,
                x,
                y,
                channels,
                info.depth as usize,
            );
            offset += needed;
        }
        dest
    } else {
        defilter_plane(&inflated, info.height, full_row_stride, bpp)?
    };

    let big_endian = info.depth == 16;
    let bits_per_pixel = (channels * info.depth as usize) as u16;

    let (palette, palette_bytes, r_mask, g_mask, b_mask, a_mask, transparent_key) =
        if info.color == ColorType::Palette {
            let built = build_palette(&chunks.plte, &chunks.trns);
            (true, built, 0u64, 0u64, 0u64, 0u64, None)
        } else {
            let (r, g, b, a) = if matches!(info.color, ColorType::Gray | ColorType::GrayAlpha) {
                // Gray(+alpha) has no separate G/B samples: every channel
                // takes the single gray sample, and alpha (if present) is
                // channel 1, not channel 1-as-green.
                let gray = channel_mask(0, channels, info.depth, big_endian);
                let a = if channels > 1 {
                    channel_mask(1, channels, info.depth, big_endian)
                } else {
                    0
                };
                (gray, gray, gray, a)
            } else {
                let r = channel_mask(0, channels, info.depth, big_endian);
                let g = if channels > 1 {
                    channel_mask(1, channels, info.depth, big_endian)
                } else {
                    r
                };
                let b = if channels > 2 {
                    channel_mask(2, channels, info.depth, big_endian)
                } else {
                    r
                };
                let a = if channels > 3 {
                    channel_mask(3, channels, info.depth, big_endian)
                } else {
                    0
                };
                (r, g, b, a)
            };

            let key = if !chunks.trns.is_empty() {
                match info.color {
                    ColorType::Gray => {
                        let v = u16::from_be_bytes([chunks.trns[0], *chunks.trns.get(1).unwrap_or(&0)]) as u64;
                        Some(v)
                    }
                    ColorType::Rgb if chunks.trns.len() >= 6 => {
                        let rv = u16::from_be_bytes([chunks.trns[0], chunks.trns[1]]) as u64;
                        let gv = u16::from_be_bytes([chunks.trns[2], chunks.trns[3]]) as u64;
                        let bv = u16::from_be_bytes([chunks.trns[4], chunks.trns[5]]) as u64;
                        Some(
                            (rv << channel_offset(0, channels, info.depth, big_endian))
                                | (gv << channel_offset(1, channels, info.depth, big_endian))
                                | (bv << channel_offset(2, channels, info.depth, big_endian)),
                        )
                    }
                    _ => None,
                }
            } else {
                None
            };

            (false, Vec::new(), r, g, b, a, key)
        };

    let palette_ref = if palette {
        Some(Palette {
            data: &palette_bytes,
            entry_count: palette_bytes.len() / 4,
            bits_per_entry: 32,
            r_mask: 0x00FF_0000,
            g_mask: 0x0000_FF00,
            b_mask: 0x0000_00FF,
            a_mask: 0xFF00_0000,
        })
    } else {
        None
    };

    let source = PixelSource {
        width: info.width,
        height: info.height,
        bits_per_pixel: if palette { info.depth as u16 } else { bits_per_pixel },
        row_alignment: 1,
        flip_x: false,
        flip_y: false,
        big_endian,
        r_mask,
        g_mask,
        b_mask,
        a_mask,
        palette: palette_ref,
        transparent_key,
        data: &plane,
    };

    let surface = raster_core::normalize::normalize(&source).map_err(PngDecoderErrors::GenericStatic)?;

    let mut scratch = ScratchBuffer::request(sink, surface.pixels.len())
        .ok_or(PngDecoderErrors::GenericStatic("sink declined the scratch buffer request"))?;
    scratch.as_mut_slice().copy_from_slice(&surface.pixels);
    let pixels = scratch.into_inner();
    sink.store_image(raster_core::NormalizedSurface {
        width: surface.width,
        height: surface.height,
        pixels,
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_core::NormalizedSurface;
    use std::io::Write;

    struct TestSink {
        stored: Option<NormalizedSurface>,
    }

    impl ImageSink for TestSink {
        fn request_image_buffer(&mut self, bytes: usize) -> Option<Vec<u8>> {
            Some(vec![0u8; bytes])
        }
        fn free_image_buffer(&mut self, _buffer: Vec<u8>) {}
        fn store_image(&mut self, surface: NormalizedSurface) {
            self.stored = Some(surface);
        }
        fn log_error(&mut self, _text: &str, _category: raster_core::ErrorCategory) {}
    }

    fn push_chunk(out: &mut Vec<u8>, tag: &[u8; 4], body: &[u8]) {
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(tag);
        out.extend_from_slice(body);
        out.extend_from_slice(&[0, 0, 0, 0]); // CRC, unverified
    }

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// Scenario 1: 2x2 RGB8, one IDAT, no filtering (tag 0 on every row).
    #[test]
    fn decodes_minimal_rgb8() {
        let mut file = PNG_SIGNATURE.to_vec();
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);
        push_chunk(&mut file, b"IHDR", &ihdr);

        let mut raw = Vec::new();
        // row 0: filter None, (255,0,0) (0,255,0)
        raw.extend_from_slice(&[0, 255, 0, 0, 0, 255, 0]);
        // row 1: filter None, (0,0,255) (255,255,255)
        raw.extend_from_slice(&[0, 0, 0, 255, 255, 255, 255]);
        let compressed = zlib_compress(&raw);
        push_chunk(&mut file, b"IDAT", &compressed);
        push_chunk(&mut file, b"IEND", &[]);

        let options = DecoderOptions::default();
        let mut sink = TestSink { stored: None };
        assert!(decode(&file, &options, &mut sink));
        let surface = sink.stored.expect("image stored");
        assert_eq!(surface.width, 2);
        assert_eq!(surface.height, 2);
        assert_eq!(
            surface.pixels,
            vec![0, 0, 0xFF, 0xFF, 0, 0xFF, 0, 0xFF, 0xFF, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    /// Scenario 3: 2x1 palette PNG with tRNS.
    #[test]
    fn decodes_palette_with_trns() {
        let mut file = PNG_SIGNATURE.to_vec();
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, 3, 0, 0, 0]);
        push_chunk(&mut file, b"IHDR", &ihdr);
        push_chunk(&mut file, b"PLTE", &[255, 0, 0, 0, 255, 0]);
        push_chunk(&mut file, b"tRNS", &[128, 255]);

        let raw = [0u8, 0, 1]; // filter None, index 0, index 1
        let compressed = zlib_compress(&raw);
        push_chunk(&mut file, b"IDAT", &compressed);
        push_chunk(&mut file, b"IEND", &[]);

        let options = DecoderOptions::default();
        let mut sink = TestSink { stored: None };
        assert!(decode(&file, &options, &mut sink));
        let surface = sink.stored.expect("image stored");
        assert_eq!(surface.pixels, vec![0, 0, 0xFF, 0x80, 0, 0xFF, 0, 0xFF]);
    }

    #[test]
    fn rejects_bad_signature() {
        assert!(!probe(b"not a png"));
    }
}
