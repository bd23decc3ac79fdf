use log::trace;
use raster_core::surface::{Palette, PixelSource};
use raster_core::{DecoderOptions, ImageSink, ScratchBuffer};

use crate::errors::BmpDecoderErrors;
use crate::header::{parse_header, BmpHeader, Compression};
use crate::rle::{decode_rle, RleDepth};

/// Checks the 2-byte `BM` magic without committing to a full header parse;
/// the dispatcher (C11) uses this to route a buffer here in the first
/// place.
pub fn probe(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && &bytes[0..2] == b"BM"
}

fn validate_dimensions(header: &BmpHeader, options: &DecoderOptions) -> Result<(), BmpDecoderErrors> {
    if header.abs_width() == 0 || header.abs_height() == 0 {
        return Err(BmpDecoderErrors::GenericStatic("Width or height is zero"));
    }
    if header.abs_width() > options.max_width() {
        return Err(BmpDecoderErrors::TooLargeDimensions(
            "width",
            options.max_width(),
            header.abs_width(),
        ));
    }
    if header.abs_height() > options.max_height() {
        return Err(BmpDecoderErrors::TooLargeDimensions(
            "height",
            options.max_height(),
            header.abs_height(),
        ));
    }
    Ok(())
}

fn slice_palette<'a>(
    data: &'a [u8], header: &BmpHeader,
) -> Result<(&'a [u8], usize), BmpDecoderErrors> {
    let entries = header.palette_entry_count();
    if entries == 0 {
        return Ok((&[], 0));
    }
    let end = header
        .palette_offset
        .checked_add(entries * 4)
        .ok_or(BmpDecoderErrors::OverflowOccurred)?;
    let slice = data
        .get(header.palette_offset..end)
        .ok_or(BmpDecoderErrors::Truncated("palette runs past the end of the file"))?;
    Ok((slice, entries))
}

/// Decodes a BMP buffer and, on success, hands the normalized surface to
/// `sink`. Returns `true` on success, matching the C9/C11 boolean contract;
/// every failure is reported through `sink.log_error` first.
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
) -> Result<(), BmpDecoderErrors> {
    let header = parse_header(data)?;
    validate_dimensions(&header, options)?;

    trace!(
        "BMP {}x{}, {}bpp, compression {:?}",
        header.abs_width(),
        header.abs_height(),
        header.bits_per_pixel,
        header.compression
    );

    if header.bits_per_pixel == 0
        || matches!(header.compression, Compression::Jpeg | Compression::Png)
    {
        return Err(BmpDecoderErrors::Unsupported(
            "JPEG/PNG embedded in a BMP container",
        ));
    }

    let width = header.abs_width();
    let height = header.abs_height();
    let (palette_bytes, palette_entries) = slice_palette(data, &header)?;

    let surface = if matches!(header.compression, Compression::Rle4 | Compression::Rle8) {
        let rle_depth = if header.compression == Compression::Rle4 {
            RleDepth::Four
        } else {
            RleDepth::Eight
        };
        let pixel_data = data
            .get(header.pixel_data_offset..)
            .ok_or(BmpDecoderErrors::Truncated("pixel data offset past end of file"))?;
        let expanded = decode_rle(pixel_data, rle_depth, width, height, palette_bytes, palette_entries);

        // RLE output is already palette-dereferenced into (B, G, R, 255)
        // words, so the normalizer only needs to apply the usual height
        // flip via identity masks.
        let source = PixelSource {
            width,
            height,
            bits_per_pixel: 32,
            row_alignment: 1,
            flip_x: false,
            flip_y: header.flip_y(),
            big_endian: false,
            r_mask: 0x00FF_0000,
            g_mask: 0x0000_FF00,
            b_mask: 0x0000_00FF,
            a_mask: 0,
            palette: None,
            transparent_key: None,
            data: &expanded,
        };
        raster_core::normalize::normalize(&source).map_err(BmpDecoderErrors::GenericStatic)?
    } else {
        let row_stride = {
            let bits_per_row = width as u64 * header.bits_per_pixel as u64;
            let bytes = (bits_per_row + 7) / 8;
            (((bytes + 3) / 4) * 4) as usize
        };
        let needed = row_stride
            .checked_mul(height)
            .ok_or(BmpDecoderErrors::OverflowOccurred)?;
        let pixel_data = data
            .get(header.pixel_data_offset..)
            .ok_or(BmpDecoderErrors::Truncated("pixel data offset past end of file"))?;
        if pixel_data.len() < needed {
            return Err(BmpDecoderErrors::Truncated(
                "file is too small to contain the declared bitmap",
            ));
        }

        let palette = if palette_entries > 0 {
            Some(Palette {
                data: palette_bytes,
                entry_count: palette_entries,
                bits_per_entry: 32,
                r_mask: 0x00FF_0000,
                g_mask: 0x0000_FF00,
                b_mask: 0x0000_00FF,
                a_mask: 0,
            })
        } else {
            None
        };

        let source = PixelSource {
            width,
            height,
            bits_per_pixel: header.bits_per_pixel,
            row_alignment: 4,
            flip_x: false,
            flip_y: header.flip_y(),
            big_endian: false,
            r_mask: header.r_mask as u64,
            g_mask: header.g_mask as u64,
            b_mask: header.b_mask as u64,
            a_mask: header.a_mask as u64,
            palette,
            transparent_key: None,
            data: &pixel_data[..needed],
        };
        raster_core::normalize::normalize(&source).map_err(BmpDecoderErrors::GenericStatic)?
    };

    // Route the finished surface through the sink's scratch-buffer contract
    // even though the normalizer already allocated it directly: this keeps
    // every format decoder in the workspace honoring the same request/store
    // discipline the sink expects to observe.
    let mut scratch = ScratchBuffer::request(sink, surface.pixels.len())
        .ok_or(BmpDecoderErrors::GenericStatic("sink declined the scratch buffer request"))?;
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

    fn le32(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    /// Scenario 2: 2x2 24-bpp bottom-up BMP.
    #[test]
    fn decodes_minimal_24bpp_bottom_up() {
        let mut file = Vec::new();
        file.extend_from_slice(b"BM");
        file.extend_from_slice(&le32(0)); // file size, unchecked
        file.extend_from_slice(&le32(0)); // reserved
        file.extend_from_slice(&le32(54)); // pixel data offset
        file.extend_from_slice(&le32(40)); // info header size
        file.extend_from_slice(&2i32.to_le_bytes()); // width
        file.extend_from_slice(&2i32.to_le_bytes()); // height (+2 = bottom-up)
        file.extend_from_slice(&1u16.to_le_bytes()); // planes
        file.extend_from_slice(&24u16.to_le_bytes()); // bpp
        file.extend_from_slice(&le32(0)); // compression = RGB
        file.extend_from_slice(&le32(0)); // image size
        file.extend_from_slice(&le32(0)); // x ppm
        file.extend_from_slice(&le32(0)); // y ppm
        file.extend_from_slice(&le32(0)); // colors used
        file.extend_from_slice(&le32(0)); // colors important
        assert_eq!(file.len(), 54);
        // first row on disk (image bottom): BGR blue, BGR green, padded to 4 bytes
        file.extend_from_slice(&[0xFF, 0, 0, 0, 0xFF, 0, 0, 0]);
        // second row on disk (image top): BGR red, BGR white, padded to 4 bytes
        file.extend_from_slice(&[0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0]);

        let options = DecoderOptions::default();
        let mut sink = TestSink { stored: None };
        assert!(decode(&file, &options, &mut sink));
        let surface = sink.stored.expect("image stored");
        assert_eq!(surface.width, 2);
        assert_eq!(surface.height, 2);
        assert_eq!(
            surface.pixels,
            vec![0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0xFF, 0, 0xFF, 0, 0xFF]
        );
    }

    #[test]
    fn rejects_non_bmp_magic() {
        assert!(!probe(b"\x89PNG"));
        assert!(probe(b"BM anything"));
    }
}
