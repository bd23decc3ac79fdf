//! Magic-byte dispatcher (C11): routes a buffer to the BMP, PNG or JPEG
//! decoder by the bytes at its head, then lets that decoder hand the
//! normalized surface to the sink directly. No format-specific state is
//! kept here — this crate is a thin router.

use log::trace;
use raster_core::{DecoderOptions, ImageSink};

/// Classifies `data` by magic bytes and dispatches to the matching
/// decoder, which talks to `sink` per the §6 contract. Returns `false` if
/// no magic matched, or if the matched decoder itself failed.
pub fn decode<S: ImageSink + ?Sized>(data: &[u8], options: &DecoderOptions, sink: &mut S) -> bool {
    if raster_png::probe(data) {
        trace!("dispatching to PNG decoder");
        return raster_png::decode(data, options, sink);
    }
    if raster_jpeg::probe(data) {
        trace!("dispatching to JPEG decoder");
        return raster_jpeg::decode(data, options, sink);
    }
    if raster_bmp::probe(data) {
        trace!("dispatching to BMP decoder");
        return raster_bmp::decode(data, options, sink);
    }
    sink.log_error("no recognized magic bytes", raster_core::ErrorCategory::Unsupported);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_core::sink::{ErrorCategory, ImageSink};
    use raster_core::surface::NormalizedSurface;

    struct TestSink {
        surface: Option<NormalizedSurface>,
        store_calls: usize,
        requested: usize,
        freed: usize,
        errors: Vec<ErrorCategory>,
    }

    impl TestSink {
        fn new() -> Self {
            TestSink {
                surface: None,
                store_calls: 0,
                requested: 0,
                freed: 0,
                errors: Vec::new(),
            }
        }
    }

    impl ImageSink for TestSink {
        fn request_image_buffer(&mut self, bytes: usize) -> Option<Vec<u8>> {
            self.requested += 1;
            Some(vec![0u8; bytes])
        }
        fn free_image_buffer(&mut self, _buffer: Vec<u8>) {
            self.freed += 1;
        }
        fn store_image(&mut self, surface: NormalizedSurface) {
            self.store_calls += 1;
            self.surface = Some(surface);
        }
        fn log_error(&mut self, _text: &str, category: ErrorCategory) {
            self.errors.push(category);
        }
    }

    fn le32(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    /// Builds scenario 2 from §8: a minimal 2x2 24-bpp bottom-up BMP.
    fn minimal_bmp() -> Vec<u8> {
        let mut file = Vec::new();
        file.extend_from_slice(b"BM");
        let pixel_data_offset = 14 + 40;
        let row_stride = 8; // 2 pixels * 3 bytes, padded to 4-byte boundary
        let pixel_bytes = row_stride * 2;
        let file_size = pixel_data_offset + pixel_bytes;
        file.extend_from_slice(&le32(file_size as u32));
        file.extend_from_slice(&[0, 0, 0, 0]);
        file.extend_from_slice(&le32(pixel_data_offset as u32));

        file.extend_from_slice(&le32(40)); // BITMAPINFOHEADER size
        file.extend_from_slice(&le32(2)); // width
        file.extend_from_slice(&(2i32).to_le_bytes()); // height: +2 = bottom-up
        file.extend_from_slice(&1u16.to_le_bytes()); // planes
        file.extend_from_slice(&24u16.to_le_bytes()); // bpp
        file.extend_from_slice(&le32(0)); // compression = RGB
        file.extend_from_slice(&le32(pixel_bytes as u32));
        file.extend_from_slice(&le32(0));
        file.extend_from_slice(&le32(0));
        file.extend_from_slice(&le32(0));
        file.extend_from_slice(&le32(0));

        // First row on disk = bottom of image: blue, green.
        file.extend_from_slice(&[0xFF, 0, 0, 0, 0xFF, 0, 0, 0]);
        // Second row on disk = top of image: red, white.
        file.extend_from_slice(&[0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0]);
        file
    }

    #[test]
    fn dispatches_bmp_by_magic_bytes() {
        let file = minimal_bmp();
        let options = DecoderOptions::new_fast();
        let mut sink = TestSink::new();
        assert!(decode(&file, &options, &mut sink));
        assert_eq!(sink.store_calls, 1);
        let surface = sink.surface.unwrap();
        assert_eq!(surface.width, 2);
        assert_eq!(surface.height, 2);
        // Spec scenario 2 expected top-down BGRA surface.
        assert_eq!(
            surface.pixels,
            vec![0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0xFF, 0, 0xFF, 0, 0xFF]
        );
        assert_eq!(sink.requested, sink.freed + 1, "exactly one scratch buffer leaked into store_image");
    }

    #[test]
    fn unrecognized_magic_returns_false_without_storing() {
        let data = [0u8; 16];
        let options = DecoderOptions::new_fast();
        let mut sink = TestSink::new();
        assert!(!decode(&data, &options, &mut sink));
        assert_eq!(sink.store_calls, 0);
        assert_eq!(sink.errors, vec![ErrorCategory::Unsupported]);
    }

    #[test]
    fn truncated_buffer_fails_without_storing_or_leaking() {
        let file = minimal_bmp();
        let options = DecoderOptions::new_fast();
        for cut in 0..file.len().min(32) {
            let mut sink = TestSink::new();
            let prefix = &file[..cut];
            let ok = decode(prefix, &options, &mut sink);
            if ok {
                assert_eq!(sink.store_calls, 1);
            } else {
                assert_eq!(sink.store_calls, 0);
            }
            assert_eq!(sink.requested, sink.freed + sink.store_calls, "every requested buffer is freed or handed to store_image");
        }
    }
}
