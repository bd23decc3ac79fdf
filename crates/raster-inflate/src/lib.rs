//! A from-scratch RFC 1951/1950 DEFLATE and zlib decompressor, used as the
//! PNG front end's C3 Inflate Engine.

pub mod bitreader;
pub mod constants;
pub mod decoder;
pub mod errors;

pub use decoder::{decode_deflate, decode_zlib};
pub use errors::{DecodeErrorStatus, InflateDecodeErrors};

#[cfg(test)]
mod tests {
    use super::*;
    use raster_core::DecoderOptions;
    use std::io::Write;

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn round_trips_through_flate2() {
        let original = b"the quick brown fox jumps over the lazy dog, repeatedly, \
            the quick brown fox jumps over the lazy dog"
            .to_vec();
        let compressed = zlib_compress(&original);
        let options = DecoderOptions::default();
        let decoded = decode_zlib(&compressed, original.len(), &options).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn stored_block_round_trips() {
        // BFINAL=1, BTYPE=00 (stored), then LEN/NLEN/data for b"hi".
        let mut raw = vec![0b0000_0001u8];
        raw.extend_from_slice(&2u16.to_le_bytes());
        raw.extend_from_slice(&(!2u16).to_le_bytes());
        raw.extend_from_slice(b"hi");
        let decoded = decode_deflate(&raw, 2).unwrap();
        assert_eq!(decoded, b"hi");
    }

    #[test]
    fn truncated_stream_reports_insufficient_data() {
        let options = DecoderOptions::default();
        let err = decode_zlib(&[0x78, 0x9c], 100, &options).unwrap_err();
        assert!(matches!(err.error, DecodeErrorStatus::InsufficientData));
    }

    #[test]
    fn output_limit_stops_early_without_error() {
        let original = vec![b'a'; 1000];
        let compressed = zlib_compress(&original);
        let options = DecoderOptions::default();
        let decoded = decode_zlib(&compressed, 10, &options).unwrap();
        assert_eq!(decoded.len(), 10);
    }
}
