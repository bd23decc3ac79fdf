pub mod bitreader;
pub mod color_convert;
pub mod decoder;
pub mod entropy;
pub mod errors;
pub mod idct;
pub mod segments;
pub mod tables;

pub use decoder::{decode, probe};
pub use errors::JpegDecoderErrors;
