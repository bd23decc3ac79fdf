//! Shared routines used by every format decoder in this workspace:
//!
//! - a bounds-checked byte cursor ([`bytestream`]);
//! - decoder configuration ([`options`]);
//! - the pixel-source / normalized-surface contract every decoder converges
//!   on, and the normalizer that builds the latter from the former
//!   ([`surface`], [`normalize`]);
//! - the sink the core hands the final surface to ([`sink`]).

pub mod bytestream;
pub mod colorspace;
pub mod huffman;
pub mod normalize;
pub mod options;
pub mod sink;
pub mod surface;

pub use bytestream::ZByteReader;
pub use colorspace::ColorSpace;
pub use huffman::HuffmanTable;
pub use options::DecoderOptions;
pub use sink::{ErrorCategory, ImageSink, ScratchBuffer};
pub use surface::{DctPlane, NormalizedSurface, Palette, PixelSource};
