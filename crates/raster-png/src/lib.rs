//! PNG front end (C5): signature and chunk walker, palette/tRNS merging,
//! IDAT stitching through [`raster_inflate`], scanline de-filtering and
//! Adam7 de-interlacing (C4), handoff to the shared normalizer (C10).

pub mod decoder;
pub mod errors;
pub mod filters;
pub mod interlace;

pub use decoder::{decode, probe};
pub use errors::PngDecoderErrors;
