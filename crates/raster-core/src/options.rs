//! Shared decoder configuration.
//!
//! Mirrors the builder-style `DecoderOptions` the format decoders in this
//! workspace are written against, trimmed of the SIMD-capability-detection
//! surface (no intrinsics dispatch is used here) but keeping the dimension
//! caps and the strict-mode switch that gates checksum verification.

/// Implementation cap on width/height in pixels (§3 "each ≤ an
/// implementation cap, e.g. 65535").
pub const DEFAULT_MAX_DIMENSION: usize = 65535;

#[derive(Copy, Clone, Debug)]
pub struct DecoderOptions {
    max_width: usize,
    max_height: usize,
    /// Gate PNG CRC-32 and zlib Adler-32 checksum verification (Open
    /// Question (d)). Default is permissive: checksums are computed where
    /// cheap to do so but never abort the decode.
    strict_checksums: bool,
    /// Cap on the number of progressive JPEG scans accepted, guarding
    /// against a pathological SOS flood.
    max_scans: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        DecoderOptions {
            max_width: DEFAULT_MAX_DIMENSION,
            max_height: DEFAULT_MAX_DIMENSION,
            strict_checksums: false,
            max_scans: 100,
        }
    }
}

impl DecoderOptions {
    pub fn new_fast() -> Self {
        Self::default()
    }

    pub fn set_max_width(mut self, max_width: usize) -> Self {
        self.max_width = max_width;
        self
    }

    pub fn set_max_height(mut self, max_height: usize) -> Self {
        self.max_height = max_height;
        self
    }

    pub fn set_strict_checksums(mut self, yes: bool) -> Self {
        self.strict_checksums = yes;
        self
    }

    pub fn set_max_scans(mut self, max_scans: usize) -> Self {
        self.max_scans = max_scans;
        self
    }

    pub const fn max_width(&self) -> usize {
        self.max_width
    }

    pub const fn max_height(&self) -> usize {
        self.max_height
    }

    pub const fn strict_checksums(&self) -> bool {
        self.strict_checksums
    }

    pub const fn max_scans(&self) -> usize {
        self.max_scans
    }
}
