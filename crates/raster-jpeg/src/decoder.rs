//! Top-level JPEG orchestration: marker loop (C6), scan decode (C7),
//! dequantize + IDCT + upsample + color convert (C8), and the handoff into
//! the shared normalizer (C10).

use log::trace;
use raster_core::surface::DctPlane;
use raster_core::{ColorSpace, DecoderOptions, ImageSink, ScratchBuffer};

use crate::bitreader::JpegBitReader;
use crate::color_convert::convert_pixel;
use crate::entropy::{decode_ac_first, decode_ac_refine, decode_dc_first, decode_dc_refine, decode_whole, Block};
use crate::errors::JpegDecoderErrors;
use crate::idct::dequantize_and_idct;
use crate::segments::{parse_app0_jfif, parse_app14_adobe, parse_dht, parse_dqt, parse_dri, parse_sof, parse_sos, DecoderState, FrameInfo, ScanHeader};

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOF0: u8 = 0xC0;
const SOF1: u8 = 0xC1;
const SOF2: u8 = 0xC2;
const DHT: u8 = 0xC4;
const DAC: u8 = 0xCC;
const SOS: u8 = 0xDA;
const DQT: u8 = 0xDB;
const DRI: u8 = 0xDD;
const APP0: u8 = 0xE0;
const APP14: u8 = 0xEE;

/// Checks for the SOI marker without committing to a full parse.
pub fn probe(bytes: &[u8]) -> bool {
    bytes.len() >= 3 && bytes[0] == 0xFF && bytes[1] == SOI && bytes[2] == 0xFF
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

struct ComponentBlocks {
    blocks: Vec<Block>,
    blocks_wide: usize,
    blocks_high: usize,
    h: u8,
    v: u8,
    quant_table: u8,
}

fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

fn next_marker(pos: &mut usize, data: &[u8]) -> Result<u8, JpegDecoderErrors> {
    let first = *data.get(*pos).ok_or(JpegDecoderErrors::Truncated("expected marker"))?;
    if first != 0xFF {
        return Err(JpegDecoderErrors::GenericStatic("marker scan desynced (no 0xFF)"));
    }
    *pos += 1;
    loop {
        let b = *data.get(*pos).ok_or(JpegDecoderErrors::Truncated("expected marker code"))?;
        *pos += 1;
        if b != 0xFF {
            return Ok(b);
        }
    }
}

fn read_segment<'a>(pos: &mut usize, data: &'a [u8]) -> Result<&'a [u8], JpegDecoderErrors> {
    let len_bytes = data
        .get(*pos..*pos + 2)
        .ok_or(JpegDecoderErrors::Truncated("segment length"))?;
    let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    if len < 2 {
        return Err(JpegDecoderErrors::GenericStatic("segment length under 2"));
    }
    let body_start = *pos + 2;
    let body_end = body_start + (len - 2);
    let body = data
        .get(body_start..body_end)
        .ok_or(JpegDecoderErrors::Truncated("segment body"))?;
    *pos = body_end;
    Ok(body)
}

fn decode_inner<S: ImageSink + ?Sized>(data: &[u8], options: &DecoderOptions, sink: &mut S) -> Result<(), JpegDecoderErrors> {
    if !probe(data) {
        return Err(JpegDecoderErrors::NoMarkerFound);
    }
    let mut pos = 2usize; // past FF D8

    let mut state = DecoderState::default();
    let mut frame: Option<FrameInfo> = None;
    let mut components: Vec<ComponentBlocks> = Vec::new();
    let mut scans_seen = 0usize;

    loop {
        let marker = next_marker(&mut pos, data)?;
        match marker {
            EOI => break,
            SOF0 | SOF1 => {
                let body = read_segment(&mut pos, data)?;
                let info = parse_sof(body, false)?;
                init_component_grids(&info, &mut components);
                frame = Some(info);
            }
            SOF2 => {
                let body = read_segment(&mut pos, data)?;
                let info = parse_sof(body, true)?;
                init_component_grids(&info, &mut components);
                frame = Some(info);
            }
            0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                return Err(JpegDecoderErrors::Unsupported("non-baseline/progressive SOF variant"));
            }
            DHT => {
                let body = read_segment(&mut pos, data)?;
                parse_dht(body, &mut state)?;
            }
            DQT => {
                let body = read_segment(&mut pos, data)?;
                parse_dqt(body, &mut state)?;
            }
            DAC => {
                return Err(JpegDecoderErrors::Unsupported("arithmetic coding (DAC)"));
            }
            DRI => {
                let body = read_segment(&mut pos, data)?;
                state.restart_interval = parse_dri(body)?;
            }
            APP0 => {
                let body = read_segment(&mut pos, data)?;
                if parse_app0_jfif(body) {
                    state.jfif_seen = true;
                }
            }
            APP14 => {
                let body = read_segment(&mut pos, data)?;
                state.adobe_transform = parse_app14_adobe(body);
            }
            SOS => {
                scans_seen += 1;
                if scans_seen > options.max_scans() {
                    return Err(JpegDecoderErrors::GenericStatic("too many scans"));
                }
                let frame_ref = frame
                    .as_ref()
                    .ok_or(JpegDecoderErrors::GenericStatic("SOS before SOF"))?;
                let body = read_segment(&mut pos, data)?;
                let scan = parse_sos(body, frame_ref)?;
                pos = decode_scan(data, pos, frame_ref, &scan, &state, &mut components)?;
            }
            // Any other segment-carrying marker (APPn, COM, ...): skip.
            _ => {
                read_segment(&mut pos, data)?;
            }
        }
    }

    let info = frame.ok_or(JpegDecoderErrors::GenericStatic("no SOF segment found"))?;
    trace!(
        "JPEG {}x{} progressive={} components={}",
        info.width,
        info.height,
        info.progressive,
        info.components.len()
    );
    if info.width > options.max_width() || info.height > options.max_height() {
        return Err(JpegDecoderErrors::TooLargeDimensions("image", options.max_width().max(options.max_height()), info.width.max(info.height)));
    }

    let color_space = classify_color_space(&info, &state);
    let samples = reconstruct(&info, &state, &components, color_space)?;
    let plane = DctPlane {
        width: info.width,
        height: info.height,
        color_space,
        samples: &samples,
    };
    let surface = raster_core::normalize::pack_dct_plane(&plane);

    // Route the finished surface through the sink's scratch-buffer contract
    // even though the normalizer already allocated it directly: this keeps
    // every format decoder in the workspace honoring the same request/store
    // discipline the sink expects to observe.
    let mut scratch = ScratchBuffer::request(sink, surface.pixels.len())
        .ok_or(JpegDecoderErrors::GenericStatic("sink declined the scratch buffer request"))?;
    scratch.as_mut_slice().copy_from_slice(&surface.pixels);
    let pixels = scratch.into_inner();
    sink.store_image(raster_core::NormalizedSurface {
        width: surface.width,
        height: surface.height,
        pixels,
    });
    Ok(())
}

fn init_component_grids(info: &FrameInfo, components: &mut Vec<ComponentBlocks>) {
    let h_max = info.h_max();
    let v_max = info.v_max();
    let mcus_x = ceil_div(info.width, 8 * h_max as usize);
    let mcus_y = ceil_div(info.height, 8 * v_max as usize);
    components.clear();
    for c in &info.components {
        let blocks_wide = mcus_x * c.h as usize;
        let blocks_high = mcus_y * c.v as usize;
        components.push(ComponentBlocks {
            blocks: vec![[0i32; 64]; blocks_wide * blocks_high],
            blocks_wide,
            blocks_high,
            h: c.h,
            v: c.v,
            quant_table: c.quant_table,
        });
    }
}

#[allow(clippy::too_many_arguments)]
fn decode_scan(
    data: &[u8], seg_end: usize, frame: &FrameInfo, scan: &ScanHeader, state: &DecoderState,
    components: &mut [ComponentBlocks],
) -> Result<usize, JpegDecoderErrors> {
    let mut bits = JpegBitReader::new(data, seg_end);
    let interleaved = scan.components.len() > 1 || (scan.ss == 0 && scan.se == 0);

    let mut dc_pred = vec![0i32; scan.components.len()];
    let mut eob_run = 0u32;
    let mut units_since_restart = 0usize;

    let maybe_restart = |bits: &mut JpegBitReader, dc_pred: &mut [i32], eob_run: &mut u32, units: &mut usize| {
        *units += 1;
        if state.restart_interval != 0 && *units as u16 == state.restart_interval {
            bits.consume_restart_marker();
            dc_pred.iter_mut().for_each(|p| *p = 0);
            *eob_run = 0;
            *units = 0;
        }
    };

    if interleaved {
        let h_max = frame.h_max();
        let v_max = frame.v_max();
        let mcus_x = ceil_div(frame.width, 8 * h_max as usize);
        let mcus_y = ceil_div(frame.height, 8 * v_max as usize);

        for my in 0..mcus_y {
            for mx in 0..mcus_x {
                for (si, sc) in scan.components.iter().enumerate() {
                    let comp = &mut components[sc.component_index];
                    for v in 0..comp.v as usize {
                        for h in 0..comp.h as usize {
                            let bx = mx * comp.h as usize + h;
                            let by = my * comp.v as usize + v;
                            let block = &mut comp.blocks[by * comp.blocks_wide + bx];
                            decode_one_block(&mut bits, state, scan, sc, si, block, &mut dc_pred, &mut eob_run)?;
                        }
                    }
                }
                maybe_restart(&mut bits, &mut dc_pred, &mut eob_run, &mut units_since_restart);
            }
        }
    } else {
        // Non-interleaved progressive AC scan: exactly one component, walked
        // in raster block order over its own native grid.
        let sc = &scan.components[0];
        let comp = &mut components[sc.component_index];
        for by in 0..comp.blocks_high {
            for bx in 0..comp.blocks_wide {
                let block = &mut comp.blocks[by * comp.blocks_wide + bx];
                decode_one_block(&mut bits, state, scan, sc, 0, block, &mut dc_pred, &mut eob_run)?;
                maybe_restart(&mut bits, &mut dc_pred, &mut eob_run, &mut units_since_restart);
            }
        }
    }

    Ok(bits.position())
}

#[allow(clippy::too_many_arguments)]
fn decode_one_block(
    bits: &mut JpegBitReader, state: &DecoderState, scan: &ScanHeader, sc: &crate::segments::ScanComponent,
    scan_component_index: usize, block: &mut Block, dc_pred: &mut [i32], eob_run: &mut u32,
) -> Result<(), JpegDecoderErrors> {
    if is_sequential(scan) {
        let dc_table = state.dc_tables[sc.dc_table as usize]
            .as_ref()
            .ok_or(JpegDecoderErrors::GenericStatic("scan references undefined DC table"))?;
        let ac_table = state.ac_tables[sc.ac_table as usize]
            .as_ref()
            .ok_or(JpegDecoderErrors::GenericStatic("scan references undefined AC table"))?;
        decode_whole(bits, dc_table, ac_table, &mut dc_pred[scan_component_index], block)
            .map_err(JpegDecoderErrors::GenericStatic)
    } else if scan.ss == 0 {
        // Progressive DC scan.
        if scan.ah == 0 {
            let dc_table = state.dc_tables[sc.dc_table as usize]
                .as_ref()
                .ok_or(JpegDecoderErrors::GenericStatic("scan references undefined DC table"))?;
            decode_dc_first(bits, dc_table, scan.al, &mut dc_pred[scan_component_index], block)
                .map_err(JpegDecoderErrors::GenericStatic)
        } else {
            decode_dc_refine(bits, scan.al, block).map_err(JpegDecoderErrors::GenericStatic)
        }
    } else {
        // Progressive AC scan.
        let ac_table = state.ac_tables[sc.ac_table as usize]
            .as_ref()
            .ok_or(JpegDecoderErrors::GenericStatic("scan references undefined AC table"))?;
        if scan.ah == 0 {
            decode_ac_first(bits, ac_table, scan.ss, scan.se, scan.al, eob_run, block)
                .map_err(JpegDecoderErrors::GenericStatic)
        } else {
            decode_ac_refine(bits, ac_table, scan.ss, scan.se, scan.al, eob_run, block)
                .map_err(JpegDecoderErrors::GenericStatic)
        }
    }
}

fn is_sequential(scan: &ScanHeader) -> bool {
    scan.ss == 0 && scan.se == 63
}

fn classify_color_space(frame: &FrameInfo, state: &DecoderState) -> ColorSpace {
    match frame.components.len() {
        1 => ColorSpace::Unknown, // unused: convert_pixel special-cases single-component
        3 => match state.adobe_transform {
            Some(0) => ColorSpace::Srgb,
            _ => ColorSpace::YCbCr,
        },
        4 => match state.adobe_transform {
            Some(2) => ColorSpace::Ycck,
            _ => ColorSpace::Cmyk,
        },
        _ => ColorSpace::Unknown,
    }
}

/// Dequantizes and inverse-transforms every block, upsamples subsampled
/// components to full resolution (nearest-neighbor), and color-converts
/// into a BGR float buffer ready for [`raster_core::normalize::pack_dct_plane`].
fn reconstruct(
    frame: &FrameInfo, state: &DecoderState, components: &[ComponentBlocks], color_space: ColorSpace,
) -> Result<Vec<f32>, JpegDecoderErrors> {
    let h_max = frame.h_max();
    let v_max = frame.v_max();

    // One full-resolution u8 sample plane per component.
    let mut planes: Vec<Vec<u8>> = Vec::with_capacity(components.len());
    for comp in components {
        let quant = state.quant_tables[comp.quant_table as usize]
            .ok_or(JpegDecoderErrors::GenericStatic("component references undefined quant table"))?;
        let sample_wide = comp.blocks_wide * 8;
        let sample_high = comp.blocks_high * 8;
        let mut native = vec![0u8; sample_wide * sample_high];
        let mut block_out = [0u8; 64];
        for by in 0..comp.blocks_high {
            for bx in 0..comp.blocks_wide {
                dequantize_and_idct(&comp.blocks[by * comp.blocks_wide + bx], &quant, &mut block_out);
                for row in 0..8 {
                    let dst = (by * 8 + row) * sample_wide + bx * 8;
                    native[dst..dst + 8].copy_from_slice(&block_out[row * 8..row * 8 + 8]);
                }
            }
        }

        let x_scale = h_max as usize / comp.h as usize;
        let y_scale = v_max as usize / comp.v as usize;
        let full = upsample_nearest(&native, sample_wide, sample_high, x_scale, y_scale, frame.width, frame.height);
        planes.push(full);
    }

    let mut samples = vec![0f32; frame.width * frame.height * 3];
    let mut px = vec![0u8; components.len()];
    for i in 0..frame.width * frame.height {
        for (c, plane) in planes.iter().enumerate() {
            px[c] = plane[i];
        }
        let mut bgr = [0f32; 3];
        convert_pixel(color_space, &px, &mut bgr);
        samples[i * 3..i * 3 + 3].copy_from_slice(&bgr);
    }
    Ok(samples)
}

#[allow(clippy::too_many_arguments)]
fn upsample_nearest(
    native: &[u8], native_wide: usize, _native_high: usize, x_scale: usize, y_scale: usize, out_width: usize,
    out_height: usize,
) -> Vec<u8> {
    if x_scale == 1 && y_scale == 1 && native_wide == out_width {
        // Still need to clip/pad rows to out_height if MCU padding added extra rows.
        let mut out = vec![0u8; out_width * out_height];
        for y in 0..out_height {
            let row = &native[y * native_wide..y * native_wide + out_width.min(native_wide)];
            out[y * out_width..y * out_width + row.len()].copy_from_slice(row);
        }
        return out;
    }
    let mut out = vec![0u8; out_width * out_height];
    for y in 0..out_height {
        let sy = y / y_scale.max(1);
        for x in 0..out_width {
            let sx = x / x_scale.max(1);
            out[y * out_width + x] = native[sy * native_wide + sx];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_core::sink::{ErrorCategory, ImageSink};
    use raster_core::surface::NormalizedSurface;

    struct TestSink {
        surface: Option<NormalizedSurface>,
        errors: Vec<(String, ErrorCategory)>,
    }

    impl ImageSink for TestSink {
        fn request_image_buffer(&mut self, bytes: usize) -> Option<Vec<u8>> {
            Some(vec![0u8; bytes])
        }
        fn free_image_buffer(&mut self, _buffer: Vec<u8>) {}
        fn store_image(&mut self, surface: NormalizedSurface) {
            self.surface = Some(surface);
        }
        fn log_error(&mut self, text: &str, category: ErrorCategory) {
            self.errors.push((text.to_string(), category));
        }
    }

    fn huff_segment(class_dest: u8, counts_symbols: &[(u8, &[u8])]) -> Vec<u8> {
        let mut body = vec![class_dest];
        let mut counts = [0u8; 16];
        let mut symbols = Vec::new();
        for &(len, syms) in counts_symbols {
            counts[len as usize - 1] = syms.len() as u8;
            symbols.extend_from_slice(syms);
        }
        body.extend_from_slice(&counts);
        body.extend_from_slice(&symbols);
        body
    }

    fn push_segment(buf: &mut Vec<u8>, marker: u8, body: &[u8]) {
        buf.push(0xFF);
        buf.push(marker);
        let len = (body.len() + 2) as u16;
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(body);
    }

    #[test]
    fn decodes_single_block_grayscale() {
        // 8x8 single-component baseline JPEG: one DC symbol (size 0, code
        // length 1) and one AC symbol (EOB, code length 1) so the entire
        // entropy segment is four zero bits (easily hand-verified).
        let mut file = vec![0xFF, SOI];

        push_segment(&mut file, DQT, &{
            let mut b = vec![0x00]; // precision 0, dest 0
            b.extend_from_slice(&[16u8; 64]);
            b
        });

        push_segment(&mut file, DHT, &huff_segment(0x00, &[(1, &[0])])); // DC table 0
        push_segment(&mut file, DHT, &huff_segment(0x10, &[(1, &[0])])); // AC table 0

        push_segment(
            &mut file,
            SOF0,
            &[
                8, // precision
                0, 8, // height
                0, 8, // width
                1, // components
                1, 0x11, 0, // id 1, H=1 V=1, quant table 0
            ],
        );

        push_segment(&mut file, SOS, &[1, 1, 0x00, 0, 63, 0x00]);
        // Entropy data: DC symbol bit 0 (size 0), AC symbol bit 0 (EOB).
        file.push(0b0000_0000);
        file.push(0xFF);
        file.push(EOI);

        let options = DecoderOptions::new_fast();
        let mut sink = TestSink {
            surface: None,
            errors: Vec::new(),
        };
        let ok = decode(&file, &options, &mut sink);
        assert!(ok, "errors: {:?}", sink.errors);
        let surface = sink.surface.expect("surface stored");
        assert_eq!(surface.width, 8);
        assert_eq!(surface.height, 8);
        // All-zero coefficient block dequantizes to DC 0 => mid-gray (128,128,128).
        assert_eq!(&surface.pixels[0..4], &[128, 128, 128, 255]);
    }

    #[test]
    fn rejects_missing_soi() {
        let options = DecoderOptions::new_fast();
        let mut sink = TestSink {
            surface: None,
            errors: Vec::new(),
        };
        assert!(!decode(&[0, 1, 2, 3], &options, &mut sink));
    }
}
