use log::{debug, trace};
use raster_core::huffman::HuffmanTable;
use raster_core::DecoderOptions;

use crate::bitreader::BitReader;
use crate::constants::{
    fixed_distance_lengths, fixed_literal_length_lengths, CODE_LENGTH_ORDER, DIST_BASE,
    DIST_EXTRA_BITS, LENGTH_BASE, LENGTH_EXTRA_BITS,
};
use crate::errors::{DecodeErrorStatus, InflateDecodeErrors};

const END_OF_BLOCK: u16 = 256;

fn adler32(data: &[u8]) -> u32 {
    const MOD_ADLER: u32 = 65521;
    let (mut a, mut b) = (1u32, 0u32);
    for &byte in data {
        a = (a + byte as u32) % MOD_ADLER;
        b = (b + a) % MOD_ADLER;
    }
    (b << 16) | a
}

fn literal_length_table(reader: &mut BitReader) -> Result<HuffmanTable, &'static str> {
    let _ = reader; // fixed table does not consume bits
    let lengths = fixed_literal_length_lengths();
    let symbols: Vec<u16> = (0..lengths.len() as u16).collect();
    HuffmanTable::build(&symbols, &lengths)
}

fn distance_table() -> Result<HuffmanTable, &'static str> {
    let lengths = fixed_distance_lengths();
    let symbols: Vec<u16> = (0..lengths.len() as u16).collect();
    HuffmanTable::build(&symbols, &lengths)
}

/// Reads the HCLEN/HLIT/HDIST header of a dynamic block and returns the
/// literal/length and distance tables it describes.
fn read_dynamic_tables(reader: &mut BitReader) -> Result<(HuffmanTable, HuffmanTable), &'static str> {
    let hlit = reader.get_bits(5) as usize + 257;
    let hdist = reader.get_bits(5) as usize + 1;
    let hclen = reader.get_bits(4) as usize + 4;

    let mut cl_lengths = [0u8; 19];
    for &slot in CODE_LENGTH_ORDER.iter().take(hclen) {
        cl_lengths[slot] = reader.get_bits(3) as u8;
    }
    let cl_symbols: Vec<u16> = (0..19u16).collect();
    let cl_table = HuffmanTable::build(&cl_symbols, &cl_lengths)?;

    let total = hlit + hdist;
    let mut all_lengths = Vec::with_capacity(total);
    while all_lengths.len() < total {
        let symbol = cl_table
            .decode_symbol(|| reader.get_bit())
            .map_err(|_| "corrupt code-length Huffman stream")?;
        match symbol {
            0..=15 => all_lengths.push(symbol as u8),
            16 => {
                let prev = *all_lengths.last().ok_or("repeat code with no previous length")?;
                let repeat = reader.get_bits(2) + 3;
                for _ in 0..repeat {
                    all_lengths.push(prev);
                }
            }
            17 => {
                let repeat = reader.get_bits(3) + 3;
                for _ in 0..repeat {
                    all_lengths.push(0);
                }
            }
            18 => {
                let repeat = reader.get_bits(7) + 11;
                for _ in 0..repeat {
                    all_lengths.push(0);
                }
            }
            _ => return Err("invalid code-length symbol"),
        }
        if all_lengths.len() > total {
            return Err("code-length repeat overruns table size");
        }
    }

    let lit_lengths = &all_lengths[0..hlit];
    let dist_lengths = &all_lengths[hlit..hlit + hdist];

    let lit_symbols: Vec<u16> = (0..hlit as u16).collect();
    let dist_symbols: Vec<u16> = (0..hdist as u16).collect();

    let lit_table = HuffmanTable::build(&lit_symbols, lit_lengths)?;
    let dist_table = HuffmanTable::build(&dist_symbols, dist_lengths)?;
    Ok((lit_table, dist_table))
}

/// Decodes literal/length/distance symbols for one compressed block into
/// `out`, stopping at the end-of-block symbol or once `limit` bytes have
/// been produced.
fn inflate_block(
    reader: &mut BitReader, lit_table: &HuffmanTable, dist_table: &HuffmanTable, out: &mut Vec<u8>,
    limit: usize,
) -> Result<(), &'static str> {
    loop {
        if out.len() >= limit {
            return Ok(());
        }
        let symbol = lit_table
            .decode_symbol(|| reader.get_bit())
            .map_err(|_| "corrupt literal/length Huffman stream")?;

        if symbol < END_OF_BLOCK {
            out.push(symbol as u8);
        } else if symbol == END_OF_BLOCK {
            return Ok(());
        } else {
            let idx = (symbol - 257) as usize;
            if idx >= LENGTH_BASE.len() {
                return Err("invalid length code");
            }
            let extra = reader.get_bits(LENGTH_EXTRA_BITS[idx] as u32);
            let mut length = LENGTH_BASE[idx] as usize + extra as usize;

            let dist_symbol = dist_table
                .decode_symbol(|| reader.get_bit())
                .map_err(|_| "corrupt distance Huffman stream")? as usize;
            if dist_symbol >= DIST_BASE.len() {
                return Err("invalid distance code");
            }
            let dist_extra = reader.get_bits(DIST_EXTRA_BITS[dist_symbol] as u32);
            let distance = DIST_BASE[dist_symbol] as usize + dist_extra as usize;

            if distance == 0 || distance > out.len() {
                return Err("back-reference points before start of output");
            }
            if out.len() + length > limit {
                length = limit.saturating_sub(out.len());
            }
            // Overlapping back-references (distance < length) are replayed
            // byte by byte, matching plain LZ77 semantics without relying
            // on any unsafe bulk-copy trick.
            let start = out.len() - distance;
            for i in 0..length {
                let byte = out[start + i];
                out.push(byte);
            }
            if out.len() >= limit {
                return Ok(());
            }
        }
    }
}

fn stored_block(reader: &mut BitReader, out: &mut Vec<u8>, limit: usize) -> Result<(), &'static str> {
    reader.align_to_byte();
    let header = reader
        .read_raw_bytes(4)
        .ok_or(InsufficientDataMarker::MSG)?;
    let len = u16::from_le_bytes([header[0], header[1]]);
    let nlen = u16::from_le_bytes([header[2], header[3]]);
    if len != !nlen {
        return Err("stored block LEN does not match one's complement NLEN");
    }
    let want = len as usize;
    let take = want.min(limit.saturating_sub(out.len()));
    let bytes = reader
        .read_raw_bytes(take)
        .ok_or(InsufficientDataMarker::MSG)?;
    out.extend_from_slice(bytes);
    if take < want {
        // Caller's limit was reached mid-copy; skip the remainder of the
        // block's declared bytes so the cursor stays correctly positioned
        // for any following block (won't be reached once `limit` is hit,
        // but keeps the reader consistent either way).
        reader.skip_forward(want - take);
    }
    Ok(())
}

struct InsufficientDataMarker;
impl InsufficientDataMarker {
    const MSG: &'static str = "truncated stored block";
}

/// Decodes one complete DEFLATE stream (RFC 1951), stopping once `limit`
/// output bytes have been produced or the final block ends.
pub fn decode_deflate(data: &[u8], limit: usize) -> Result<Vec<u8>, InflateDecodeErrors> {
    let mut reader = BitReader::new(data);
    let mut out = Vec::with_capacity(limit.min(1 << 20));

    loop {
        if out.len() >= limit {
            break;
        }
        let bfinal = reader.get_bits(1);
        let btype = reader.get_bits(2);
        if reader.exhausted && data.is_empty() {
            return Err(InflateDecodeErrors::new(DecodeErrorStatus::InsufficientData, out));
        }

        let result = match btype {
            0 => stored_block(&mut reader, &mut out, limit).map_err(DecodeErrorStatus::CorruptData),
            1 => (|| {
                let lit = literal_length_table(&mut reader).map_err(DecodeErrorStatus::CorruptData)?;
                let dist = distance_table().map_err(DecodeErrorStatus::CorruptData)?;
                inflate_block(&mut reader, &lit, &dist, &mut out, limit)
                    .map_err(DecodeErrorStatus::CorruptData)
            })(),
            2 => (|| {
                let (lit, dist) =
                    read_dynamic_tables(&mut reader).map_err(DecodeErrorStatus::CorruptData)?;
                inflate_block(&mut reader, &lit, &dist, &mut out, limit)
                    .map_err(DecodeErrorStatus::CorruptData)
            })(),
            _ => Err(DecodeErrorStatus::CorruptData("reserved block type 3")),
        };

        if let Err(status) = result {
            return Err(InflateDecodeErrors::new(status, out));
        }
        if bfinal == 1 {
            break;
        }
        if reader.exhausted {
            return Err(InflateDecodeErrors::new(DecodeErrorStatus::InsufficientData, out));
        }
    }

    trace!("Inflated {} bytes (limit {})", out.len(), limit);
    Ok(out)
}

/// Parses the 2-byte zlib header (skipping the optional 4-byte dictionary id
/// when FDICT is set), runs [`decode_deflate`] on the remainder, and, when
/// `options.strict_checksums()` asks for it, verifies the trailing Adler-32
/// against the produced output (Open Question (d); unverified by default).
pub fn decode_zlib(
    data: &[u8], limit: usize, options: &DecoderOptions,
) -> Result<Vec<u8>, InflateDecodeErrors> {
    if data.len() < 2 {
        return Err(InflateDecodeErrors::new(DecodeErrorStatus::InsufficientData, Vec::new()));
    }
    let cmf = data[0];
    let flg = data[1];
    if cmf & 0x0F != 8 {
        return Err(InflateDecodeErrors::new(
            DecodeErrorStatus::CorruptData("unsupported zlib compression method"),
            Vec::new(),
        ));
    }
    if (u16::from(cmf) * 256 + u16::from(flg)) % 31 != 0 {
        return Err(InflateDecodeErrors::new(
            DecodeErrorStatus::CorruptData("zlib header checksum failed"),
            Vec::new(),
        ));
    }

    let mut offset = 2usize;
    if flg & 0b0010_0000 != 0 {
        offset += 4; // FDICT: skip the 4-byte preset dictionary id
    }
    let body = data.get(offset..).unwrap_or(&[]);
    let out = decode_deflate(body, limit)?;

    if options.strict_checksums() && data.len() >= offset + 4 {
        let trailer = &data[data.len() - 4..];
        let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let found = adler32(&out);
        if expected != found {
            debug!("Adler-32 mismatch: expected {expected:08x}, computed {found:08x}");
            return Err(InflateDecodeErrors::new(
                DecodeErrorStatus::MismatchedAdler(expected, found),
                out,
            ));
        }
    }
    Ok(out)
}
