//! Entropy decoding (C7): five tagged block decoders operating on one 8x8
//! coefficient block at a time, all sharing the same building blocks — the
//! MSB-first [`JpegBitReader`], a per-table [`HuffmanTable`], and the
//! zig-zag-to-natural map.
//!
//! Decoded coefficients are left in the quantization domain (no `Q[i]`
//! multiply here); dequantization happens once, uniformly for baseline and
//! progressive alike, in `idct.rs` right before the inverse transform. That
//! is a deliberate departure from a literal sequential decoder, which would
//! dequantize the DC/AC coefficients as they're read — storing raw values
//! here lets the same reconstruction step serve both scan styles.

use crate::bitreader::{extend, JpegBitReader};
use crate::tables::ZIGZAG_TO_NATURAL;
use raster_core::HuffmanTable;

pub type Block = [i32; 64];

/// Sequential (baseline) block: full DC + AC decode in one pass.
pub fn decode_whole(
    bits: &mut JpegBitReader,
    dc_table: &HuffmanTable,
    ac_table: &HuffmanTable,
    dc_pred: &mut i32,
    block: &mut Block,
) -> Result<(), &'static str> {
    decode_dc(bits, dc_table, dc_pred, block)?;
    let mut k = 1usize;
    while k <= 63 {
        let rs = ac_table.decode_symbol(|| bits.get_bit())? as u32;
        let run = (rs >> 4) as usize;
        let size = rs & 0x0F;
        if size == 0 {
            if run == 15 {
                k += 16; // ZRL: 16 zero coefficients, no EOB
                continue;
            }
            break; // EOB: rest of the block is already zero
        }
        k += run;
        if k > 63 {
            return Err("AC coefficient run overruns block");
        }
        let value = extend(bits.get_bits(size), size);
        block[ZIGZAG_TO_NATURAL[k]] = value;
        k += 1;
    }
    Ok(())
}

fn decode_dc(
    bits: &mut JpegBitReader,
    dc_table: &HuffmanTable,
    dc_pred: &mut i32,
    block: &mut Block,
) -> Result<(), &'static str> {
    let size = dc_table.decode_symbol(|| bits.get_bit())? as u32;
    let diff = if size == 0 { 0 } else { extend(bits.get_bits(size), size) };
    *dc_pred += diff;
    block[0] = *dc_pred;
    Ok(())
}

/// Progressive DC, first scan (`Ah == 0`): like the DC half of [`decode_whole`],
/// with the reconstructed difference left-shifted by `al`.
pub fn decode_dc_first(
    bits: &mut JpegBitReader,
    dc_table: &HuffmanTable,
    al: u8,
    dc_pred: &mut i32,
    block: &mut Block,
) -> Result<(), &'static str> {
    let size = dc_table.decode_symbol(|| bits.get_bit())? as u32;
    let diff = if size == 0 { 0 } else { extend(bits.get_bits(size), size) };
    *dc_pred += diff;
    block[0] = *dc_pred << al;
    Ok(())
}

/// Progressive DC, refinement scan (`Ah != 0`): one correction bit, no
/// Huffman code at all.
pub fn decode_dc_refine(bits: &mut JpegBitReader, al: u8, block: &mut Block) -> Result<(), &'static str> {
    block[0] += (bits.get_bit() as i32) << al;
    Ok(())
}

/// Progressive AC, first scan (`Ah == 0`) over spectral band `[ss, se]`.
/// `eob_run` persists across calls (and across blocks of the same scan).
pub fn decode_ac_first(
    bits: &mut JpegBitReader,
    ac_table: &HuffmanTable,
    ss: u8,
    se: u8,
    al: u8,
    eob_run: &mut u32,
    block: &mut Block,
) -> Result<(), &'static str> {
    if *eob_run > 0 {
        *eob_run -= 1;
        return Ok(());
    }
    let mut k = ss as usize;
    while k <= se as usize {
        let rs = ac_table.decode_symbol(|| bits.get_bit())? as u32;
        let run = (rs >> 4) as usize;
        let size = rs & 0x0F;
        if size == 0 {
            if run < 15 {
                let mut run_len = 1u32 << run;
                if run > 0 {
                    run_len += bits.get_bits(run as u32);
                }
                *eob_run = run_len - 1;
                break;
            }
            k += 16; // ZRL
            continue;
        }
        k += run;
        if k > se as usize {
            return Err("AC coefficient run overruns spectral band");
        }
        let value = extend(bits.get_bits(size), size);
        block[ZIGZAG_TO_NATURAL[k]] = value << al;
        k += 1;
    }
    Ok(())
}

/// Progressive AC, refinement scan (`Ah != 0`) over spectral band `[ss, se]`.
/// Non-zero coefficients already present receive a correction bit
/// (`±(1 << al)`); zero slots are either skipped (consuming `run`) or
/// become newly non-zero with a sign read from the stream. An EOB run, once
/// started, still walks the remaining band applying correction bits to
/// existing non-zero coefficients — it just stops placing new ones.
pub fn decode_ac_refine(
    bits: &mut JpegBitReader,
    ac_table: &HuffmanTable,
    ss: u8,
    se: u8,
    al: u8,
    eob_run: &mut u32,
    block: &mut Block,
) -> Result<(), &'static str> {
    let p1 = 1i32 << al;
    let m1 = -p1;
    let mut k = ss as usize;

    if *eob_run == 0 {
        while k <= se as usize {
            let rs = ac_table.decode_symbol(|| bits.get_bit())? as u32;
            let run_code = (rs >> 4) as usize;
            let size = rs & 0x0F;
            let mut run = run_code;
            let mut new_value = 0i32;
            let mut placing = false;

            if size == 0 {
                if run_code < 15 {
                    let mut run_len = 1u32 << run_code;
                    if run_code > 0 {
                        run_len += bits.get_bits(run_code as u32);
                    }
                    *eob_run = run_len;
                    break;
                }
                // run_code == 15: ZRL, skip 16 zero-history slots below.
                run = 16;
            } else {
                new_value = if bits.get_bit() == 1 { p1 } else { m1 };
                placing = true;
            }

            while k <= se as usize {
                let natural = ZIGZAG_TO_NATURAL[k];
                if block[natural] != 0 {
                    refine_nonzero(bits, block, natural, p1);
                } else {
                    if run == 0 {
                        if placing {
                            block[natural] = new_value;
                        }
                        k += 1;
                        break;
                    }
                    run -= 1;
                }
                k += 1;
            }
        }
    }

    if *eob_run > 0 {
        while k <= se as usize {
            let natural = ZIGZAG_TO_NATURAL[k];
            if block[natural] != 0 {
                refine_nonzero(bits, block, natural, p1);
            }
            k += 1;
        }
        *eob_run -= 1;
    }

    Ok(())
}

fn refine_nonzero(bits: &mut JpegBitReader, block: &mut Block, natural: usize, p1: i32) {
    if bits.get_bit() == 1 && (block[natural] & p1) == 0 {
        block[natural] += if block[natural] > 0 { p1 } else { -p1 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_symbol_table(symbol: u16) -> HuffmanTable {
        // One symbol, one bit code: trivially decodable from an all-zero bitstream.
        HuffmanTable::build(&[symbol], &[1]).unwrap()
    }

    #[test]
    fn decode_whole_all_zero_stream_is_all_eob() {
        let dc_table = single_symbol_table(0); // DC size-category 0 => diff 0
        let ac_table = single_symbol_table(0); // AC (run=0, size=0) => EOB
        let data = [0u8; 4];
        let mut bits = JpegBitReader::new(&data, 0);
        let mut dc_pred = 0i32;
        let mut block = [0i32; 64];
        decode_whole(&mut bits, &dc_table, &ac_table, &mut dc_pred, &mut block).unwrap();
        assert_eq!(block, [0i32; 64]);
        assert_eq!(dc_pred, 0);
    }

    #[test]
    fn dc_refine_adds_single_bit_at_al() {
        let mut block = [0i32; 64];
        block[0] = 4;
        let data = [0b1000_0000u8];
        let mut bits = JpegBitReader::new(&data, 0);
        decode_dc_refine(&mut bits, 1, &mut block).unwrap();
        assert_eq!(block[0], 6); // 4 + (1 << 1)
    }

    #[test]
    fn ac_refine_skips_existing_nonzero_and_applies_correction() {
        // Band [1, 2]; slot 1 already non-zero (positive), correction bit set.
        let mut block = [0i32; 64];
        block[ZIGZAG_TO_NATURAL[1]] = 2;
        let ac_table = single_symbol_table(0x00); // (run=0, size=0) => immediate EOB run start
        let data = [0u8; 2];
        let mut bits = JpegBitReader::new(&data, 0);
        let mut eob_run = 0u32;
        decode_ac_refine(&mut bits, &ac_table, 1, 2, 1, &mut eob_run, &mut block).unwrap();
        // run_code 0 => eob_run = 1<<0 = 1, no extra bits; this block just
        // applies corrections to already-non-zero slots in [1,2].
        assert_eq!(block[ZIGZAG_TO_NATURAL[1]], 2);
    }
}
