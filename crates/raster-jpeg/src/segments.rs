//! JPEG marker/segment parser (C6).

use raster_core::{HuffmanTable, ZByteReader};

use crate::errors::JpegDecoderErrors;
use crate::tables::{default_ac_chrominance, default_ac_luminance, default_dc_chrominance, default_dc_luminance};

#[derive(Copy, Clone)]
pub struct Component {
    pub id: u8,
    pub h: u8,
    pub v: u8,
    pub quant_table: u8,
}

pub struct FrameInfo {
    pub width: usize,
    pub height: usize,
    pub components: Vec<Component>,
    pub progressive: bool,
}

impl FrameInfo {
    pub fn h_max(&self) -> u8 {
        self.components.iter().map(|c| c.h).max().unwrap_or(1)
    }

    pub fn v_max(&self) -> u8 {
        self.components.iter().map(|c| c.v).max().unwrap_or(1)
    }
}

pub struct ScanComponent {
    pub component_index: usize,
    pub dc_table: u8,
    pub ac_table: u8,
}

pub struct ScanHeader {
    pub components: Vec<ScanComponent>,
    pub ss: u8,
    pub se: u8,
    pub ah: u8,
    pub al: u8,
}

pub struct DecoderState {
    pub quant_tables: [Option<[i32; 64]>; 4],
    pub dc_tables: [Option<HuffmanTable>; 4],
    pub ac_tables: [Option<HuffmanTable>; 4],
    pub restart_interval: u16,
    pub adobe_transform: Option<u8>,
    pub jfif_seen: bool,
}

impl Default for DecoderState {
    /// Slots 0 (luminance) and 1 (chrominance) of both the DC and AC tables
    /// start out holding the JFIF Annex K default Huffman specifications, so
    /// a scan that relies on "the" default tables rather than its own DHT
    /// still decodes; an explicit DHT for a slot simply overwrites it.
    fn default() -> Self {
        let mut dc_tables: [Option<HuffmanTable>; 4] = Default::default();
        let mut ac_tables: [Option<HuffmanTable>; 4] = Default::default();
        dc_tables[0] = Some(default_dc_luminance());
        dc_tables[1] = Some(default_dc_chrominance());
        ac_tables[0] = Some(default_ac_luminance());
        ac_tables[1] = Some(default_ac_chrominance());
        DecoderState {
            quant_tables: Default::default(),
            dc_tables,
            ac_tables,
            restart_interval: 0,
            adobe_transform: None,
            jfif_seen: false,
        }
    }
}

pub fn parse_dqt(body: &[u8], state: &mut DecoderState) -> Result<(), JpegDecoderErrors> {
    let mut reader = ZByteReader::new(body);
    while reader.has(1) {
        let pq_tq = reader.get_u8();
        let precision = pq_tq >> 4;
        let dest = (pq_tq & 0x0F) as usize;
        if dest >= 4 {
            return Err(JpegDecoderErrors::GenericStatic("DQT destination out of range"));
        }
        let mut table = [0i32; 64];
        for slot in table.iter_mut() {
            *slot = if precision == 0 {
                reader.get_u8_err().map_err(JpegDecoderErrors::Truncated)? as i32
            } else {
                reader.get_u16_be_err().map_err(JpegDecoderErrors::Truncated)? as i32
            };
        }
        state.quant_tables[dest] = Some(table);
    }
    Ok(())
}

pub fn parse_dht(body: &[u8], state: &mut DecoderState) -> Result<(), JpegDecoderErrors> {
    let mut reader = ZByteReader::new(body);
    while reader.has(17) {
        let class_dest = reader.get_u8();
        let class = class_dest >> 4;
        let dest = (class_dest & 0x0F) as usize;
        if dest >= 4 {
            return Err(JpegDecoderErrors::GenericStatic("DHT destination out of range"));
        }
        let mut counts = [0u8; 16];
        for c in counts.iter_mut() {
            *c = reader.get_u8_err().map_err(JpegDecoderErrors::Truncated)?;
        }
        let mut symbols = Vec::new();
        let mut lengths = Vec::new();
        for (i, &count) in counts.iter().enumerate() {
            for _ in 0..count {
                let sym = reader.get_u8_err().map_err(JpegDecoderErrors::Truncated)?;
                symbols.push(sym as u16);
                lengths.push((i + 1) as u8);
            }
        }
        let table = HuffmanTable::build(&symbols, &lengths).map_err(JpegDecoderErrors::GenericStatic)?;
        if class == 0 {
            state.dc_tables[dest] = Some(table);
        } else {
            state.ac_tables[dest] = Some(table);
        }
    }
    Ok(())
}

pub fn parse_dri(body: &[u8]) -> Result<u16, JpegDecoderErrors> {
    let mut reader = ZByteReader::new(body);
    reader.get_u16_be_err().map_err(JpegDecoderErrors::Truncated)
}

pub fn parse_app0_jfif(body: &[u8]) -> bool {
    body.len() >= 5 && &body[0..5] == b"JFIF\0"
}

pub fn parse_app14_adobe(body: &[u8]) -> Option<u8> {
    if body.len() >= 12 && &body[0..5] == b"Adobe" {
        Some(body[11].wrapping_add(1))
    } else {
        None
    }
}

pub fn parse_sof(body: &[u8], progressive: bool) -> Result<FrameInfo, JpegDecoderErrors> {
    let mut reader = ZByteReader::new(body);
    let precision = reader.get_u8_err().map_err(JpegDecoderErrors::Truncated)?;
    if precision != 8 {
        return Err(JpegDecoderErrors::Unsupported("12-bit JPEG precision"));
    }
    let height = reader.get_u16_be_err().map_err(JpegDecoderErrors::Truncated)? as usize;
    let width = reader.get_u16_be_err().map_err(JpegDecoderErrors::Truncated)? as usize;
    if width == 0 || height == 0 {
        return Err(JpegDecoderErrors::GenericStatic("width or height is zero"));
    }
    let num_components = reader.get_u8_err().map_err(JpegDecoderErrors::Truncated)?;
    if !(1..=4).contains(&num_components) {
        return Err(JpegDecoderErrors::GenericStatic("component count must be 1..4"));
    }
    let mut components = Vec::with_capacity(num_components as usize);
    for _ in 0..num_components {
        let id = reader.get_u8_err().map_err(JpegDecoderErrors::Truncated)?;
        let hv = reader.get_u8_err().map_err(JpegDecoderErrors::Truncated)?;
        let quant_table = reader.get_u8_err().map_err(JpegDecoderErrors::Truncated)?;
        components.push(Component {
            id,
            h: hv >> 4,
            v: hv & 0x0F,
            quant_table,
        });
    }
    Ok(FrameInfo {
        width,
        height,
        components,
        progressive,
    })
}

pub fn parse_sos(body: &[u8], frame: &FrameInfo) -> Result<ScanHeader, JpegDecoderErrors> {
    let mut reader = ZByteReader::new(body);
    let count = reader.get_u8_err().map_err(JpegDecoderErrors::Truncated)?;
    let mut components = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let id = reader.get_u8_err().map_err(JpegDecoderErrors::Truncated)?;
        let tables = reader.get_u8_err().map_err(JpegDecoderErrors::Truncated)?;
        let component_index = frame
            .components
            .iter()
            .position(|c| c.id == id)
            .ok_or(JpegDecoderErrors::GenericStatic("scan references unknown component id"))?;
        components.push(ScanComponent {
            component_index,
            dc_table: tables >> 4,
            ac_table: tables & 0x0F,
        });
    }
    let ss = reader.get_u8_err().map_err(JpegDecoderErrors::Truncated)?;
    let se = reader.get_u8_err().map_err(JpegDecoderErrors::Truncated)?;
    let ah_al = reader.get_u8_err().map_err(JpegDecoderErrors::Truncated)?;
    Ok(ScanHeader {
        components,
        ss,
        se,
        ah: ah_al >> 4,
        al: ah_al & 0x0F,
    })
}
