//! Filter pipeline message (type 0x0B) and the filter inverses applied to
//! chunk bytes on read.
//!
//! Deflate is inverted via `flate2`; shuffle is a pure byte de-interleaving
//! permutation with no decompression involved.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::error::{H5Error, Result};
use crate::reader::Cursor;

pub const FILTER_DEFLATE: u16 = 1;
pub const FILTER_SHUFFLE: u16 = 2;

#[derive(Debug, Clone)]
pub struct FilterDescriptor {
    pub id: u16,
    pub client_data: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    pub filters: Vec<FilterDescriptor>,
}

pub fn parse_pipeline(body: &mut Cursor) -> Result<FilterPipeline> {
    let version = body.u8()?;
    let num_filters = body.u8()? as usize;
    match version {
        1 => {
            body.skip(6)?; // reserved
        }
        2 => {}
        other => return Err(H5Error::Unsupported(pipeline_version_message(other))),
    }

    let mut filters = Vec::with_capacity(num_filters);
    for _ in 0..num_filters {
        let id = body.u16()?;
        let name_len = if version == 1 || id >= 256 { body.u16()? as usize } else { 0 };
        let _flags = body.u16()?;
        let num_client_values = body.u16()? as usize;
        if name_len > 0 {
            let _name = body.fixed_str(name_len)?;
        }
        let mut client_data = Vec::with_capacity(num_client_values);
        for _ in 0..num_client_values {
            client_data.push(body.u32()?);
        }
        if version == 1 && num_client_values % 2 == 1 {
            body.skip(4)?; // padding to keep the entry 8-byte aligned
        }
        filters.push(FilterDescriptor { id, client_data });
    }

    Ok(FilterPipeline { filters })
}

fn pipeline_version_message(v: u8) -> &'static str {
    match v {
        0 => "filter pipeline version 0 is unsupported",
        _ => "unrecognized filter pipeline version",
    }
}

/// Applies the pipeline's inverses in reverse application order, honoring
/// `filter_mask` (bit `i` set disables filter `i` for this chunk).
pub fn unfilter(pipeline: &FilterPipeline, filter_mask: u32, element_size: usize, data: Vec<u8>) -> Result<Vec<u8>> {
    let mut buf = data;
    for (i, filter) in pipeline.filters.iter().enumerate().rev() {
        if filter_mask & (1 << i) != 0 {
            continue;
        }
        buf = match filter.id {
            FILTER_DEFLATE => inflate(&buf)?,
            FILTER_SHUFFLE => unshuffle(&buf, element_size),
            other => return Err(H5Error::UnsupportedFilter(other)),
        };
    }
    Ok(buf)
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| H5Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    Ok(out)
}

/// Restores per-element byte order from the shuffled layout, where
/// byte-position `i` of every element is grouped before byte-position
/// `i + 1` of any element.
fn unshuffle(data: &[u8], element_size: usize) -> Vec<u8> {
    if element_size <= 1 || data.is_empty() {
        return data.to_vec();
    }
    let count = data.len() / element_size;
    let mut out = vec![0u8; data.len()];
    for elem in 0..count {
        for byte in 0..element_size {
            out[elem * element_size + byte] = data[byte * count + elem];
        }
    }
    out
}
