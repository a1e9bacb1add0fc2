//! Data Layout message (type 0x08) and Fill Value message (type 0x05).

use crate::error::{H5Error, Result};
use crate::reader::Cursor;

const LAYOUT_COMPACT: u8 = 0;
const LAYOUT_CONTIGUOUS: u8 = 1;
const LAYOUT_CHUNKED: u8 = 2;

#[derive(Debug, Clone)]
pub enum DataLayout {
    Compact { data: Vec<u8> },
    Contiguous { address: u64, size: u64 },
    Chunked { btree_address: u64, chunk_dims: Vec<u64> },
}

pub fn parse(body: &mut Cursor) -> Result<DataLayout> {
    let version = body.u8()?;
    match version {
        3 => parse_v3(body),
        1 | 2 => parse_v1_v2(body, version),
        other => Err(H5Error::Unsupported(layout_version_message(other))),
    }
}

fn layout_version_message(v: u8) -> &'static str {
    match v {
        4 => "data layout version 4 is unsupported",
        _ => "unrecognized data layout version",
    }
}

fn parse_v3(body: &mut Cursor) -> Result<DataLayout> {
    let class = body.u8()?;
    match class {
        LAYOUT_COMPACT => {
            let size = body.u16()? as usize;
            let data = body.bytes(size)?;
            Ok(DataLayout::Compact { data })
        }
        LAYOUT_CONTIGUOUS => {
            let address = body.address()?;
            let size = body.length()?;
            Ok(DataLayout::Contiguous { address, size })
        }
        LAYOUT_CHUNKED => {
            let dimensionality = body.u8()? as usize;
            let btree_address = body.address()?;
            let mut chunk_dims = Vec::with_capacity(dimensionality.saturating_sub(1));
            // dimensionality includes the trailing element-size "dimension".
            for _ in 0..dimensionality.saturating_sub(1) {
                chunk_dims.push(body.u32()? as u64);
            }
            let _element_size = body.u32()?;
            Ok(DataLayout::Chunked {
                btree_address,
                chunk_dims,
            })
        }
        _ => Err(H5Error::Unsupported("unrecognized data layout class")),
    }
}

/// Versions 1 and 2 share a format that differs from v3 mainly in carrying
/// an explicit dimensionality byte and reserved padding before the class
/// byte; both are folded into the same in-memory [`DataLayout`].
fn parse_v1_v2(body: &mut Cursor, _version: u8) -> Result<DataLayout> {
    let dimensionality = body.u8()? as usize;
    let class = body.u8()?;
    body.skip(5)?; // reserved
    match class {
        LAYOUT_COMPACT => {
            for _ in 0..dimensionality {
                let _dim = body.u32()?;
            }
            let size = body.u32()? as usize;
            let data = body.bytes(size)?;
            Ok(DataLayout::Compact { data })
        }
        LAYOUT_CONTIGUOUS => {
            let address = body.address()?;
            let mut total: u64 = 1;
            for _ in 0..dimensionality {
                total *= body.u32()? as u64;
            }
            Ok(DataLayout::Contiguous { address, size: total })
        }
        LAYOUT_CHUNKED => {
            let btree_address = body.address()?;
            let mut chunk_dims = Vec::with_capacity(dimensionality.saturating_sub(1));
            for _ in 0..dimensionality.saturating_sub(1) {
                chunk_dims.push(body.u32()? as u64);
            }
            let _element_size = body.u32()?;
            Ok(DataLayout::Chunked {
                btree_address,
                chunk_dims,
            })
        }
        _ => Err(H5Error::Unsupported("unrecognized data layout class")),
    }
}

/// Parses a Fill Value message (versions 2 and 3), returning the raw fill
/// bytes if one is defined.
pub fn parse_fill_value(body: &mut Cursor) -> Result<Option<Vec<u8>>> {
    let version = body.u8()?;
    match version {
        2 => {
            let _space_allocation_time = body.u8()?;
            let _fill_value_write_time = body.u8()?;
            let defined = body.u8()?;
            if defined == 0 {
                return Ok(None);
            }
            let size = body.u32()? as usize;
            Ok(Some(body.bytes(size)?))
        }
        3 => {
            let _space_allocation_time = body.u8()?;
            let _fill_value_write_time = body.u8()?;
            let flags = body.u8()?;
            let defined = flags & 0x20 != 0;
            if !defined {
                return Ok(None);
            }
            let size = body.u32()? as usize;
            if size == 0 {
                return Ok(None);
            }
            Ok(Some(body.bytes(size)?))
        }
        other => Err(H5Error::Unsupported(fill_value_version_message(other))),
    }
}

fn fill_value_version_message(v: u8) -> &'static str {
    match v {
        1 => "fill value version 1 is unsupported",
        _ => "unrecognized fill value version",
    }
}
