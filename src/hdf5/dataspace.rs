//! Dataspace message (type 0x01): rank, per-dimension extents, and
//! optional per-dimension maximum extents.

use crate::error::{H5Error, Result};
use crate::reader::Cursor;

#[derive(Debug, Clone)]
pub struct Dataspace {
    pub dims: Vec<u64>,
    pub max_dims: Vec<u64>,
}

impl Dataspace {
    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

pub fn parse(body: &mut Cursor) -> Result<Dataspace> {
    let version = body.u8()?;
    let rank = body.u8()? as usize;
    let flags = body.u8()?;
    match version {
        1 => {
            body.skip(5)?; // reserved
        }
        2 => {
            let _dataspace_type = body.u8()?;
        }
        other => return Err(H5Error::Unsupported(version_message(other))),
    }

    let mut dims = Vec::with_capacity(rank);
    for _ in 0..rank {
        dims.push(body.length()?);
    }

    let has_max_dims = flags & 0x01 != 0;
    let max_dims = if has_max_dims {
        let mut v = Vec::with_capacity(rank);
        for _ in 0..rank {
            v.push(body.length()?);
        }
        v
    } else {
        dims.clone()
    };

    Ok(Dataspace { dims, max_dims })
}

fn version_message(v: u8) -> &'static str {
    match v {
        0 => "dataspace version 0 is unsupported",
        _ => "unrecognized dataspace version",
    }
}
