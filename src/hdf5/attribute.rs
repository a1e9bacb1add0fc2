//! Attribute message (type 0x0C, versions 1-3): a name, dataspace,
//! datatype, and inline raw value attached to an object header.

use crate::error::{H5Error, Result};
use crate::hdf5::datatype::Datatype;
use crate::hdf5::dataspace::Dataspace;
use crate::reader::Cursor;

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub datatype: Datatype,
    pub dataspace: Dataspace,
    pub raw_value: Vec<u8>,
}

pub fn parse(body: &mut Cursor) -> Result<Attribute> {
    let version = body.u8()?;
    match version {
        1 => parse_v1(body),
        2 | 3 => parse_v2_v3(body, version),
        other => Err(H5Error::Unsupported(version_message(other))),
    }
}

fn version_message(v: u8) -> &'static str {
    match v {
        0 => "attribute version 0 is unsupported",
        _ => "unrecognized attribute version",
    }
}

fn round_up_8(n: usize) -> usize {
    (n + 7) & !7
}

fn parse_v1(body: &mut Cursor) -> Result<Attribute> {
    body.skip(1)?; // reserved
    let name_size = body.u16()? as usize;
    let datatype_size = body.u16()? as usize;
    let dataspace_size = body.u16()? as usize;

    let name = body.fixed_str(round_up_8(name_size))?;
    let mut dt_cursor = body.sub_cursor(round_up_8(datatype_size))?;
    let datatype = crate::hdf5::datatype::parse(&mut dt_cursor)?;
    let mut ds_cursor = body.sub_cursor(round_up_8(dataspace_size))?;
    let dataspace = crate::hdf5::dataspace::parse(&mut ds_cursor)?;

    let raw_value = body.bytes(body.remaining())?;

    Ok(Attribute {
        name,
        datatype,
        dataspace,
        raw_value,
    })
}

fn parse_v2_v3(body: &mut Cursor, version: u8) -> Result<Attribute> {
    let _flags = body.u8()?;
    let name_size = body.u16()? as usize;
    let datatype_size = body.u16()? as usize;
    let dataspace_size = body.u16()? as usize;
    if version == 3 {
        let _char_encoding = body.u8()?;
    }

    let name = body.fixed_str(name_size)?;
    let mut dt_cursor = body.sub_cursor(datatype_size)?;
    let datatype = crate::hdf5::datatype::parse(&mut dt_cursor)?;
    let mut ds_cursor = body.sub_cursor(dataspace_size)?;
    let dataspace = crate::hdf5::dataspace::parse(&mut ds_cursor)?;

    let raw_value = body.bytes(body.remaining())?;

    Ok(Attribute {
        name,
        datatype,
        dataspace,
        raw_value,
    })
}
