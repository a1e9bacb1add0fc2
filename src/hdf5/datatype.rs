//! Datatype message (type 0x03): the subset this crate resolves is fixed-
//! point, floating-point, and fixed-length string types, which cover the
//! scenarios in scope. Compound, reference, enum, and variable-length
//! classes are explicitly out of scope and surface as `unsupported-format`.

use crate::error::{H5Error, Result};
use crate::reader::Cursor;

const CLASS_FIXED_POINT: u8 = 0;
const CLASS_FLOATING_POINT: u8 = 1;
const CLASS_STRING: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Fixed,
    Float,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy)]
pub struct Datatype {
    pub class: Class,
    pub size: usize,
    pub signed: bool,
    pub endian: Endian,
}

pub fn parse(body: &mut Cursor) -> Result<Datatype> {
    let class_and_version = body.u8()?;
    let version = class_and_version >> 4;
    let class_id = class_and_version & 0x0F;
    if version == 0 {
        return Err(H5Error::Unsupported("datatype version 0 is unsupported"));
    }
    let bits0 = body.u8()?;
    let _bits8 = body.u8()?;
    let _bits16 = body.u8()?;
    let size = body.u32()? as usize;

    let class = match class_id {
        CLASS_FIXED_POINT => Class::Fixed,
        CLASS_FLOATING_POINT => Class::Float,
        CLASS_STRING => Class::String,
        _ => return Err(H5Error::Unsupported("unsupported datatype class")),
    };

    // The string class bit field encodes padding type and character set, not
    // byte order or sign; a fixed-length string has neither.
    let endian = if class != Class::String && bits0 & 0x01 != 0 {
        Endian::Big
    } else {
        Endian::Little
    };
    let signed = class == Class::Fixed && (bits0 & 0x08 != 0);

    match class {
        Class::Fixed => {
            let _bit_offset = body.u16()?;
            let _bit_precision = body.u16()?;
        }
        Class::Float => {
            let _bit_offset = body.u16()?;
            let _bit_precision = body.u16()?;
            let _exponent_location = body.u8()?;
            let _exponent_size = body.u8()?;
            let _mantissa_location = body.u8()?;
            let _mantissa_size = body.u8()?;
            let _exponent_bias = body.u32()?;
        }
        Class::String => {}
    }

    Ok(Datatype {
        class,
        size,
        signed,
        endian,
    })
}
