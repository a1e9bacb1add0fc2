//! Object header parsing (v1 and v2) and message dispatch.
//!
//! Message type ids and the v1/v2 framing differences follow the component
//! table in this crate's design notes; byte layouts for the messages
//! themselves (dataspace, datatype, layout, filter pipeline) live in their
//! own sibling modules and are invoked from the dispatch table below.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{H5Error, Result};
use crate::hdf5::attribute::Attribute;
use crate::hdf5::datatype::Datatype;
use crate::hdf5::dataspace::Dataspace;
use crate::hdf5::filter::FilterPipeline;
use crate::hdf5::layout::DataLayout;
use crate::io::ByteRangeReader;
use crate::reader::{undefined_address, Cursor, Hdf5Reader};

const TYPE_NIL: u16 = 0x00;
const TYPE_DATASPACE: u16 = 0x01;
const TYPE_LINK_INFO: u16 = 0x02;
const TYPE_DATATYPE: u16 = 0x03;
const TYPE_FILL_VALUE: u16 = 0x05;
const TYPE_LINK: u16 = 0x06;
const TYPE_DATA_LAYOUT: u16 = 0x08;
const TYPE_FILTER_PIPELINE: u16 = 0x0B;
const TYPE_ATTRIBUTE: u16 = 0x0C;
const TYPE_CONTINUATION: u16 = 0x10;
const TYPE_SYMBOL_TABLE: u16 = 0x11;

const OHDR_SIGNATURE: &[u8; 4] = b"OHDR";
const CONTINUATION_BLOCK_SIGNATURE: &[u8; 4] = b"OCHK";

#[derive(Debug, Clone, Copy)]
pub struct LinkInfoPointers {
    pub fractal_heap_address: u64,
    pub name_btree_address: u64,
}

#[derive(Debug, Clone)]
pub struct SymbolTablePointers {
    pub btree_address: u64,
    pub heap_address: u64,
}

/// A single group link: a name and the address of the object it resolves
/// to. Used for both inline Link messages and fractal-heap-backed link
/// records.
#[derive(Debug, Clone)]
pub struct LinkRecord {
    pub name: String,
    pub target_address: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectHeader {
    pub dataspace: Option<Dataspace>,
    pub datatype: Option<Datatype>,
    pub layout: Option<DataLayout>,
    pub fill_value: Option<Vec<u8>>,
    pub filters: Option<FilterPipeline>,
    pub links: Vec<LinkRecord>,
    pub link_info: Option<LinkInfoPointers>,
    pub symbol_table: Option<SymbolTablePointers>,
    pub attributes: HashMap<String, Attribute>,
}

/// A raw, undispatched message: header fields plus its body bytes.
struct RawMessage {
    msg_type: u16,
    flags: u8,
    body: Vec<u8>,
}

pub fn parse<D: ByteRangeReader>(reader: &Hdf5Reader<D>, address: u64) -> Result<ObjectHeader> {
    let probe = reader.cursor(address, 4)?;
    if probe.peek_tag(OHDR_SIGNATURE) {
        parse_v2(reader, address)
    } else {
        parse_v1(reader, address)
    }
}

fn parse_v1<D: ByteRangeReader>(reader: &Hdf5Reader<D>, address: u64) -> Result<ObjectHeader> {
    let mut head = reader.cursor(address, 12)?;
    let version = head.u8()?;
    if version != 1 {
        return Err(H5Error::Format("expected object header version 1"));
    }
    head.skip(1)?; // reserved
    let total_messages = head.u16()? as usize;
    let _reference_count = head.u32()?;
    let header_size = head.u32()? as usize;

    let mut messages = Vec::with_capacity(total_messages);
    let mut blocks = vec![(address + 12, header_size)];
    while let Some((block_address, block_len)) = blocks.pop() {
        if messages.len() >= total_messages {
            break;
        }
        let mut cursor = reader.cursor(block_address, block_len)?;
        while cursor.remaining() >= 8 && messages.len() < total_messages {
            let msg_type = cursor.u16()?;
            let size = cursor.u16()? as usize;
            let flags = cursor.u8()?;
            cursor.skip(3)?; // reserved
            let body = cursor.bytes(size)?;
            if msg_type == TYPE_CONTINUATION {
                let mut body_cursor = Cursor::from_bytes(body, reader.offset_size, reader.length_size);
                let next_address = body_cursor.address()?;
                let next_length = body_cursor.length()? as usize;
                blocks.push((next_address, next_length));
            } else {
                messages.push(RawMessage {
                    msg_type,
                    flags,
                    body,
                });
            }
        }
    }

    dispatch_all(reader, messages)
}

fn parse_v2<D: ByteRangeReader>(reader: &Hdf5Reader<D>, address: u64) -> Result<ObjectHeader> {
    let mut head = reader.cursor(address, 6)?;
    head.tag(OHDR_SIGNATURE)?;
    let version = head.u8()?;
    if version != 2 {
        return Err(H5Error::Format("expected object header version 2"));
    }
    let flags = head.u8()?;

    let times_len = if flags & 0x20 != 0 { 16 } else { 0 };
    let phase_change_len = if flags & 0x10 != 0 { 4 } else { 0 };
    let chunk0_size_width = 1usize << (flags & 0x03);

    let mut extra = reader.cursor(address + 6, times_len + phase_change_len + chunk0_size_width)?;
    extra.skip(times_len)?;
    extra.skip(phase_change_len)?;
    let chunk0_size = extra.uint_of_width(chunk0_size_width as u8)? as usize;

    let chunk0_start = address + 6 + times_len as u64 + phase_change_len as u64 + chunk0_size_width as u64;

    let mut messages = Vec::new();
    let mut blocks = vec![(chunk0_start, chunk0_size, true)];
    while let Some((block_address, block_len, is_first)) = blocks.pop() {
        let prefix = if is_first { 0 } else { 4 };
        let mut cursor = reader.cursor(block_address, block_len)?;
        if !is_first {
            cursor.tag(CONTINUATION_BLOCK_SIGNATURE)?;
        }
        // Reserve the trailing 4-byte checksum.
        let usable = block_len.saturating_sub(prefix + 4);
        let consumed_before = cursor.position();
        while cursor.position() - consumed_before + 4 <= usable {
            if cursor.remaining() < 4 {
                break;
            }
            let msg_type = cursor.u8()? as u16;
            let size = cursor.u16()? as usize;
            let msg_flags = cursor.u8()?;
            if flags & 0x04 != 0 {
                cursor.skip(2)?; // creation order
            }
            let body = cursor.bytes(size)?;
            if msg_type == TYPE_CONTINUATION {
                let mut body_cursor = Cursor::from_bytes(body, reader.offset_size, reader.length_size);
                let next_address = body_cursor.address()?;
                let next_length = body_cursor.length()? as usize;
                blocks.push((next_address, next_length, false));
            } else {
                messages.push(RawMessage {
                    msg_type,
                    flags: msg_flags,
                    body,
                });
            }
        }
    }

    dispatch_all(reader, messages)
}

fn dispatch_all<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    messages: Vec<RawMessage>,
) -> Result<ObjectHeader> {
    let mut header = ObjectHeader::default();
    for msg in messages {
        dispatch_one(reader, &mut header, msg)?;
    }
    Ok(header)
}

fn dispatch_one<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    header: &mut ObjectHeader,
    msg: RawMessage,
) -> Result<()> {
    let mut body = Cursor::from_bytes(msg.body, reader.offset_size, reader.length_size);
    match msg.msg_type {
        TYPE_NIL => {}
        TYPE_DATASPACE => {
            header.dataspace = Some(crate::hdf5::dataspace::parse(&mut body)?);
        }
        TYPE_LINK_INFO => {
            header.link_info = Some(crate::hdf5::group::parse_link_info(&mut body)?);
        }
        TYPE_DATATYPE => {
            header.datatype = Some(crate::hdf5::datatype::parse(&mut body)?);
        }
        TYPE_FILL_VALUE => {
            header.fill_value = crate::hdf5::layout::parse_fill_value(&mut body)?;
        }
        TYPE_LINK => {
            if let Some(record) = try_parse_link_record(&mut body)? {
                header.links.push(record);
            }
        }
        TYPE_DATA_LAYOUT => {
            header.layout = Some(crate::hdf5::layout::parse(&mut body)?);
        }
        TYPE_FILTER_PIPELINE => {
            header.filters = Some(crate::hdf5::filter::parse_pipeline(&mut body)?);
        }
        TYPE_ATTRIBUTE => {
            let attr = crate::hdf5::attribute::parse(&mut body)?;
            header.attributes.insert(attr.name.clone(), attr);
        }
        TYPE_SYMBOL_TABLE => {
            let btree_address = body.address()?;
            let heap_address = body.address()?;
            header.symbol_table = Some(SymbolTablePointers {
                btree_address,
                heap_address,
            });
        }
        TYPE_CONTINUATION => unreachable!("continuation messages are resolved before dispatch"),
        other => {
            let fail_if_unknown = msg.flags & 0x08 != 0;
            if fail_if_unknown {
                return Err(H5Error::Unsupported("unknown object header message type"));
            }
            trace!(msg_type = other, "skipping unrecognized message");
        }
    }
    Ok(())
}

/// Parses one Link message body (version 1, the only version this crate
/// writes out... and the only one it reads back): link-type flags, optional
/// creation order / link type byte, name, and a hard (address) target.
/// Returns `Ok(None)` for link types this crate doesn't resolve to an
/// address (soft links, external links).
pub fn try_parse_link_record(body: &mut Cursor) -> Result<Option<LinkRecord>> {
    let version = body.u8()?;
    if version != 1 {
        return Err(H5Error::Unsupported("link message version other than 1"));
    }
    let flags = body.u8()?;
    let link_type = if flags & 0x08 != 0 { body.u8()? } else { 0 };
    if flags & 0x04 != 0 {
        body.skip(8)?; // creation order
    }
    if flags & 0x10 != 0 {
        body.skip(1)?; // link name character set
    }
    let name_len_size = 1usize << (flags & 0x03);
    let name_len = body.uint_of_width(name_len_size as u8)? as usize;
    let name = body.fixed_str(name_len)?;

    match link_type {
        0 => {
            let target_address = body.address()?;
            if target_address == undefined_address(8) {
                return Ok(None);
            }
            Ok(Some(LinkRecord {
                name,
                target_address,
            }))
        }
        _ => Ok(None),
    }
}
