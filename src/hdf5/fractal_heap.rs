//! Fractal heap: the variable-size heap backing "new style" group link
//! records once a group outgrows inline link messages.
//!
//! Scope is deliberately narrower than the full doubling-table
//! indirect-block tree: this decoder handles the common case of a root
//! *direct* block holding the link records inline, which covers groups
//! whose link set fits in one block. Deeper indirect-block trees (used only
//! once a group's link set is large enough to need multiple managed blocks)
//! surface as `H5Error::Unsupported`; see the Link Info handling in
//! `objheader.rs` for how a group falls back to this path only when it
//! lacks inline Link messages.

use crate::error::{H5Error, Result};
use crate::hdf5::objheader::LinkRecord;
use crate::io::ByteRangeReader;
use crate::reader::Hdf5Reader;

pub const HEAP_SIGNATURE: &[u8; 4] = b"FRHP";
pub const DIRECT_BLOCK_SIGNATURE: &[u8; 4] = b"FHDB";

#[derive(Debug, Clone)]
struct Header {
    max_heap_size_bits: u16,
    starting_num_rows_in_root: u16,
    root_block_address: u64,
    current_num_rows_in_root: u16,
}

fn offset_field_bytes(max_heap_size_bits: u16) -> usize {
    ((max_heap_size_bits as usize) + 7) / 8
}

fn parse_header<D: ByteRangeReader>(reader: &Hdf5Reader<D>, address: u64) -> Result<Header> {
    let os = reader.offset_size as usize;
    let ls = reader.length_size as usize;
    // Fixed prefix through "size of tiny objects in heap" + "number of tiny
    // objects in heap", all length-width fields, plus the leading fixed-size
    // scalars before them.
    let prefix_len = 4 + 1 + 2 + 2 + 1 + 4 + ls + os + ls + os + ls + ls + ls + ls + ls + ls + ls + ls;
    let mut head = reader.cursor(address, prefix_len)?;
    head.tag(HEAP_SIGNATURE)?;
    let _version = head.u8()?;
    let _heap_id_len = head.u16()?;
    let io_filter_len = head.u16()?;
    let flags = head.u8()?;
    let _max_managed_object_size = head.u32()?;
    let _next_huge_id = head.length()?;
    let _huge_btree_address = head.address()?;
    let _free_space_managed = head.length()?;
    let _free_space_manager_address = head.address()?;
    let _managed_space = head.length()?;
    let _allocated_space = head.length()?;
    let _iterator_offset = head.length()?;
    let _num_managed_objects = head.length()?;
    let _huge_size = head.length()?;
    let _num_huge = head.length()?;
    let _tiny_size = head.length()?;
    let _num_tiny = head.length()?;

    let tail_len = 2 + ls + ls + 2 + 2 + os + 2
        + if flags & 0x02 != 0 { io_filter_len as usize } else { 0 };
    let mut tail = reader.cursor(address + prefix_len as u64, tail_len)?;
    let _table_width = tail.u16()?;
    let _starting_block_size = tail.length()?;
    let _max_direct_block_size = tail.length()?;
    let max_heap_size_bits = tail.u16()?;
    let starting_num_rows_in_root = tail.u16()?;
    let root_block_address = tail.address()?;
    let current_num_rows_in_root = tail.u16()?;

    Ok(Header {
        max_heap_size_bits,
        starting_num_rows_in_root,
        root_block_address,
        current_num_rows_in_root,
    })
}

/// Decodes every link record reachable from the heap at `address`, within
/// the root-direct-block scope described above.
pub fn decode_link_records<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    address: u64,
) -> Result<Vec<LinkRecord>> {
    let header = parse_header(reader, address)?;
    if header.root_block_address == crate::reader::undefined_address(reader.offset_size) {
        return Ok(Vec::new());
    }
    if header.current_num_rows_in_root != 0 || header.starting_num_rows_in_root != 0 {
        return Err(H5Error::Unsupported(
            "fractal heaps with an indirect-block row tree are not supported",
        ));
    }
    decode_direct_block(reader, header.root_block_address, header.max_heap_size_bits)
}

fn decode_direct_block<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    address: u64,
    max_heap_size_bits: u16,
) -> Result<Vec<LinkRecord>> {
    let offset_bytes = offset_field_bytes(max_heap_size_bits);
    let header_len = 4 + 1 + reader.offset_size as usize + offset_bytes;
    let full = reader.cursor(address, reader.file_size().saturating_sub(address) as usize)?;
    let mut head = full;
    head.tag(DIRECT_BLOCK_SIGNATURE)?;
    let _version = head.u8()?;
    head.skip(reader.offset_size as usize)?; // heap header address
    head.skip(offset_bytes)?; // block offset within heap

    let mut records = Vec::new();
    loop {
        if head.remaining() < 8 {
            break;
        }
        match crate::hdf5::objheader::try_parse_link_record(&mut head) {
            Ok(Some(record)) => records.push(record),
            Ok(None) | Err(_) => break,
        }
    }
    let _ = header_len;
    Ok(records)
}
