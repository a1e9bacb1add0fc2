//! Group child resolution: the three shapes a group's children can be
//! stored in, per this crate's path-resolution contract.
//!
//! - "Old style": a Symbol Table message points at a group B-tree v1 plus a
//!   local heap of names.
//! - "New style", inline: a Link Info message with Link messages already
//!   attached directly to the object header.
//! - "New style", dense: a Link Info message pointing at a fractal heap of
//!   link records, with a B-tree v2 name index (not walked here; this
//!   crate linearly scans the heap's direct block instead, see
//!   `fractal_heap.rs`).

use crate::error::{H5Error, Result};
use crate::hdf5::objheader::{LinkInfoPointers, ObjectHeader};
use crate::io::ByteRangeReader;
use crate::reader::{undefined_address, Hdf5Reader};

pub fn parse_link_info(body: &mut crate::reader::Cursor) -> Result<LinkInfoPointers> {
    let version = body.u8()?;
    if version != 0 {
        return Err(H5Error::Unsupported("link info version other than 0"));
    }
    let flags = body.u8()?;
    if flags & 0x01 != 0 {
        body.skip(8)?; // max creation index
    }
    let fractal_heap_address = body.address()?;
    let name_btree_address = body.address()?;
    if flags & 0x02 != 0 {
        body.skip(body.offset_width())?; // creation order btree address
    }
    Ok(LinkInfoPointers {
        fractal_heap_address,
        name_btree_address,
    })
}

/// Resolves `name` to a child object-header address within `header`,
/// trying each of the three storage shapes in turn.
pub fn resolve_child<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    header: &ObjectHeader,
    name: &str,
) -> Result<Option<u64>> {
    if let Some(symtab) = &header.symbol_table {
        let heap = crate::hdf5::heap::parse(reader, symtab.heap_address)?;
        let entries = crate::hdf5::btree::collect_group_entries(reader, symtab.btree_address)?;
        for entry in entries {
            let nodes = crate::hdf5::symbol_table::parse(reader, entry.child_pointer)?;
            for node in nodes {
                let candidate = heap.name_at(reader, node.link_name_offset)?;
                if candidate == name {
                    return Ok(Some(node.object_header_address));
                }
            }
        }
        return Ok(None);
    }

    for link in &header.links {
        if link.name == name {
            return Ok(Some(link.target_address));
        }
    }

    if let Some(info) = &header.link_info {
        if info.fractal_heap_address != undefined_address(reader.offset_size) {
            let records = crate::hdf5::fractal_heap::decode_link_records(reader, info.fractal_heap_address)?;
            for record in records {
                if record.name == name {
                    return Ok(Some(record.target_address));
                }
            }
        }
    }

    Ok(None)
}
