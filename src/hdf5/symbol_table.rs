//! Symbol table nodes (`SNOD`): the leaves referenced by a group B-tree,
//! each holding a flat list of symbol table entries.

use crate::error::Result;
use crate::io::ByteRangeReader;
use crate::reader::Hdf5Reader;

pub const SIGNATURE: &[u8; 4] = b"SNOD";

#[derive(Debug, Clone)]
pub struct SymbolTableEntry {
    pub link_name_offset: u64,
    pub object_header_address: u64,
}

/// Parses the symbol table node at `address`, whose entries name the
/// children reachable from one group-B-tree leaf's heap-name offsets.
pub fn parse<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    address: u64,
) -> Result<Vec<SymbolTableEntry>> {
    let mut head = reader.cursor(address, 8)?;
    head.tag(SIGNATURE)?;
    let _version = head.u8()?;
    head.skip(1)?; // reserved
    let number_of_symbols = head.u16()? as usize;

    // Each entry: link_name_offset + object_header_address (addresses) +
    // cache_type(4) + reserved(4) + btree_address + heap_address (addresses).
    let entry_size = (reader.offset_size as usize) * 4 + 8;
    let mut body = reader.cursor(address + 8, entry_size * number_of_symbols)?;
    let mut entries = Vec::with_capacity(number_of_symbols);
    for _ in 0..number_of_symbols {
        let link_name_offset = body.address()?;
        let object_header_address = body.address()?;
        let _cache_type = body.u32()?;
        body.skip(4)?; // reserved
        let _address_of_btree = body.address()?;
        let _address_of_name_heap = body.address()?;
        entries.push(SymbolTableEntry {
            link_name_offset,
            object_header_address,
        });
    }
    Ok(entries)
}
