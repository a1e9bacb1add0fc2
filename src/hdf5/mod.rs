//! HDF5 metadata decoder: superblock, object headers, B-trees, heaps, and
//! the typed messages that describe datasets.

pub mod attribute;
pub mod btree;
pub mod datatype;
pub mod dataspace;
pub mod filter;
pub mod fractal_heap;
pub mod group;
pub mod heap;
pub mod layout;
pub mod objheader;
pub mod superblock;
pub mod symbol_table;

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{H5Error, Result};
use crate::io::ByteRangeReader;
use crate::reader::Hdf5Reader;
use objheader::ObjectHeader;
use superblock::{RootGroupLocation, Superblock};

/// Append-only cache of parsed object headers keyed by file address. Safe
/// under concurrent access: headers are immutable once parsed, so a
/// double-insert race just does the same parse twice and the second result
/// is discarded.
#[derive(Default)]
pub struct MetadataMemo {
    headers: Mutex<HashMap<u64, ObjectHeader>>,
}

impl MetadataMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_parse<D: ByteRangeReader>(
        &self,
        reader: &Hdf5Reader<D>,
        address: u64,
    ) -> Result<ObjectHeader> {
        if let Some(header) = self.headers.lock().get(&address) {
            return Ok(header.clone());
        }
        let header = objheader::parse(reader, address)?;
        self.headers.lock().entry(address).or_insert_with(|| header.clone());
        Ok(header)
    }
}

/// The root group's object header, synthesized with a `symbol_table`
/// pointer derived from the superblock when the header itself doesn't
/// carry a redundant Symbol Table message (legal for v0 root groups).
fn root_header<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    memo: &MetadataMemo,
    superblock: &Superblock,
) -> Result<ObjectHeader> {
    let mut header = memo.get_or_parse(reader, superblock.root_object_header_address())?;
    if header.symbol_table.is_none() {
        if let RootGroupLocation::SymbolTable {
            btree_address,
            name_heap_address,
            ..
        } = &superblock.root_group
        {
            header.symbol_table = Some(objheader::SymbolTablePointers {
                btree_address: *btree_address,
                heap_address: *name_heap_address,
            });
        }
    }
    Ok(header)
}

/// Resolves an absolute path (e.g. `/group/sub/name`) to its object header,
/// walking from the root group one segment at a time.
pub fn resolve_path<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    memo: &MetadataMemo,
    superblock: &Superblock,
    path: &str,
) -> Result<ObjectHeader> {
    let mut current = root_header(reader, memo, superblock)?;
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    for segment in segments {
        let child_address = group::resolve_child(reader, &current, segment)?
            .ok_or_else(|| H5Error::PathNotFound(path.to_string()))?;
        current = memo.get_or_parse(reader, child_address)?;
    }
    Ok(current)
}
