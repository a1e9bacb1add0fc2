//! Superblock discovery and parsing (v0 and v2).
//!
//! v2 drops the free-space/root-symbol-table-entry fields of v0 in favor of
//! a single root group object header address.

use tracing::debug;

use crate::error::{H5Error, Result};
use crate::io::ByteRangeReader;
use crate::reader::{undefined_address, Hdf5Reader};

pub const SIGNATURE: &[u8; 8] = b"\x89HDF\r\n\x1a\n";

/// Candidate offsets to probe for the superblock signature, per the format's
/// block-size-doubling search (0, 512, 1024, 2048, ...).
fn candidate_offsets(file_size: u64) -> impl Iterator<Item = u64> {
    std::iter::successors(Some(0u64), |&prev| {
        let next = if prev == 0 { 512 } else { prev * 2 };
        (next < file_size).then_some(next)
    })
}

/// Where to find the root group: directly (v2) or via a symbol table entry
/// whose B-tree/local-heap addresses index the root group's children (v0).
#[derive(Debug, Clone)]
pub enum RootGroupLocation {
    ObjectHeader { address: u64 },
    SymbolTable {
        object_header_address: u64,
        btree_address: u64,
        name_heap_address: u64,
    },
}

#[derive(Debug, Clone)]
pub struct Superblock {
    pub version: u8,
    pub offset_size: u8,
    pub length_size: u8,
    pub base_address: u64,
    pub end_of_file_address: u64,
    pub root_group: RootGroupLocation,
}

impl Superblock {
    pub fn root_object_header_address(&self) -> u64 {
        match &self.root_group {
            RootGroupLocation::ObjectHeader { address } => *address,
            RootGroupLocation::SymbolTable {
                object_header_address,
                ..
            } => *object_header_address,
        }
    }
}

/// Scans candidate offsets for the HDF5 signature and parses the superblock
/// found there. A reader with default (8-byte) widths is used only to probe;
/// the returned reader carries the widths declared by the superblock itself.
pub fn find_and_parse<D: ByteRangeReader>(reader: &Hdf5Reader<D>) -> Result<Superblock> {
    let file_size = reader.file_size();
    for offset in candidate_offsets(file_size) {
        let mut probe = match reader.cursor(offset, SIGNATURE.len()) {
            Ok(c) => c,
            Err(_) => continue,
        };
        if probe.tag(SIGNATURE).is_ok() {
            debug!(offset, "found HDF5 signature");
            return parse_at(reader, offset);
        }
    }
    Err(H5Error::BadSignature("HDF5 signature not found in file"))
}

fn parse_at<D: ByteRangeReader>(reader: &Hdf5Reader<D>, offset: u64) -> Result<Superblock> {
    // Enough to cover the fixed prefix (signature + version bytes) before we
    // know the address width needed for the rest.
    let mut head = reader.cursor(offset, 8 + 8)?;
    head.tag(SIGNATURE)?;
    let version = head.u8()?;

    match version {
        0 => parse_v0(reader, offset),
        2 => parse_v2(reader, offset),
        other => Err(H5Error::Unsupported(superblock_version_message(other))),
    }
}

fn superblock_version_message(v: u8) -> &'static str {
    match v {
        1 => "superblock version 1 is unsupported",
        3 => "superblock version 3 is unsupported",
        _ => "unrecognized superblock version",
    }
}

fn parse_v0<D: ByteRangeReader>(reader: &Hdf5Reader<D>, offset: u64) -> Result<Superblock> {
    // signature(8) + 4 version/reserved bytes + offset_size + length_size + reserved
    // + group_leaf_k(2) + group_internal_k(2) + flags(4) = 24 bytes before the
    // variable-width address block begins.
    let mut head = reader.cursor(offset, 24)?;
    head.tag(SIGNATURE)?;
    let _superblock_version = head.u8()?;
    let _free_space_version = head.u8()?;
    let _root_symtab_version = head.u8()?;
    head.skip(1)?; // reserved
    let _shared_header_version = head.u8()?;
    let offset_size = head.u8()?;
    let length_size = head.u8()?;
    head.skip(1)?; // reserved
    let _group_leaf_k = head.u16()?;
    let _group_internal_k = head.u16()?;
    let _flags = head.u32()?;

    // base_address, free_space_addr, eof_addr, driver_info_addr (4 addresses)
    // + symbol table entry (2 addresses + cache_type(4) + reserved(4) + 2 addresses)
    let tail_len = (offset_size as usize) * 4 + (offset_size as usize) * 4 + 4 + 4;
    let mut tail = reader
        .cursor(offset + 24, tail_len)?
        .rewidth(offset_size, length_size);
    let base_address = tail.address()?;
    let _free_space_address = tail.address()?;
    let end_of_file_address = tail.address()?;
    let _driver_info_address = tail.address()?;

    let _link_name_offset = tail.address()?;
    let object_header_address = tail.address()?;
    let _cache_type = tail.u32()?;
    tail.skip(4)?; // reserved
    let btree_address = tail.address()?;
    let name_heap_address = tail.address()?;

    Ok(Superblock {
        version: 0,
        offset_size,
        length_size,
        base_address,
        end_of_file_address,
        root_group: RootGroupLocation::SymbolTable {
            object_header_address,
            btree_address,
            name_heap_address,
        },
    })
}

fn parse_v2<D: ByteRangeReader>(reader: &Hdf5Reader<D>, offset: u64) -> Result<Superblock> {
    // signature(8) + version(1) + offset_size(1) + length_size(1) + flags(1) = 12
    let mut head = reader.cursor(offset, 12)?;
    head.tag(SIGNATURE)?;
    let _version = head.u8()?;
    let offset_size = head.u8()?;
    let length_size = head.u8()?;
    let _flags = head.u8()?;

    // base_address, superblock_extension_address, eof_address, root_group_address
    let tail_len = (offset_size as usize) * 4;
    let mut tail = reader
        .cursor(offset + 12, tail_len)?
        .rewidth(offset_size, length_size);
    let base_address = tail.address()?;
    let _extension_address = tail.address()?;
    let end_of_file_address = tail.address()?;
    let root_group_address = tail.address()?;

    if root_group_address == undefined_address(offset_size) {
        return Err(H5Error::Format("superblock v2 has no root group address"));
    }

    Ok(Superblock {
        version: 2,
        offset_size,
        length_size,
        base_address,
        end_of_file_address,
        root_group: RootGroupLocation::ObjectHeader {
            address: root_group_address,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ByteRangeReader;

    struct MemDriver(Vec<u8>);
    impl ByteRangeReader for MemDriver {
        fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
            let start = offset as usize;
            let end = (start + len).min(self.0.len());
            Ok(self.0[start.min(self.0.len())..end].to_vec())
        }
        fn size(&self) -> u64 {
            self.0.len() as u64
        }
    }

    fn build_v0(root_object_header: u64, btree: u64, heap: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(SIGNATURE);
        buf.push(0); // superblock version
        buf.push(0); // free space version
        buf.push(0); // root symtab version
        buf.push(0); // reserved
        buf.push(0); // shared header version
        buf.push(8); // offset size
        buf.push(8); // length size
        buf.push(0); // reserved
        buf.extend_from_slice(&4u16.to_le_bytes()); // group leaf k
        buf.extend_from_slice(&16u16.to_le_bytes()); // group internal k
        buf.extend_from_slice(&0u32.to_le_bytes()); // flags
        buf.extend_from_slice(&0u64.to_le_bytes()); // base address
        buf.extend_from_slice(&u64::MAX.to_le_bytes()); // free space addr (undefined)
        buf.extend_from_slice(&1000u64.to_le_bytes()); // eof address
        buf.extend_from_slice(&u64::MAX.to_le_bytes()); // driver info addr
        buf.extend_from_slice(&u64::MAX.to_le_bytes()); // link name offset
        buf.extend_from_slice(&root_object_header.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // cache type
        buf.extend_from_slice(&0u32.to_le_bytes()); // reserved
        buf.extend_from_slice(&btree.to_le_bytes());
        buf.extend_from_slice(&heap.to_le_bytes());
        buf
    }

    #[test]
    fn parses_v0_superblock_at_offset_zero() {
        let bytes = build_v0(0x60, 0x100, 0x200);
        let driver = MemDriver(bytes);
        let reader = Hdf5Reader::new(driver, &crate::config::Config::default());
        let sb = find_and_parse(&reader).unwrap();
        assert_eq!(sb.version, 0);
        assert_eq!(sb.offset_size, 8);
        assert_eq!(sb.root_object_header_address(), 0x60);
        match sb.root_group {
            RootGroupLocation::SymbolTable {
                btree_address,
                name_heap_address,
                ..
            } => {
                assert_eq!(btree_address, 0x100);
                assert_eq!(name_heap_address, 0x200);
            }
            _ => panic!("expected symbol table root group"),
        }
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut bytes = build_v0(0x60, 0x100, 0x200);
        bytes[8] = 1; // bump superblock version to 1
        let driver = MemDriver(bytes);
        let reader = Hdf5Reader::new(driver, &crate::config::Config::default());
        let err = find_and_parse(&reader).unwrap_err();
        assert!(matches!(err, H5Error::Unsupported(_)));
    }
}
