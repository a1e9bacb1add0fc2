//! B-tree v1 traversal (group-node and chunk-node variants).
//!
//! Reads lazily: a caller walks only the subtree intersecting its query
//! rather than the whole tree being parsed eagerly.

use crate::error::{H5Error, Result};
use crate::io::ByteRangeReader;
use crate::reader::Hdf5Reader;

pub const SIGNATURE: &[u8; 4] = b"TREE";

const NODE_TYPE_GROUP: u8 = 0;
const NODE_TYPE_CHUNK: u8 = 1;

#[derive(Debug, Clone)]
pub struct GroupEntry {
    pub heap_name_offset: u64,
    pub child_pointer: u64,
}

/// The key for a raw-data-chunk B-tree entry: `rank` dimension origins plus
/// a trailing zero sentinel (the on-disk key always carries `rank+1` values).
#[derive(Debug, Clone)]
pub struct ChunkKey {
    pub chunk_size: u32,
    pub filter_mask: u32,
    pub origin: Vec<u64>,
}

#[derive(Debug, Clone)]
pub struct ChunkEntry {
    pub key: ChunkKey,
    pub chunk_address: u64,
}

#[derive(Debug, Clone)]
pub enum Node {
    Group {
        level: u8,
        left_sibling: u64,
        right_sibling: u64,
        /// Splitting keys are heap-name offsets for internal group nodes;
        /// entries hold the child pointer reached via that key.
        entries: Vec<GroupEntry>,
    },
    Chunk {
        level: u8,
        left_sibling: u64,
        right_sibling: u64,
        entries: Vec<ChunkEntry>,
    },
}

/// Parses the B-tree node at `address`. `rank` is required to size chunk
/// keys and is ignored for group nodes.
pub fn parse_node<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    address: u64,
    rank: usize,
) -> Result<Node> {
    // Read a generous fixed prefix first to learn entries_used, then a
    // second bounded read sized exactly to the entry list.
    let mut head = reader.cursor(address, 4 + 1 + 1 + 2 + (reader.offset_size as usize) * 2)?;
    head.tag(SIGNATURE)?;
    let node_type = head.u8()?;
    let level = head.u8()?;
    let entries_used = head.u16()? as usize;
    let left_sibling = head.address()?;
    let right_sibling = head.address()?;

    let entry_start = address + head.position() as u64;

    match node_type {
        NODE_TYPE_GROUP => {
            let entry_size = (reader.offset_size as usize) * 2;
            let mut body = reader.cursor(entry_start, entry_size * entries_used)?;
            let mut entries = Vec::with_capacity(entries_used);
            for _ in 0..entries_used {
                let heap_name_offset = body.address()?;
                let child_pointer = body.address()?;
                entries.push(GroupEntry {
                    heap_name_offset,
                    child_pointer,
                });
            }
            Ok(Node::Group {
                level,
                left_sibling,
                right_sibling,
                entries,
            })
        }
        NODE_TYPE_CHUNK => {
            // Key: chunk_size(4) + filter_mask(4) + (rank+1) * 8, entry: key + address.
            let key_size = 4 + 4 + (rank + 1) * 8;
            let entry_size = key_size + reader.offset_size as usize;
            let mut body = reader.cursor(entry_start, entry_size * entries_used)?;
            let mut entries = Vec::with_capacity(entries_used);
            for _ in 0..entries_used {
                let chunk_size = body.u32()?;
                let filter_mask = body.u32()?;
                let mut origin = Vec::with_capacity(rank);
                for _ in 0..rank {
                    origin.push(body.u64()?);
                }
                let _trailing_zero = body.u64()?;
                let chunk_address = body.address()?;
                entries.push(ChunkEntry {
                    key: ChunkKey {
                        chunk_size,
                        filter_mask,
                        origin,
                    },
                    chunk_address,
                });
            }
            Ok(Node::Chunk {
                level,
                left_sibling,
                right_sibling,
                entries,
            })
        }
        _ => Err(H5Error::Format("unrecognized B-tree node type")),
    }
}

/// Collects every leaf `GroupEntry` in the subtree rooted at `address`,
/// in key order.
pub fn collect_group_entries<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    address: u64,
) -> Result<Vec<GroupEntry>> {
    let mut out = Vec::new();
    collect_group_entries_into(reader, address, &mut out)?;
    Ok(out)
}

fn collect_group_entries_into<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    address: u64,
    out: &mut Vec<GroupEntry>,
) -> Result<()> {
    match parse_node(reader, address, 0)? {
        Node::Group { level, entries, .. } => {
            if level == 0 {
                out.extend(entries);
            } else {
                for entry in entries {
                    collect_group_entries_into(reader, entry.child_pointer, out)?;
                }
            }
            Ok(())
        }
        Node::Chunk { .. } => Err(H5Error::Format("expected group B-tree node")),
    }
}

/// Collects every leaf `ChunkEntry` whose origin intersects `selection`
/// (a per-dimension inclusive-exclusive `[start, stop)` range), walking only
/// the subtrees whose key range can contain such an entry.
pub fn collect_intersecting_chunks<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    address: u64,
    rank: usize,
    chunk_dims: &[u64],
    selection: &[(u64, u64)],
) -> Result<Vec<ChunkEntry>> {
    let mut out = Vec::new();
    collect_chunks_into(reader, address, rank, chunk_dims, selection, &mut out)?;
    Ok(out)
}

fn collect_chunks_into<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    address: u64,
    rank: usize,
    chunk_dims: &[u64],
    selection: &[(u64, u64)],
    out: &mut Vec<ChunkEntry>,
) -> Result<()> {
    match parse_node(reader, address, rank)? {
        Node::Chunk { level, entries, .. } => {
            if level == 0 {
                for entry in entries {
                    if chunk_intersects(&entry.key.origin, chunk_dims, selection) {
                        out.push(entry);
                    }
                }
            } else {
                // Internal chunk nodes store child pointers the same way
                // group internal nodes do: this decoder stores children via
                // the `chunk_address` field re-used as a child pointer when
                // level > 0.
                for entry in entries {
                    collect_chunks_into(reader, entry.chunk_address, rank, chunk_dims, selection, out)?;
                }
            }
            Ok(())
        }
        Node::Group { .. } => Err(H5Error::Format("expected chunk B-tree node")),
    }
}

fn chunk_intersects(origin: &[u64], chunk_dims: &[u64], selection: &[(u64, u64)]) -> bool {
    for dim in 0..origin.len() {
        let chunk_start = origin[dim];
        let chunk_stop = chunk_start + chunk_dims[dim];
        let (sel_start, sel_stop) = selection[dim];
        if chunk_start >= sel_stop || chunk_stop <= sel_start {
            return false;
        }
    }
    true
}
