//! End-to-end coverage over a synthetic HDF5 byte layout built in-test: a
//! v0 superblock, an old-style root group (B-tree + local heap + symbol
//! table node), and two datasets — one contiguous with an attribute, one
//! chunked with a shuffle+deflate filter pipeline. No binary `.h5` fixture
//! is shipped; every byte is assembled here with a bump allocator so
//! cross-structure addresses never have to be guessed by hand.

use std::io::Write as _;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use h5range::{Config, ReadRequest, Reader};

const UNDEF: u64 = u64::MAX;
const SIGNATURE: &[u8; 8] = b"\x89HDF\r\n\x1a\n";

/// Bump allocator standing in for a real file: every `alloc` appends at the
/// current end and returns the address it landed at.
#[derive(Default)]
struct FileBuilder {
    buf: Vec<u8>,
}

impl FileBuilder {
    fn reserve(&mut self, len: usize) -> u64 {
        let addr = self.buf.len() as u64;
        self.buf.resize(self.buf.len() + len, 0);
        addr
    }

    fn alloc(&mut self, bytes: &[u8]) -> u64 {
        let addr = self.buf.len() as u64;
        self.buf.extend_from_slice(bytes);
        addr
    }

    fn overwrite(&mut self, addr: u64, bytes: &[u8]) {
        let start = addr as usize;
        self.buf[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

fn msg_frame(msg_type: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + body.len());
    out.extend_from_slice(&msg_type.to_le_bytes());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.push(0); // flags
    out.extend_from_slice(&[0u8; 3]); // reserved
    out.extend_from_slice(body);
    out
}

fn object_header_v1(messages: &[Vec<u8>]) -> Vec<u8> {
    let header_size: usize = messages.iter().map(|m| m.len()).sum();
    let mut out = Vec::new();
    out.push(1); // version
    out.push(0); // reserved
    out.extend_from_slice(&(messages.len() as u16).to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes()); // reference count
    out.extend_from_slice(&(header_size as u32).to_le_bytes());
    for m in messages {
        out.extend_from_slice(m);
    }
    out
}

fn dataspace_body(dims: &[u64]) -> Vec<u8> {
    let mut out = vec![1u8, dims.len() as u8, 0];
    out.extend_from_slice(&[0u8; 5]);
    for &d in dims {
        out.extend_from_slice(&d.to_le_bytes());
    }
    out
}

fn datatype_body_fixed(size: u32, signed: bool) -> Vec<u8> {
    let bits0 = if signed { 0x08 } else { 0x00 }; // little-endian, optionally signed
    let mut out = vec![0x10u8, bits0, 0, 0];
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // bit offset
    out.extend_from_slice(&((size * 8) as u16).to_le_bytes()); // bit precision
    out
}

fn layout_contiguous_body(address: u64, size: u64) -> Vec<u8> {
    let mut out = vec![3u8, 1u8]; // version 3, class contiguous
    out.extend_from_slice(&address.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out
}

fn layout_chunked_body(btree_address: u64, chunk_dims: &[u64]) -> Vec<u8> {
    let mut out = vec![3u8, 2u8]; // version 3, class chunked
    out.push((chunk_dims.len() + 1) as u8);
    out.extend_from_slice(&btree_address.to_le_bytes());
    for &d in chunk_dims {
        out.extend_from_slice(&(d as u32).to_le_bytes());
    }
    out.extend_from_slice(&4u32.to_le_bytes()); // element size
    out
}

fn filter_pipeline_body(filter_ids: &[u16]) -> Vec<u8> {
    let mut out = vec![2u8, filter_ids.len() as u8]; // version 2
    for &id in filter_ids {
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&0u16.to_le_bytes()); // num client values
    }
    out
}

fn attribute_body_scalar_i32(name: &str, value: i32) -> Vec<u8> {
    let dt = datatype_body_fixed(4, true);
    let ds = dataspace_body(&[]); // rank 0, scalar

    let name_bytes: Vec<u8> = name.bytes().chain(std::iter::once(0)).collect();
    let mut out = vec![3u8, 0]; // version 3, flags
    out.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
    out.extend_from_slice(&(dt.len() as u16).to_le_bytes());
    out.extend_from_slice(&(ds.len() as u16).to_le_bytes());
    out.push(0); // char encoding
    out.extend_from_slice(&name_bytes);
    out.extend_from_slice(&dt);
    out.extend_from_slice(&ds);
    out.extend_from_slice(&value.to_le_bytes());
    out
}

fn chunk_btree_node(entries: &[(u64, u64, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"TREE");
    out.push(1); // node type: chunk
    out.push(0); // level
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&UNDEF.to_le_bytes());
    out.extend_from_slice(&UNDEF.to_le_bytes());
    for &(origin, addr, size) in entries {
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // filter mask
        out.extend_from_slice(&origin.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes()); // trailing zero key element
        out.extend_from_slice(&addr.to_le_bytes());
    }
    out
}

fn group_btree_node(entries: &[(u64, u64)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"TREE");
    out.push(0); // node type: group
    out.push(0); // level
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&UNDEF.to_le_bytes());
    out.extend_from_slice(&UNDEF.to_le_bytes());
    for &(heap_name_offset, child_pointer) in entries {
        out.extend_from_slice(&heap_name_offset.to_le_bytes());
        out.extend_from_slice(&child_pointer.to_le_bytes());
    }
    out
}

fn snod(entries: &[(u64, u64)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"SNOD");
    out.push(1); // version
    out.push(0); // reserved
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for &(link_name_offset, object_header_address) in entries {
        out.extend_from_slice(&link_name_offset.to_le_bytes());
        out.extend_from_slice(&object_header_address.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // cache type
        out.extend_from_slice(&0u32.to_le_bytes()); // reserved
        out.extend_from_slice(&UNDEF.to_le_bytes()); // btree address (unused)
        out.extend_from_slice(&UNDEF.to_le_bytes()); // heap address (unused)
    }
    out
}

fn local_heap_header(data_segment_size: u64, data_segment_address: u64) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"HEAP");
    out.push(0); // version
    out.extend_from_slice(&[0u8; 3]); // reserved
    out.extend_from_slice(&data_segment_size.to_le_bytes());
    out.extend_from_slice(&UNDEF.to_le_bytes()); // freelist head offset
    out.extend_from_slice(&data_segment_address.to_le_bytes());
    out
}

fn superblock_v0(root_object_header_address: u64, btree_address: u64, heap_address: u64, eof: u64) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(SIGNATURE);
    out.push(0); // superblock version
    out.push(0); // free space version
    out.push(0); // root symtab version
    out.push(0); // reserved
    out.push(0); // shared header version
    out.push(8); // offset size
    out.push(8); // length size
    out.push(0); // reserved
    out.extend_from_slice(&4u16.to_le_bytes()); // group leaf k
    out.extend_from_slice(&16u16.to_le_bytes()); // group internal k
    out.extend_from_slice(&0u32.to_le_bytes()); // flags
    out.extend_from_slice(&0u64.to_le_bytes()); // base address
    out.extend_from_slice(&UNDEF.to_le_bytes()); // free space address
    out.extend_from_slice(&eof.to_le_bytes());
    out.extend_from_slice(&UNDEF.to_le_bytes()); // driver info address
    out.extend_from_slice(&UNDEF.to_le_bytes()); // link name offset (unused, v0 root entry)
    out.extend_from_slice(&root_object_header_address.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // cache type
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved
    out.extend_from_slice(&btree_address.to_le_bytes());
    out.extend_from_slice(&heap_address.to_le_bytes());
    out
}

/// Forward shuffle (the write-side counterpart of the crate's private
/// `unshuffle`): groups byte-position `i` of every element before
/// byte-position `i + 1` of any element.
fn shuffle(data: &[u8], element_size: usize) -> Vec<u8> {
    let count = data.len() / element_size;
    let mut out = vec![0u8; data.len()];
    for elem in 0..count {
        for byte in 0..element_size {
            out[byte * count + elem] = data[elem * element_size + byte];
        }
    }
    out
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

struct Fixture {
    bytes: Vec<u8>,
}

/// Builds the synthetic file shared by every test below: a root group with
/// two children, `temperature` (contiguous, carries a `units` attribute)
/// and `pressure` (chunked, shuffle+deflate filtered, two chunks).
fn build_fixture() -> Fixture {
    let mut f = FileBuilder::default();
    let superblock_addr = f.reserve(96);

    // --- pressure: chunked, filtered ---
    let pressure_values: [i32; 8] = [100, 200, 300, 400, 500, 600, 700, 800];
    let raw0: Vec<u8> = pressure_values[0..4].iter().flat_map(|v| v.to_le_bytes()).collect();
    let raw1: Vec<u8> = pressure_values[4..8].iter().flat_map(|v| v.to_le_bytes()).collect();
    let stored0 = deflate(&shuffle(&raw0, 4));
    let stored1 = deflate(&shuffle(&raw1, 4));
    let chunk0_addr = f.alloc(&stored0);
    let chunk1_addr = f.alloc(&stored1);
    let pressure_btree_addr = f.alloc(&chunk_btree_node(&[
        (0, chunk0_addr, stored0.len() as u32),
        (4, chunk1_addr, stored1.len() as u32),
    ]));
    let pressure_header = object_header_v1(&[
        msg_frame(0x01, &dataspace_body(&[8])),
        msg_frame(0x03, &datatype_body_fixed(4, true)),
        msg_frame(0x0B, &filter_pipeline_body(&[2, 1])), // shuffle then deflate
        msg_frame(0x08, &layout_chunked_body(pressure_btree_addr, &[4])),
    ]);
    let pressure_addr = f.alloc(&pressure_header);

    // --- temperature: contiguous, with an attribute ---
    let temperature_values: [i32; 4] = [10, 20, 30, 40];
    let temperature_data: Vec<u8> = temperature_values.iter().flat_map(|v| v.to_le_bytes()).collect();
    let temperature_data_addr = f.alloc(&temperature_data);
    let temperature_header = object_header_v1(&[
        msg_frame(0x01, &dataspace_body(&[4])),
        msg_frame(0x03, &datatype_body_fixed(4, true)),
        msg_frame(0x08, &layout_contiguous_body(temperature_data_addr, temperature_data.len() as u64)),
        msg_frame(0x0C, &attribute_body_scalar_i32("units", 99)),
    ]);
    let temperature_addr = f.alloc(&temperature_header);

    // --- root group: symbol table over a local heap + one SNOD leaf ---
    let mut heap_data = Vec::new();
    let temperature_name_offset = heap_data.len() as u64;
    heap_data.extend_from_slice(b"temperature\0");
    let pressure_name_offset = heap_data.len() as u64;
    heap_data.extend_from_slice(b"pressure\0");
    while heap_data.len() % 8 != 0 {
        heap_data.push(0);
    }
    let heap_data_addr = f.alloc(&heap_data);
    let heap_addr = f.alloc(&local_heap_header(heap_data.len() as u64, heap_data_addr));

    let snod_addr = f.alloc(&snod(&[
        (temperature_name_offset, temperature_addr),
        (pressure_name_offset, pressure_addr),
    ]));
    let group_btree_addr = f.alloc(&group_btree_node(&[(0, snod_addr)]));

    let root_header = object_header_v1(&[]);
    let root_addr = f.alloc(&root_header);

    let eof = f.buf.len() as u64;
    let superblock = superblock_v0(root_addr, group_btree_addr, heap_addr, eof);
    f.overwrite(superblock_addr, &superblock);

    Fixture { bytes: f.buf }
}

fn write_fixture(fixture: &Fixture) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&fixture.bytes).unwrap();
    file
}

#[test]
fn reads_contiguous_dataset_with_attribute() {
    let fixture = build_fixture();
    let file = write_fixture(&fixture);
    let reader = Reader::open_local(file.path().to_str().unwrap(), Config::default()).unwrap();

    let result = reader
        .read_batch(&[ReadRequest {
            path: "/temperature".to_string(),
            hyperslice: None,
        }])
        .remove("/temperature")
        .unwrap()
        .unwrap();

    assert_eq!(result.array.shape, vec![4]);
    let values: Vec<i32> = result
        .array
        .values
        .chunks(4)
        .map(|b| i32::from_le_bytes(b.try_into().unwrap()))
        .collect();
    assert_eq!(values, vec![10, 20, 30, 40]);

    let units = result.attributes.get("units").unwrap();
    assert_eq!(i32::from_le_bytes(units.raw_value.clone().try_into().unwrap()), 99);
}

#[test]
fn reads_chunked_filtered_dataset_with_partial_hyperslab() {
    let fixture = build_fixture();
    let file = write_fixture(&fixture);
    let reader = Reader::open_local(file.path().to_str().unwrap(), Config::default()).unwrap();

    // Spans both chunks: [2, 6) straddles the chunk boundary at 4.
    let result = reader
        .read_batch(&[ReadRequest {
            path: "/pressure".to_string(),
            hyperslice: Some(vec![(2, 6)]),
        }])
        .remove("/pressure")
        .unwrap()
        .unwrap();

    let values: Vec<i32> = result
        .array
        .values
        .chunks(4)
        .map(|b| i32::from_le_bytes(b.try_into().unwrap()))
        .collect();
    assert_eq!(values, vec![300, 400, 500, 600]);
}

#[test]
fn rejects_out_of_bounds_hyperslab() {
    let fixture = build_fixture();
    let file = write_fixture(&fixture);
    let reader = Reader::open_local(file.path().to_str().unwrap(), Config::default()).unwrap();

    let results = reader.read_batch(&[ReadRequest {
        path: "/temperature".to_string(),
        hyperslice: Some(vec![(0, 100)]),
    }]);
    let err = results.get("/temperature").unwrap().as_ref().unwrap_err();
    assert!(matches!(err, h5range::H5Error::OutOfBounds { .. }));
}

#[test]
fn deferred_reads_of_disjoint_datasets_both_complete() {
    let fixture = build_fixture();
    let file = write_fixture(&fixture);
    let reader = Reader::open_local(file.path().to_str().unwrap(), Config::default()).unwrap();

    let handles = reader.read_batch_deferred(vec![
        ReadRequest {
            path: "/temperature".to_string(),
            hyperslice: None,
        },
        ReadRequest {
            path: "/pressure".to_string(),
            hyperslice: None,
        },
    ]);

    let temperature = handles.get("/temperature").unwrap().get().unwrap();
    let pressure = handles.get("/pressure").unwrap().get().unwrap();
    assert_eq!(temperature.array.shape, vec![4]);
    assert_eq!(pressure.array.shape, vec![8]);
}

#[test]
fn path_not_found_for_unknown_child() {
    let fixture = build_fixture();
    let file = write_fixture(&fixture);
    let reader = Reader::open_local(file.path().to_str().unwrap(), Config::default()).unwrap();

    let results = reader.read_batch(&[ReadRequest {
        path: "/nonexistent".to_string(),
        hyperslice: None,
    }]);
    let err = results.get("/nonexistent").unwrap().as_ref().unwrap_err();
    assert!(matches!(err, h5range::H5Error::PathNotFound(_)));
}
