//! Dataset Assembler: given a resolved dataset's layout and a hyperslab,
//! enumerates intersecting chunks, fetches and decodes them concurrently,
//! and places the decoded tiles into the output buffer.

use crate::error::{H5Error, Result};
use crate::hdf5::btree::ChunkEntry;
use crate::hdf5::datatype::{Class, Datatype, Endian};
use crate::hdf5::filter::FilterPipeline;
use crate::hdf5::layout::DataLayout;
use crate::hdf5::objheader::ObjectHeader;
use crate::io::ByteRangeReader;
use crate::reader::Hdf5Reader;
use crate::worker::WorkerPool;

/// A per-dimension `[start, stop)` selection with a stride, defaulting to
/// the full extent with stride 1.
#[derive(Debug, Clone)]
pub struct HyperslabDim {
    pub start: u64,
    pub stop: u64,
    pub stride: u64,
}

pub type Hyperslab = Vec<HyperslabDim>;

/// Builds the default (full-extent, unit-stride) hyperslab for a dataspace,
/// or validates and fills in a caller-supplied partial one.
pub fn resolve_hyperslab(
    path: &str,
    dims: &[u64],
    requested: Option<&[(u64, u64)]>,
) -> Result<Hyperslab> {
    let mut out = Vec::with_capacity(dims.len());
    for (i, &extent) in dims.iter().enumerate() {
        let (start, stop) = requested
            .and_then(|r| r.get(i).copied())
            .unwrap_or((0, extent));
        if stop > extent {
            return Err(H5Error::OutOfBounds {
                path: path.to_string(),
                dim: i,
                requested: stop,
                extent,
            });
        }
        out.push(HyperslabDim {
            start,
            stop,
            stride: 1,
        });
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct DecodedArray {
    pub shape: Vec<u64>,
    pub datatype: Datatype,
    pub values: Vec<u8>,
}

/// Reads `hyperslab` from the dataset described by `header`, decoding
/// through the filter pipeline and placing tiles into a freshly allocated
/// output buffer.
pub fn read_hyperslab<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    workers: &WorkerPool,
    header: &ObjectHeader,
    hyperslab: &Hyperslab,
    native_endian: bool,
) -> Result<DecodedArray> {
    let datatype = header
        .datatype
        .ok_or(H5Error::Format("dataset has no datatype message"))?;
    let layout = header
        .layout
        .as_ref()
        .ok_or(H5Error::Format("dataset has no data layout message"))?;

    let shape: Vec<u64> = hyperslab.iter().map(|d| (d.stop - d.start) / d.stride).collect();
    let elem_count: u64 = shape.iter().product();
    let elem_size = datatype.size;
    let mut out = vec![0u8; (elem_count as usize) * elem_size];
    if let Some(fill) = &header.fill_value {
        fill_buffer(&mut out, fill, elem_size);
    }

    match layout {
        DataLayout::Compact { data } => {
            copy_contiguous_hyperslab(&mut out, data, &full_dims(header)?, hyperslab, elem_size)?;
        }
        DataLayout::Contiguous { address, .. } => {
            let dims = full_dims(header)?;
            let bytes = read_contiguous_source(reader, *address, &dims, elem_size)?;
            copy_contiguous_hyperslab(&mut out, &bytes, &dims, hyperslab, elem_size)?;
        }
        DataLayout::Chunked { btree_address, chunk_dims } => {
            read_chunked(
                reader,
                workers,
                *btree_address,
                chunk_dims,
                header.filters.as_ref(),
                hyperslab,
                elem_size,
                &mut out,
            )?;
        }
    }

    if datatype.class != Class::String {
        if native_endian && datatype.endian == Endian::Big && cfg!(target_endian = "little") {
            byte_swap_in_place(&mut out, elem_size);
        } else if native_endian && datatype.endian == Endian::Little && cfg!(target_endian = "big") {
            byte_swap_in_place(&mut out, elem_size);
        }
    }

    Ok(DecodedArray {
        shape,
        datatype,
        values: out,
    })
}

fn full_dims(header: &ObjectHeader) -> Result<Vec<u64>> {
    Ok(header
        .dataspace
        .as_ref()
        .ok_or(H5Error::Format("dataset has no dataspace message"))?
        .dims
        .clone())
}

fn fill_buffer(out: &mut [u8], fill: &[u8], elem_size: usize) {
    if fill.is_empty() {
        return;
    }
    for chunk in out.chunks_mut(elem_size) {
        let n = chunk.len().min(fill.len());
        chunk[..n].copy_from_slice(&fill[..n]);
    }
}

fn read_contiguous_source<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    address: u64,
    dims: &[u64],
    elem_size: usize,
) -> Result<Vec<u8>> {
    let total: u64 = dims.iter().product::<u64>() * elem_size as u64;
    let mut cursor = reader.cursor(address, total as usize)?;
    cursor.bytes(total as usize)
}

/// Copies the overlap between `hyperslab` and the full `[0, extent)` box of
/// `source` (row-major, C order) into `out`.
fn copy_contiguous_hyperslab(
    out: &mut [u8],
    source: &[u8],
    dims: &[u64],
    hyperslab: &Hyperslab,
    elem_size: usize,
) -> Result<()> {
    let out_shape: Vec<u64> = hyperslab.iter().map(|d| (d.stop - d.start) / d.stride).collect();
    let mut index = vec![0u64; dims.len()];
    loop {
        let mut src_flat: u64 = 0;
        let mut out_flat: u64 = 0;
        for d in 0..dims.len() {
            let src_coord = hyperslab[d].start + index[d] * hyperslab[d].stride;
            src_flat = src_flat * dims[d] + src_coord;
            out_flat = out_flat * out_shape[d] + index[d];
        }
        let src_off = (src_flat as usize) * elem_size;
        let out_off = (out_flat as usize) * elem_size;
        if src_off + elem_size <= source.len() && out_off + elem_size <= out.len() {
            out[out_off..out_off + elem_size].copy_from_slice(&source[src_off..src_off + elem_size]);
        }

        if !increment_index(&mut index, &out_shape) {
            break;
        }
    }
    Ok(())
}

fn increment_index(index: &mut [u64], shape: &[u64]) -> bool {
    if shape.iter().any(|&s| s == 0) {
        return false;
    }
    for d in (0..shape.len()).rev() {
        index[d] += 1;
        if index[d] < shape[d] {
            return true;
        }
        index[d] = 0;
    }
    false
}

#[allow(clippy::too_many_arguments)]
fn read_chunked<D: ByteRangeReader>(
    reader: &Hdf5Reader<D>,
    workers: &WorkerPool,
    btree_address: u64,
    chunk_dims: &[u64],
    filters: Option<&FilterPipeline>,
    hyperslab: &Hyperslab,
    elem_size: usize,
    out: &mut [u8],
) -> Result<()> {
    let rank = chunk_dims.len();
    let selection: Vec<(u64, u64)> = hyperslab.iter().map(|d| (d.start, d.stop)).collect();
    let entries: Vec<ChunkEntry> =
        crate::hdf5::btree::collect_intersecting_chunks(reader, btree_address, rank, chunk_dims, &selection)?;

    let decoded: Vec<Result<(ChunkEntry, Vec<u8>)>> = workers.map_collect(entries, |entry| {
        let raw = reader
            .cursor(entry.chunk_address, entry.key.chunk_size as usize)?
            .bytes(entry.key.chunk_size as usize)?;
        let unfiltered = match filters {
            Some(pipeline) => crate::hdf5::filter::unfilter(pipeline, entry.key.filter_mask, elem_size, raw)?,
            None => raw,
        };
        Ok((entry, unfiltered))
    });

    let out_shape: Vec<u64> = hyperslab.iter().map(|d| (d.stop - d.start) / d.stride).collect();
    for result in decoded {
        let (entry, chunk_bytes) = result?;
        place_chunk_tile(out, &out_shape, hyperslab, chunk_dims, &entry.key.origin, &chunk_bytes, elem_size);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn place_chunk_tile(
    out: &mut [u8],
    out_shape: &[u64],
    hyperslab: &Hyperslab,
    chunk_dims: &[u64],
    origin: &[u64],
    chunk_bytes: &[u8],
    elem_size: usize,
) {
    let rank = chunk_dims.len();
    let mut lo = vec![0u64; rank];
    let mut hi = vec![0u64; rank];
    for d in 0..rank {
        let chunk_start = origin[d];
        let chunk_stop = chunk_start + chunk_dims[d];
        let sel_start = hyperslab[d].start;
        let sel_stop = hyperslab[d].stop;
        lo[d] = chunk_start.max(sel_start);
        hi[d] = chunk_stop.min(sel_stop);
        if lo[d] >= hi[d] {
            return;
        }
    }

    let mut index = lo.clone();
    loop {
        let mut chunk_flat: u64 = 0;
        let mut out_flat: u64 = 0;
        for d in 0..rank {
            chunk_flat = chunk_flat * chunk_dims[d] + (index[d] - origin[d]);
            out_flat = out_flat * out_shape[d] + (index[d] - hyperslab[d].start);
        }
        let chunk_off = (chunk_flat as usize) * elem_size;
        let out_off = (out_flat as usize) * elem_size;
        if chunk_off + elem_size <= chunk_bytes.len() && out_off + elem_size <= out.len() {
            out[out_off..out_off + elem_size].copy_from_slice(&chunk_bytes[chunk_off..chunk_off + elem_size]);
        }

        if !increment_bounded(&mut index, &lo, &hi) {
            break;
        }
    }
}

fn increment_bounded(index: &mut [u64], lo: &[u64], hi: &[u64]) -> bool {
    for d in (0..index.len()).rev() {
        index[d] += 1;
        if index[d] < hi[d] {
            return true;
        }
        index[d] = lo[d];
    }
    false
}

fn byte_swap_in_place(buf: &mut [u8], elem_size: usize) {
    if elem_size <= 1 {
        return;
    }
    for chunk in buf.chunks_mut(elem_size) {
        chunk.reverse();
    }
}
