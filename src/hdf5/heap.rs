//! Local heap: the flat string table backing "old style" group names.

use crate::error::Result;
use crate::io::ByteRangeReader;
use crate::reader::Hdf5Reader;

pub const SIGNATURE: &[u8; 4] = b"HEAP";

#[derive(Debug, Clone)]
pub struct LocalHeap {
    pub data_segment_size: u64,
    pub data_segment_address: u64,
}

pub fn parse<D: ByteRangeReader>(reader: &Hdf5Reader<D>, address: u64) -> Result<LocalHeap> {
    let len = 4 + 1 + 3 + (reader.length_size as usize) * 2 + reader.offset_size as usize;
    let mut cursor = reader.cursor(address, len)?;
    cursor.tag(SIGNATURE)?;
    let _version = cursor.u8()?;
    cursor.skip(3)?; // reserved
    let data_segment_size = cursor.length()?;
    let _freelist_head_offset = cursor.length()?;
    let data_segment_address = cursor.address()?;
    Ok(LocalHeap {
        data_segment_size,
        data_segment_address,
    })
}

impl LocalHeap {
    /// Reads the NUL-terminated name at `offset` within the heap's data
    /// segment.
    pub fn name_at<D: ByteRangeReader>(
        &self,
        reader: &Hdf5Reader<D>,
        offset: u64,
    ) -> Result<String> {
        let remaining = (self.data_segment_size.saturating_sub(offset)) as usize;
        let mut cursor = reader.cursor(self.data_segment_address + offset, remaining)?;
        cursor.cstr()
    }
}
