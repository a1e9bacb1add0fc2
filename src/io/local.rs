//! File-backed I/O driver.
//!
//! Positioned reads via `pread` (through `FileExt::read_at`), so concurrent
//! readers don't need to serialize on a shared file cursor.

use std::fs::File;
#[cfg(unix)]
use std::os::unix::fs::FileExt;

use crate::error::Result;
use crate::io::ByteRangeReader;

pub struct LocalDriver {
    file: File,
    size: u64,
}

impl LocalDriver {
    pub fn open(path: &str) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, size })
    }
}

impl ByteRangeReader for LocalDriver {
    fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let available = self.size.saturating_sub(offset);
        let clamped = len.min(available as usize);
        let mut buf = vec![0u8; clamped];
        #[cfg(unix)]
        {
            self.file.read_exact_at(&mut buf, offset)?;
        }
        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = self.file.try_clone()?;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf)?;
        }
        Ok(buf)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl std::fmt::Debug for LocalDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDriver").field("size", &self.size).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_exact_range() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"0123456789").unwrap();
        let driver = LocalDriver::open(f.path().to_str().unwrap()).unwrap();
        assert_eq!(driver.size(), 10);
        assert_eq!(driver.read_range(2, 4).unwrap(), b"2345");
    }

    #[test]
    fn clamps_to_end_of_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"short").unwrap();
        let driver = LocalDriver::open(f.path().to_str().unwrap()).unwrap();
        assert_eq!(driver.read_range(3, 100).unwrap(), b"rt");
    }
}
