use thiserror::Error;

#[derive(Error, Debug)]
pub enum H5Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("object storage error ({status}) for range {offset}..{}", offset + *len as u64)]
    ObjectStorage {
        status: u16,
        offset: u64,
        len: usize,
    },
    #[error("bad signature in {0}")]
    BadSignature(&'static str),
    #[error("format error: {0}")]
    Format(&'static str),
    #[error("unsupported format: {0}")]
    Unsupported(&'static str),
    #[error("unsupported filter id {0}")]
    UnsupportedFilter(u16),
    #[error("path not found: {0}")]
    PathNotFound(String),
    #[error(
        "hyperslab out of bounds for dataset {path} on dimension {dim}: requested stop {requested} > extent {extent}"
    )]
    OutOfBounds {
        path: String,
        dim: usize,
        requested: u64,
        extent: u64,
    },
}

pub type Result<T> = std::result::Result<T, H5Error>;
