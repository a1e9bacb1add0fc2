//! Read-only, cloud-optimized reader for a subset of the HDF5 hierarchical
//! binary container format.
//!
//! Three pieces compose to turn `{dataset path, hyperslab}` requests into
//! decoded arrays with a minimal number of physical reads:
//! [`hdf5`] parses the binary format (superblock, object headers, B-trees,
//! heaps, typed messages), [`io::cache::BlockCache`] coalesces and caches
//! the byte ranges those parses need, and [`dataset`] enumerates, fetches,
//! and decodes the chunks covering a requested selection. [`orchestrator`]
//! ties them together for batches of requests.

pub mod config;
pub mod dataset;
pub mod error;
pub mod hdf5;
pub mod io;
pub mod orchestrator;
pub mod reader;
pub mod worker;

pub use config::{Config, Credentials};
pub use dataset::{DecodedArray, Hyperslab, HyperslabDim};
pub use error::H5Error;
pub use orchestrator::{DatasetResult, DeferredResult, ReadRequest, Reader};
