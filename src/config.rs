//! Reader configuration: explicit, documented fields rather than
//! environment-variable overrides, since this crate is a library.

/// Static S3-style credentials. Full request signing and the host credential
/// chain are out of scope; callers that need them wrap [`ObjectStorageDriver`]
/// or supply pre-signed URLs.
///
/// [`ObjectStorageDriver`]: crate::io::object::ObjectStorageDriver
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_session_token: Option<String>,
    pub region: Option<String>,
}

/// Tunables for the block cache and worker pool.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bytes per cache block. Object stores have high first-byte latency, so
    /// large blocks amortize it; 4 MiB matches the reference implementation's
    /// recommendation.
    pub block_size: usize,
    /// Total bytes the block cache may hold before evicting under LRU.
    pub cache_budget: usize,
    /// Worker threads for concurrent chunk decode. Defaults to `min(32, 4*cpu)`.
    pub workers: usize,
    pub credentials: Credentials,
}

impl Default for Config {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            block_size: 4 * 1024 * 1024,
            cache_budget: 1024 * 1024 * 1024,
            workers: (4 * cpus).min(32),
            credentials: Credentials::default(),
        }
    }
}
