//! HTTP range-request I/O driver for object storage (S3-compatible endpoints).
//!
//! Kept synchronous so this driver slots behind the same [`ByteRangeReader`]
//! trait as the local file driver without pulling an async runtime into the
//! crate.

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, RANGE};

use crate::config::Credentials;
use crate::error::{H5Error, Result};
use crate::io::ByteRangeReader;

/// Reads byte ranges from a single object behind an HTTP(S) URL via `Range`
/// GET requests. Request signing beyond a static bearer token is out of
/// scope; callers needing SigV4 should pre-sign the URL.
pub struct ObjectStorageDriver {
    client: Client,
    url: String,
    size: u64,
    credentials: Credentials,
}

impl ObjectStorageDriver {
    /// Opens the object, issuing a HEAD request to learn its size.
    pub fn open(url: &str, credentials: Credentials) -> Result<Self> {
        let client = Client::new();
        let mut req = client.head(url);
        if let Some(token) = credentials.aws_session_token.as_deref() {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let resp = req.send().map_err(|e| H5Error::ObjectStorage {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            offset: 0,
            len: 0,
        })?;
        if !resp.status().is_success() {
            return Err(H5Error::ObjectStorage {
                status: resp.status().as_u16(),
                offset: 0,
                len: 0,
            });
        }
        let size = resp
            .content_length()
            .ok_or(H5Error::Unsupported("object store did not report Content-Length"))?;
        Ok(Self {
            client,
            url: url.to_string(),
            size,
            credentials,
        })
    }
}

impl ByteRangeReader for ObjectStorageDriver {
    fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let available = self.size.saturating_sub(offset);
        let clamped = len.min(available as usize) as u64;
        if clamped == 0 {
            return Ok(Vec::new());
        }
        let last = offset + clamped - 1;
        let mut req = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={offset}-{last}"));
        if let Some(token) = self.credentials.aws_session_token.as_deref() {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let resp = req.send().map_err(|e| H5Error::ObjectStorage {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            offset,
            len,
        })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(H5Error::ObjectStorage {
                status: status.as_u16(),
                offset,
                len,
            });
        }
        let bytes = resp.bytes().map_err(|_| H5Error::ObjectStorage {
            status: status.as_u16(),
            offset,
            len,
        })?;
        Ok(bytes.to_vec())
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl std::fmt::Debug for ObjectStorageDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorageDriver")
            .field("url", &self.url)
            .field("size", &self.size)
            .finish()
    }
}
