//! HTTP retrieval of target documents.
//!
//! - [`fetch_document`] - single GET with timeout, retry and size limit
//! - [`build_client`] - shared client carrying the crate's `User-Agent`

mod fetcher;

pub use fetcher::{build_client, fetch_document, FetchError, FetchOptions, USER_AGENT};
