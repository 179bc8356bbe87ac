//! HTTP transport module
//!
//! Long-poll transport for shape streams served over HTTP.
//!
//! # Features
//!
//! - **Automatic Retries**: Configurable retry logic with backoff
//! - **Backoff Strategies**: Constant, linear, and exponential backoff
//! - **Shape Protocol**: Offset/handle tracking, live mode, 409 resync

mod client;
mod transport;

pub use client::{HttpClient, HttpClientConfig};
pub use transport::{HttpTransport, ShapeRequest, HANDLE_HEADER, OFFSET_HEADER};

#[cfg(test)]
mod tests;
