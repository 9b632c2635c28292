//! HTTP transport
//!
//! Collectors, generation backends and webhook channels all talk HTTP
//! through `HttpTransport`. Production code uses `ReqwestTransport`; tests
//! use `FakeTransport`.

pub use crate::transport_fake::{FakeTransport, RecordedRequest};
pub use crate::transport_reqwest::ReqwestTransport;
pub use crate::transport_types::{Header, HttpTransport, TransportError};

/// Build a header pair
pub fn header(name: &str, value: impl Into<String>) -> Header {
    (name.to_string(), value.into())
}

/// `Authorization: Bearer <token>` header
pub fn bearer(token: &str) -> Header {
    header("Authorization", format!("Bearer {}", token))
}
