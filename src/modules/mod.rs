//! Built-in test modules
//!
//! Each module implements [`crate::registry::TestModule`] and consumes
//! the frozen [`crate::context::TestContext`]; `headers` additionally
//! probes the target through the shared HTTP client.

pub mod headers;
pub mod perf;
pub mod seo;
