//! Question answering over a single document, grounded in retrieved chunks.

pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
