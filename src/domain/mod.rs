//! Domain layer: the document, chunk and answer model, the error taxonomy,
//! and the ports implemented by external providers.

pub mod entities;
pub mod errors;
pub mod ports;

pub use entities::*;
pub use errors::{DomainError, Result};
