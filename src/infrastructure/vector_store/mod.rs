mod index;
mod persist;

pub use index::{IndexTag, VectorIndex};
