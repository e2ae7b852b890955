mod conversation;
mod document;
mod embedding;

pub use conversation::{Answer, ConversationTurn};
pub use document::{Chunk, Chunker, Document, SearchResult};
pub use embedding::Embedding;
