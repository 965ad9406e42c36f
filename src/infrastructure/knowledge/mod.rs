//! Knowledge source implementations

mod blob;
mod jsonl;

pub use blob::BlobKnowledgeSource;
pub use jsonl::{parse_entries, JsonlKnowledgeSource};
