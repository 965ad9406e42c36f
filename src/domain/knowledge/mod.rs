//! Knowledge base entries and sources

mod entry;
mod source;

pub use entry::{KnowledgeEntry, KnowledgeSet};
pub use source::KnowledgeSource;
