//! Pipeline orchestration

mod orchestrator;

pub use orchestrator::{Pipeline, DEFAULT_TOP_K};
