//! Vector index implementations

mod builder;
mod flat;
mod persistence;
mod shared;

pub use builder::IndexBuilder;
pub use flat::FlatIndex;
pub use persistence::{decode_f32_blob, encode_f32_blob, IndexStore};
pub use shared::SharedVectorIndex;
