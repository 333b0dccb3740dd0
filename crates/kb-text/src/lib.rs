pub mod backend;
pub mod index;
pub mod tantivy_utils;

pub use backend::LexicalBackend;
pub use index::{LexicalHit, LexicalIndex};
