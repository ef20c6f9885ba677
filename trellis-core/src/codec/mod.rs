//! Persistence
//!
//! Node graphs are stored as name-addressed data trees: targets are written
//! by qualified name rather than by live reference, and looked up again
//! through a [`NameResolver`](crate::graph::NameResolver) when decoding.
//! Nothing is executed during either direction.

mod file;
mod tree;

pub use file::Format;
pub use tree::{Codec, CodecConfig, Tree};
