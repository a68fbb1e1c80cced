//! Storage backends for usage graphs
//!
//! A dataset graph is split over two channels: [`GraphDb`] keeps nodes,
//! labels, relationships and the exact-match properties, a [`BlobStore`]
//! keeps the full payloads. [`UsageDao`] ties both together.

mod blob;
pub mod codec;
mod dao;
mod graph;
mod types;

pub use blob::{BlobStore, Channel, MemoryBlobStore, SqliteBlobStore};
pub use dao::{BatchCursor, DaoPaths, UsageDao};
pub use graph::GraphDb;
pub use types::{
    Direction, Label, NodeId, NodeProperty, NodeProps, OpenStore, RelType, Relationship, StorageError, StorageResult,
};
