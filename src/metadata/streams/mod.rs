//! Metadata heaps consumed by the blob decoders.

mod blob;

pub use blob::Blob;
