//! Record sink implementations.

pub mod memory;
pub mod tsv;

pub use memory::MemorySink;
pub use tsv::TsvSink;
