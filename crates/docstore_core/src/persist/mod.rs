//! Persistence engine: file format and flush scheduling.

mod flusher;
pub mod format;

pub use flusher::FlushPhase;
pub(crate) use flusher::Flusher;
