pub mod config;
pub mod error;
pub mod github;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod sink;
pub mod table;
pub mod transform;

// Re-export commonly used types
pub use error::{RepoSnapshotError, Result};
pub use models::{CleanRow, CleanTable, RawRecord, WriteMode};
pub use transform::transform;
