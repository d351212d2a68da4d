//! Multi-parent block types for the DAG consensus kernel.

pub mod types;
pub mod wire;

pub use types::{Block, BlockHeader, HeartbeatRecord, HeartbeatView};
