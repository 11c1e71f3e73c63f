//! sizedq - named bounded FIFO queues with JSON snapshots
//!
//! This library exports the core modules for testing and reuse by other front ends.

pub mod logging;
pub mod models;
pub mod storage;

pub use models::{BoundedQueue, QueueError, QueueHandle, QueueRegistry};
pub use storage::{JsonSnapshotStorage, LoadOutcome, SnapshotError, SnapshotStorage};
