pub mod queue;
pub mod registry;

pub use queue::{BoundedQueue, QueueError};
pub use registry::{QueueHandle, QueueRegistry};
