pub mod error;
pub mod job;
pub mod queue;

pub use error::{JobError, QueueError};
pub use job::JobEnvelope;
pub use queue::QueueClient;
