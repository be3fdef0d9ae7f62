pub mod envelope;
pub mod error;
pub mod publisher;
pub mod topics;

pub use envelope::{EnvelopeMessage, PushEnvelope, ATTR_ORIGIN, ORIGIN_LAG_QUEUE};
pub use error::QueueError;
pub use publisher::{MemoryPublisher, PublishedMessage, Publisher};
