//! Push-notification gateway.
//!
//! Best-effort by contract: callers log failures and move on, a run is
//! never failed because a phone was unreachable.

pub mod fcm;
pub mod memory;
pub mod traits;

pub use fcm::FcmSender;
pub use memory::MemorySender;
pub use traits::{NotifyError, PushMessage, PushSender};
