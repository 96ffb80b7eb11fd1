//! Voice assistant core.
//!
//! Per-client wake/sleep sessions layered over keyword intent dispatch.

pub mod intent;
pub mod router;
pub mod session;

pub use intent::{classify, is_wake_phrase, normalize, Intent};
pub use router::{IntentRouter, Reply};
pub use session::{ClientSession, SessionCounts, SessionStore};
