//! Push Core Types
//!
//! Messages, provider payloads, gateway outcomes and the reconciliation task
//! that crosses the send/reconcile boundary.

mod batch;
mod installation;
mod message;
mod outcome;
mod payload;
mod task;

pub use batch::*;
pub use installation::*;
pub use message::*;
pub use outcome::*;
pub use payload::*;
pub use task::*;
