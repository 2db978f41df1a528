//! Push Dispatch
//!
//! Sends batches through the gateway and reconciles per-target results
//! against the device registry, off the send path.

mod channel;
mod error;
mod reconciler;
mod resolver;
mod router;
mod traits;

#[cfg(test)]
mod testing;

pub use channel::*;
pub use error::*;
pub use reconciler::*;
pub use resolver::*;
pub use router::*;
pub use traits::*;
