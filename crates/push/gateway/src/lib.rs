//! Push Gateway
//!
//! Single-attempt delivery to the provider's multicast push gateway.

mod fcm;
mod traits;

pub use fcm::*;
pub use traits::*;
