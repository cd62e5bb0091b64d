//! Scripted stand-ins for the outbound ports, used by the test suites.

mod refresh_exchange_fake;
mod session_observer_fake;
mod transport_fake;

pub use refresh_exchange_fake::*;
pub use session_observer_fake::*;
pub use transport_fake::*;
