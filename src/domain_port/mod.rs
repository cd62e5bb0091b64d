// store

mod clock;
mod session_storage;

pub use clock::*;
pub use session_storage::*;

// remote

mod refresh_exchange;
mod session_observer;
mod transport;

pub use refresh_exchange::*;
pub use session_observer::*;
pub use transport::*;
