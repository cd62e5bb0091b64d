mod client;
mod session_events;

pub use client::*;
pub use session_events::*;
