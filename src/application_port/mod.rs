mod account_service;
mod authenticated_client;
mod credential_store;
mod refresh_coordinator;

pub use account_service::*;
pub use authenticated_client::*;
pub use credential_store::*;
pub use refresh_coordinator::*;
