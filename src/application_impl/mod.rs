mod account_service_impl;
mod credential_store_impl;
mod refresh_coordinator_impl;
mod request_pipeline_impl;

pub use account_service_impl::*;
pub use credential_store_impl::*;
pub use refresh_coordinator_impl::*;
pub use request_pipeline_impl::*;
