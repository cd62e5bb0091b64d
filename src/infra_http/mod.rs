mod refresh_exchange_http;
mod transport_reqwest;

pub use refresh_exchange_http::*;
pub use transport_reqwest::*;
