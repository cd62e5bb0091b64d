mod credential;
mod request;
mod user;

pub use credential::*;
pub use request::*;
pub use user::*;
