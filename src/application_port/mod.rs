mod bookmark_service;
mod session_validator;

pub use bookmark_service::*;
pub use session_validator::*;
