// data service

mod data_service_error;
mod membership_repo;
mod session_gateway;

pub use data_service_error::*;
pub use membership_repo::*;
pub use session_gateway::*;
