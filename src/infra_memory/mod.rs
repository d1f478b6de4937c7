mod membership_repo_memory;
mod session_gateway_fake;

pub use membership_repo_memory::*;
pub use session_gateway_fake::*;
