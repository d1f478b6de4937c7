mod membership_repo_redis;
mod password;
mod session_gateway_redis;
mod token_codec;

pub use membership_repo_redis::*;
pub use password::*;
pub use session_gateway_redis::*;
pub use token_codec::*;
