mod server;
mod session_watch;

pub use server::*;
pub use session_watch::*;
