mod bookmark_coordinator;
mod cache_entry;
mod deadline;
pub mod optimistic;
mod session_manager;
mod single_flight;

pub use bookmark_coordinator::*;
pub use cache_entry::*;
pub use deadline::*;
pub use session_manager::*;
pub use single_flight::*;
