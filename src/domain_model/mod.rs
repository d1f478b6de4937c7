mod collection;
mod event;
mod item;
mod session;
mod unit;
mod user;

pub use collection::*;
pub use event::*;
pub use item::*;
pub use session::*;
pub use unit::*;
pub use user::*;
