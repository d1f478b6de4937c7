//! Process-wide tracing setup. Boots with `RUST_LOG` (or `info`) and is
//! re-filtered from `[log] filter` once settings are loaded.
//! Checked by hand with `bin/logger_demo.rs`.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
