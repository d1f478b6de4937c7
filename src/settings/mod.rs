//! TOML settings (`settings/dev.toml`, `settings/release.toml`) plus the
//! command line that can point at another file.
//! Checked by hand with `bin/settings_demo.rs`.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
