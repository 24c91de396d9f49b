//! Settings are read once at startup from a TOML file.
//! See `bin/settings_demo.rs` for a binary printing what gets loaded.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
