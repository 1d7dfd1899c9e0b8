//! Configuration for the Ledgerline API resilience layer
//!
//! Settings are plain serde structs with defaults for every field, so a
//! config file only needs to mention what it changes. The loader applies
//! defaults, then the JSON file, then `LEDGERLINE_*` environment variables.

pub mod config;
pub mod loader;

pub use config::*;
pub use loader::*;
