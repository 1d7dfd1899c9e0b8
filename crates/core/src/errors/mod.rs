//! Error types and result extensions for Ledgerline API operations

mod builders;
mod conversions;
mod extensions;
mod types;

pub use extensions::*;
pub use types::{Error, FieldErrors, Result};
