pub mod config;
pub mod error;
pub mod expr;
pub mod index;
pub mod listing;
pub mod options;
pub mod symbols;

/// Wide enough for 20-bit extended addressing with room to spare
pub type Address = u64;
