//! domains
//!
//! Models, commands, filters, errors and port traits for the blog engine.
//! Nothing in this crate performs I/O.

pub mod commands;
pub mod errors;
pub mod filter;
pub mod models;
pub mod ports;

pub use commands::*;
pub use errors::*;
pub use filter::*;
pub use models::*;
pub use ports::*;
