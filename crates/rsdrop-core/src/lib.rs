//! # rsdrop core
//!
//! Catalog record types, the backend trait, the admin view definitions and
//! the planner that strips a Redshift user of its privileges and ownerships
//! before dropping it.

pub mod backend;
pub mod config;
pub mod driver;
pub mod plan;
pub mod types;
pub mod views;

#[cfg(test)]
mod testing;

pub use backend::*;
pub use config::*;
pub use driver::*;
pub use plan::*;
pub use types::*;
