//! Database models.

pub mod cost;

pub use cost::*;
