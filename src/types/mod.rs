//! Core types used across the crate.

mod amount;
mod asset;

pub use amount::*;
pub use asset::*;
