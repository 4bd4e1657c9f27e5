//! Escrow-backed X402 settlement with a mandatory tithe split.
//!
//! The facilitator side lives in [`settlement`] on top of the atomic
//! key/value [`ledger`]; the buyer side is the [`protocol`] state machine;
//! sellers gate resources with [`gate`].

pub mod address;
pub mod errors;
pub mod ledger;
pub mod protocol;
pub mod settlement;
pub mod split;
pub mod state;
pub mod types;

#[cfg(feature = "seller")]
pub mod gate;
