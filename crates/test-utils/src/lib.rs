//! This crate provides test-utilities related to external libraries.
//!
//! These utilities are mostly used to generate arbitrary keys, transactions and regtest headers
//! for testing purposes.

pub mod bitcoin;
pub mod musig2;
pub mod prelude;
