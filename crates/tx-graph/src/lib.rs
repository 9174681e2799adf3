//! This crate derives the staking, unbonding and slashing transaction family of a BTC delegation
//! and verifies candidate transactions against it.
//!
//! Every check re-derives the expected scripts from the delegation's keys and parameters and
//! compares bytes; scripts supplied by a submitter are never trusted.

pub mod connectors;
pub mod errors;
pub mod keys;
pub mod scripts;
pub mod transactions;
