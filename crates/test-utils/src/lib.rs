//! Shared test utilities for Tally crates.
//!
//! This crate provides common test helpers to reduce boilerplate across test modules:
//!
//! - [`assert_eventually`] / [`wait_until`] - Poll a condition until it's true or timeout
//! - [`strategies`] - Proptest generators for accounts and transfers
//! - [`random_account`] and friends - Fixtures with collision-free random ids

#![deny(unsafe_code)]

mod assertions;
pub use assertions::{assert_eventually, wait_until};

mod fixtures;
pub use fixtures::{random_account, random_accounts, random_id, transfer_between};

pub mod strategies;
