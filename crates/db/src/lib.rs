//! Persistence for the relayer's entities.
//!
//! The state machines only see the traits in this crate. Two implementations are provided: an
//! in-memory store used by tests and ephemeral deployments, and a SQLite store used in production.

pub mod audit;
pub mod deposits;
pub mod errors;
pub mod inmemory;
pub mod persistent;
pub mod redemptions;
pub mod tracker;

#[cfg(test)]
mod test_utils;
