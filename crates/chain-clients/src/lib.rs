//! Clients for the contracts the relayer talks to.
//!
//! The relay state machines depend only on the traits in [`traits`]; [`evm`] implements them on
//! top of `alloy` providers.

pub mod errors;
pub mod evm;
pub mod traits;
pub mod types;
