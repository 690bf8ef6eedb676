//! The redemption state machine.
//!
//! A redemption moves `PENDING → VAA_FETCHED → COMPLETED`. A failed attestation fetch parks it in
//! `VAA_FAILED`, from where the next pass moves it back to `PENDING` and tries again; a failed L1
//! submission is terminal (`FAILED`).

mod service;
#[cfg(test)]
mod tests;

pub use service::{RedemptionRoute, RedemptionService};
