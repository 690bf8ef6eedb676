//! This crate implements the handlers that drive deposits and redemptions across chains.
//!
//! Deposits are driven by one [`deposit::ChainDepositHandler`] per destination chain, redemptions
//! by one [`redemption::RedemptionService`] per L2. Both only ever advance an entity forward and
//! re-check on-chain state before acting, so every operation is safe to re-run. Failures are
//! recorded on the entity and in the audit trail instead of being returned to the caller; the
//! scheduler simply invokes the passes again.

pub mod audit;
pub mod batch;
pub mod config;
pub mod context;
pub mod deposit;
pub mod errors;
pub mod redemption;
pub mod scan;

#[cfg(test)]
pub(crate) mod testing;
