//! In-memory implementations of the storage traits.

pub mod audit;
pub mod deposits;
pub mod redemptions;
pub mod tracker;

pub use audit::AuditLogInMemory;
pub use deposits::DepositDbInMemory;
pub use redemptions::RedemptionDbInMemory;
pub use tracker::BlockCursorInMemory;
