//! Provides the relayer's JSON-RPC interface.
//!
//! Reveals enter the relayer through [`traits::TbtcRelayerApiServer::reveal_deposit`]; the other
//! methods expose read-only status of tracked deposits and redemptions.

pub mod traits;
pub mod types;
