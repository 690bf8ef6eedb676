//! Fetching and verifying cross-chain attestations (VAAs).
//!
//! [`service::VaaService::fetch_and_verify`] is the single trust boundary between an event on one
//! chain and an action on another: it locates the message a transaction published, fetches the
//! guardian-signed attestation for it, checks that the attestation describes exactly that message
//! and a transfer payload, and confirms the destination token bridge has settled the transfer.
//! Signature and quorum checks are left to the [`verifier::AttestationVerifier`].

pub mod errors;
pub mod guardian;
pub mod message;
pub mod payload;
pub mod service;
pub mod verifier;
pub mod wire;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
