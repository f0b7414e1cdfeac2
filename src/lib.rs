//! Airdrop claim service
//!
//! Builds the claim call for a connected wallet, has the threshold signing
//! network sign it, broadcasts the EIP-155 envelope and resolves the token
//! metadata for display.

pub mod api;
pub mod chain;
pub mod claim;
pub mod config;
pub mod error;
pub mod metadata;
pub mod metrics;
pub mod session;
pub mod signing;
pub mod tx;

pub use error::{ClaimError, ClaimResult};
