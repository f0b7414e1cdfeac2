//! Chain module - chain registry and RPC access
//!
//! This module provides:
//! - The static chain name -> chain id table shared with the signing network
//! - Block explorer links for broadcast transactions
//! - The RPC client used for gas estimation and broadcast

pub mod provider;
pub mod registry;

pub use provider::{ChainProvider, ChainRpc};
pub use registry::{ChainInfo, ChainRegistry};

#[cfg(test)]
pub use provider::MockChainRpc;
