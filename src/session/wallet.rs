//! Browser wallet session

use crate::error::{ClaimError, ClaimResult};

use async_trait::async_trait;
use ethers::types::Address;
use std::sync::RwLock;
use tracing::info;

/// The user's wallet connection
#[async_trait]
pub trait WalletSession: Send + Sync {
    async fn connect(&self) -> ClaimResult<Address>;

    async fn disconnect(&self);

    /// Connected account, if any
    fn address(&self) -> Option<Address>;

    fn is_connected(&self) -> bool {
        self.address().is_some()
    }
}

/// Account announced by an injected browser wallet
pub struct InjectedWallet {
    account: Address,
    connected: RwLock<Option<Address>>,
}

impl InjectedWallet {
    pub fn new(account: Address) -> Self {
        Self {
            account,
            connected: RwLock::new(None),
        }
    }
}

#[async_trait]
impl WalletSession for InjectedWallet {
    async fn connect(&self) -> ClaimResult<Address> {
        let mut connected = self
            .connected
            .write()
            .map_err(|_| ClaimError::WalletNotConnected)?;
        *connected = Some(self.account);
        info!("Wallet connected: {:?}", self.account);
        Ok(self.account)
    }

    async fn disconnect(&self) {
        if let Ok(mut connected) = self.connected.write() {
            *connected = None;
        }
        info!("Wallet disconnected: {:?}", self.account);
    }

    fn address(&self) -> Option<Address> {
        self.connected.read().ok().and_then(|a| *a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_disconnect() {
        let account = Address::repeat_byte(0x11);
        let wallet = InjectedWallet::new(account);
        assert!(!wallet.is_connected());

        assert_eq!(wallet.connect().await.unwrap(), account);
        assert_eq!(wallet.address(), Some(account));

        wallet.disconnect().await;
        assert!(!wallet.is_connected());
    }
}
