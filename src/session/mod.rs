//! Claim sessions - one per connected browser
//!
//! Each session owns its wallet connection and mint state. Sessions share the
//! mint flow, the auth provider and the metadata resolver.

mod mint;
mod wallet;

pub use mint::{MintSession, SessionState, SessionView};
pub use wallet::{InjectedWallet, WalletSession};

use crate::chain::ChainInfo;
use crate::claim::MintFlow;
use crate::error::{ClaimError, ClaimResult};
use crate::metadata::MetadataResolver;
use crate::signing::AuthProvider;

use dashmap::DashMap;
use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Creates and tracks claim sessions
pub struct SessionManager {
    flow: Arc<MintFlow>,
    auth: Arc<dyn AuthProvider>,
    resolver: MetadataResolver,
    explorer: Option<ChainInfo>,
    sessions: DashMap<Uuid, Arc<MintSession>>,
}

impl SessionManager {
    pub fn new(
        flow: Arc<MintFlow>,
        auth: Arc<dyn AuthProvider>,
        resolver: MetadataResolver,
        explorer: Option<ChainInfo>,
    ) -> Self {
        Self {
            flow,
            auth,
            resolver,
            explorer,
            sessions: DashMap::new(),
        }
    }

    /// Open a session for the account an injected wallet announced
    pub fn open(&self, account: Address) -> Arc<MintSession> {
        let session = Arc::new(MintSession::new(
            Arc::new(InjectedWallet::new(account)),
            self.flow.clone(),
            self.auth.clone(),
            self.resolver.clone(),
            self.explorer.clone(),
        ));

        debug!("Opened session {} for {:?}", session.id(), account);
        self.sessions.insert(session.id(), session.clone());
        crate::metrics::set_active_sessions(self.sessions.len());
        session
    }

    pub fn get(&self, id: &Uuid) -> ClaimResult<Arc<MintSession>> {
        let session = self
            .sessions
            .get(id)
            .map(|s| s.clone())
            .ok_or_else(|| ClaimError::SessionNotFound(id.to_string()))?;
        session.touch();
        Ok(session)
    }

    /// Drop sessions unused for longer than `ttl`. A session with a mint in
    /// flight is kept regardless.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| session.is_minting() || session.idle_for() <= ttl);
        let evicted = before.saturating_sub(self.sessions.len());

        if evicted > 0 {
            info!("Evicted {} idle sessions", evicted);
            crate::metrics::set_active_sessions(self.sessions.len());
        }
        evicted
    }

    /// Periodically evict idle sessions
    pub fn spawn_sweeper(self: Arc<Self>, ttl: Duration) -> JoinHandle<()> {
        let period = ttl.min(Duration::from_secs(60)).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                self.evict_idle(ttl);
            }
        })
    }

    pub fn close(&self, id: &Uuid) -> ClaimResult<()> {
        self.sessions
            .remove(id)
            .ok_or_else(|| ClaimError::SessionNotFound(id.to_string()))?;
        crate::metrics::set_active_sessions(self.sessions.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainRegistry, MockChainRpc};
    use crate::claim::ClaimParams;
    use crate::metadata::{MetadataCatalog, MockMetadataStore};
    use crate::signing::{ConfiguredAuth, MockSigningService};
    use crate::tx::{GasEstimator, TransactionSender};

    fn manager() -> SessionManager {
        let signing = Arc::new(MockSigningService::new());
        let rpc = Arc::new(MockChainRpc::new());
        let sender = TransactionSender::new(
            signing.clone(),
            rpc.clone(),
            Arc::new(ChainRegistry::builtin()),
            "sig1",
        );
        let flow = MintFlow::new(
            ClaimParams {
                chain: "mumbai".into(),
                contract: Address::repeat_byte(0xb1),
                signing_public_key: "0x04ab".into(),
                gas_price: "0x2e90edd000".into(),
                fallback_gas_limit: "0x7530".into(),
                drop_id: 0,
                quantity: 0,
            },
            Arc::new(MetadataCatalog::new(vec!["https://meta.test/0.json".into()]).unwrap()),
            signing,
            rpc,
            GasEstimator::default(),
            sender,
        );

        SessionManager::new(
            Arc::new(flow),
            Arc::new(ConfiguredAuth::new(None)),
            MetadataResolver::new(Arc::new(MockMetadataStore::new()), Duration::from_millis(5000)),
            None,
        )
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let manager = manager();
        let first = manager.open(Address::repeat_byte(0x01));
        let second = manager.open(Address::repeat_byte(0x02));
        assert_ne!(first.id(), second.id());
        assert_eq!(manager.len(), 2);

        first.connect().await.unwrap();
        assert!(manager.get(&first.id()).unwrap().view().await.address.is_some());
        assert!(manager.get(&second.id()).unwrap().view().await.address.is_none());

        manager.close(&first.id()).unwrap();
        assert!(matches!(
            manager.get(&first.id()),
            Err(ClaimError::SessionNotFound(_))
        ));
        assert!(manager.close(&first.id()).is_err());
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_are_evicted() {
        let manager = Arc::new(manager());
        let stale = manager.open(Address::repeat_byte(0x01));
        let active = manager.open(Address::repeat_byte(0x02));

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        manager.get(&active.id()).unwrap();
        tokio::time::advance(Duration::from_secs(15 * 60)).await;

        assert_eq!(manager.evict_idle(Duration::from_secs(30 * 60)), 1);
        assert!(manager.get(&stale.id()).is_err());
        assert!(manager.get(&active.id()).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_in_background() {
        let manager = Arc::new(manager());
        manager.open(Address::repeat_byte(0x01));

        let sweeper = manager.clone().spawn_sweeper(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(150)).await;

        assert!(manager.is_empty());
        sweeper.abort();
    }
}
