//! One user's claim session and the state the page renders from it

use super::wallet::WalletSession;
use crate::chain::ChainInfo;
use crate::claim::MintFlow;
use crate::error::{ClaimError, ClaimResult};
use crate::metadata::MetadataResolver;
use crate::signing::AuthProvider;
use crate::tx::TransactionHandle;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Minting,
    Minted,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub state: SessionState,
    pub address: Option<String>,
    pub tx_hash: Option<String>,
    pub explorer_url: Option<String>,
    pub metadata_uri: Option<String>,
    pub image_uri: Option<String>,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub minted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct Failure {
    kind: &'static str,
    notice: String,
}

#[derive(Default)]
struct SessionInner {
    connecting: bool,
    minting: bool,
    handle: Option<TransactionHandle>,
    metadata_uri: Option<String>,
    image_uri: Option<String>,
    failure: Option<Failure>,
    minted_at: Option<DateTime<Utc>>,
    /// Bumped on every (uri, handle) change so stale fetches are dropped
    generation: u64,
    resolution: Option<JoinHandle<()>>,
}

impl SessionInner {
    /// In-flight work wins over the outcome of the previous attempt
    fn state(&self) -> SessionState {
        if self.minting {
            SessionState::Minting
        } else if self.connecting {
            SessionState::Connecting
        } else if self.failure.is_some() {
            SessionState::Error
        } else if self.handle.is_some() {
            SessionState::Minted
        } else {
            SessionState::Idle
        }
    }

    fn reset(&mut self) {
        if let Some(task) = self.resolution.take() {
            task.abort();
        }
        let generation = self.generation + 1;
        *self = SessionInner {
            generation,
            ..Default::default()
        };
    }
}

/// A single browser session: connect, mint once at a time, show the result
pub struct MintSession {
    id: Uuid,
    wallet: Arc<dyn WalletSession>,
    flow: Arc<MintFlow>,
    auth: Arc<dyn AuthProvider>,
    resolver: MetadataResolver,
    explorer: Option<ChainInfo>,
    inner: Arc<RwLock<SessionInner>>,
    /// Held for the whole of a mint attempt
    in_flight: Mutex<()>,
    last_seen: StdMutex<Instant>,
}

impl MintSession {
    pub fn new(
        wallet: Arc<dyn WalletSession>,
        flow: Arc<MintFlow>,
        auth: Arc<dyn AuthProvider>,
        resolver: MetadataResolver,
        explorer: Option<ChainInfo>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet,
            flow,
            auth,
            resolver,
            explorer,
            inner: Arc::new(RwLock::new(SessionInner::default())),
            in_flight: Mutex::new(()),
            last_seen: StdMutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Record activity from the browser
    pub fn touch(&self) {
        if let Ok(mut last_seen) = self.last_seen.lock() {
            *last_seen = Instant::now();
        }
    }

    /// Time since the browser last used this session
    pub fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .map(|last_seen| last_seen.elapsed())
            .unwrap_or_default()
    }

    /// True while a mint attempt holds the session
    pub fn is_minting(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    pub async fn connect(&self) -> ClaimResult<SessionView> {
        self.inner.write().await.connecting = true;
        let result = self.wallet.connect().await;

        {
            let mut inner = self.inner.write().await;
            inner.connecting = false;
            if let Err(e) = &result {
                inner.failure = Some(Failure {
                    kind: e.kind(),
                    notice: e.user_notice(),
                });
            }
        }

        result?;
        Ok(self.view().await)
    }

    pub async fn disconnect(&self) -> SessionView {
        self.wallet.disconnect().await;
        self.inner.write().await.reset();
        self.view().await
    }

    /// Run one mint attempt. A second call while one is pending is rejected.
    pub async fn mint(&self) -> ClaimResult<SessionView> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| ClaimError::MintInProgress)?;

        let address = self.wallet.address().ok_or(ClaimError::WalletNotConnected)?;

        let generation = {
            let mut inner = self.inner.write().await;
            inner.minting = true;
            inner.failure = None;
            inner.generation
        };
        crate::metrics::record_mint_attempt();

        let span = info_span!("mint", session = %self.id, receiver = ?address);
        let result = async {
            let auth = self.auth.obtain_session_auth(address).await?;
            let mut rng = StdRng::from_entropy();
            self.flow.mint(address, &auth, &mut rng).await
        }
        .instrument(span)
        .await;

        let mut inner = self.inner.write().await;

        // Disconnected while in flight: the reset view stays as it is
        if inner.generation != generation || self.wallet.address().is_none() {
            match &result {
                Ok(outcome) => {
                    crate::metrics::record_mint_success();
                    warn!(
                        "Session {} disconnected during mint, dropping result {:?}",
                        self.id, outcome.handle.hash
                    );
                }
                Err(e) => {
                    crate::metrics::record_mint_failure(e.kind());
                    warn!(
                        "Session {} disconnected during mint, dropping error: {}",
                        self.id, e
                    );
                }
            }
            drop(inner);
            return match result {
                Ok(_) => Ok(self.view().await),
                Err(e) => Err(e),
            };
        }
        inner.minting = false;

        match result {
            Ok(outcome) => {
                crate::metrics::record_mint_success();
                inner.handle = Some(outcome.handle);
                inner.metadata_uri = Some(outcome.metadata_uri);
                inner.minted_at = Some(Utc::now());
                self.spawn_resolution(&mut inner);
                drop(inner);
                Ok(self.view().await)
            }
            Err(e) => {
                if e.is_precondition() {
                    warn!("Mint aborted for session {} ({}): {}", self.id, e.kind(), e);
                } else {
                    error!("Mint failed for session {} ({}): {}", self.id, e.kind(), e);
                }
                crate::metrics::record_mint_failure(e.kind());
                inner.failure = Some(Failure {
                    kind: e.kind(),
                    notice: e.user_notice(),
                });
                Err(e)
            }
        }
    }

    /// Fetch the image for the current (uri, handle) pair in the background
    fn spawn_resolution(&self, inner: &mut SessionInner) {
        let Some(uri) = inner.metadata_uri.clone() else {
            return;
        };
        if inner.handle.is_none() {
            return;
        }

        if let Some(previous) = inner.resolution.take() {
            previous.abort();
        }
        inner.generation += 1;
        inner.image_uri = None;

        let generation = inner.generation;
        let resolver = self.resolver.clone();
        let shared = self.inner.clone();
        let session = self.id;

        inner.resolution = Some(tokio::spawn(async move {
            if let Some(image) = resolver.resolve(&uri).await {
                let mut inner = shared.write().await;
                if inner.generation == generation {
                    info!("Session {} image resolved", session);
                    inner.image_uri = Some(image);
                }
            }
        }));
    }

    pub async fn view(&self) -> SessionView {
        let inner = self.inner.read().await;
        let hash = inner.handle.map(|h| h.hash);

        SessionView {
            id: self.id,
            state: inner.state(),
            address: self.wallet.address().map(|a| format!("{:?}", a)),
            tx_hash: hash.map(|h| format!("{:?}", h)),
            explorer_url: hash.and_then(|h| self.explorer.as_ref().map(|c| c.explorer_tx_url(&h))),
            metadata_uri: inner.metadata_uri.clone(),
            image_uri: inner.image_uri.clone(),
            error: inner.failure.as_ref().map(|f| f.kind.to_string()),
            notice: inner.failure.as_ref().map(|f| f.notice.clone()),
            minted_at: inner.minted_at,
        }
    }
}

impl Drop for MintSession {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_write() {
            if let Some(task) = inner.resolution.take() {
                task.abort();
            }
        }
    }
}
