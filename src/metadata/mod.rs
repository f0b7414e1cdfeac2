//! Token metadata: the catalog a mint picks from, and image resolution

use crate::error::{ClaimError, ClaimResult};

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error};

/// Fixed table of metadata URIs
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataCatalog {
    uris: Vec<String>,
}

impl MetadataCatalog {
    pub fn new(uris: Vec<String>) -> ClaimResult<Self> {
        if uris.is_empty() {
            return Err(ClaimError::Config("metadata catalog is empty".to_string()));
        }
        Ok(Self { uris })
    }

    /// Uniform choice over the catalog; returns the index and the URI
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> (usize, &str) {
        let index = rng.gen_range(0..self.uris.len());
        (index, &self.uris[index])
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}

/// Where metadata documents live
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn fetch(&self, uri: &str, limit: Duration) -> ClaimResult<serde_json::Value>;
}

/// Plain HTTP GET of a JSON document
pub struct HttpMetadataStore {
    http: reqwest::Client,
}

impl HttpMetadataStore {
    pub fn new() -> ClaimResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClaimError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl MetadataStore for HttpMetadataStore {
    async fn fetch(&self, uri: &str, limit: Duration) -> ClaimResult<serde_json::Value> {
        let response = self
            .http
            .get(uri)
            .timeout(limit)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ClaimError::MetadataFetchFailed(e.to_string()))?;

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ClaimError::MetadataFetchFailed(e.to_string()))
    }
}

/// Resolves a metadata URI to its image, at most once per call
#[derive(Clone)]
pub struct MetadataResolver {
    store: Arc<dyn MetadataStore>,
    limit: Duration,
}

impl MetadataResolver {
    pub fn new(store: Arc<dyn MetadataStore>, limit: Duration) -> Self {
        Self { store, limit }
    }

    /// Image URI from the document, or None if the fetch fails or times out
    pub async fn resolve(&self, uri: &str) -> Option<String> {
        match self.fetch_image(uri).await {
            Ok(image) => {
                debug!("Resolved image for {}: {:?}", uri, image);
                image
            }
            Err(e) => {
                error!("Metadata fetch for {} failed: {}", uri, e);
                crate::metrics::record_metadata_failure();
                None
            }
        }
    }

    async fn fetch_image(&self, uri: &str) -> ClaimResult<Option<String>> {
        let document = timeout(self.limit, self.store.fetch(uri, self.limit))
            .await
            .map_err(|_| {
                ClaimError::MetadataFetchFailed(format!(
                    "no response within {}ms",
                    self.limit.as_millis()
                ))
            })??;

        Ok(document
            .get("image")
            .and_then(|image| image.as_str())
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn catalog() -> MetadataCatalog {
        MetadataCatalog::new((0..11).map(|i| format!("https://meta.test/{}.json", i)).collect())
            .unwrap()
    }

    #[test]
    fn test_pick_covers_catalog() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 11);
        assert!(!catalog.is_empty());
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = [0usize; 11];

        for _ in 0..5_500 {
            let (index, uri) = catalog.pick(&mut rng);
            assert!(index < 11);
            assert_eq!(uri, format!("https://meta.test/{}.json", index));
            seen[index] += 1;
        }

        // roughly uniform: every slot near 500
        assert!(seen.iter().all(|&count| count > 350 && count < 650), "{:?}", seen);
    }

    #[test]
    fn test_empty_catalog() {
        assert!(MetadataCatalog::new(vec![]).is_err());
    }

    #[tokio::test]
    async fn test_image_extracted() {
        let mut store = MockMetadataStore::new();
        store
            .expect_fetch()
            .times(1)
            .returning(|_, _| Ok(serde_json::json!({ "name": "drop", "image": "ipfs://img.png" })));

        let resolver = MetadataResolver::new(Arc::new(store), Duration::from_millis(5000));
        assert_eq!(
            resolver.resolve("https://meta.test/1.json").await,
            Some("ipfs://img.png".to_string())
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_image_unresolved() {
        let mut store = MockMetadataStore::new();
        store
            .expect_fetch()
            .times(1)
            .returning(|_, _| Err(ClaimError::MetadataFetchFailed("404".into())));

        let resolver = MetadataResolver::new(Arc::new(store), Duration::from_millis(5000));
        assert_eq!(resolver.resolve("https://meta.test/1.json").await, None);
    }

    struct SlowStore;

    #[async_trait]
    impl MetadataStore for SlowStore {
        async fn fetch(&self, _uri: &str, _limit: Duration) -> ClaimResult<serde_json::Value> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(serde_json::json!({ "image": "too-late.png" }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out() {
        let resolver = MetadataResolver::new(Arc::new(SlowStore), Duration::from_millis(5000));
        let started = tokio::time::Instant::now();

        assert_eq!(resolver.resolve("https://meta.test/1.json").await, None);
        assert!(started.elapsed() < Duration::from_secs(6));
    }
}
