//! HTTP client for a signing network gateway

use super::{ExecuteRequest, ExecuteResponse, SigningService};
use crate::error::{ClaimError, ClaimResult};

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HandshakeRequest<'a> {
    client_public_key: &'a str,
    network: &'a str,
}

/// Talks JSON to a gateway that fronts the signing nodes
pub struct GatewaySigningClient {
    http: reqwest::Client,
    gateway_url: String,
    network: String,
    ready: AtomicBool,
}

impl GatewaySigningClient {
    pub fn new(gateway_url: &str, network: &str) -> ClaimResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClaimError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            network: network.to_string(),
            ready: AtomicBool::new(false),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/web/{}", self.gateway_url, path)
    }
}

#[async_trait]
impl SigningService for GatewaySigningClient {
    async fn connect(&self) -> ClaimResult<()> {
        if self.is_ready() {
            return Ok(());
        }

        let response = self
            .http
            .post(self.endpoint("handshake"))
            .json(&HandshakeRequest {
                client_public_key: "test",
                network: &self.network,
            })
            .send()
            .await
            .map_err(|e| ClaimError::Rpc(format!("Signing gateway handshake: {}", e)))?;

        if !response.status().is_success() {
            warn!(
                "Signing gateway handshake for {} returned {}",
                self.network,
                response.status()
            );
            return Err(ClaimError::Rpc(format!(
                "Signing gateway handshake returned {}",
                response.status()
            )));
        }

        self.ready.store(true, Ordering::SeqCst);
        info!("Connected to signing network {}", self.network);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn execute(&self, request: ExecuteRequest) -> ClaimResult<ExecuteResponse> {
        debug!(
            "Executing signing action on {} (sig {})",
            self.network, request.js_params.sig_name
        );

        let response = self
            .http
            .post(self.endpoint("execute"))
            .json(&request)
            .send()
            .await
            .map_err(|e| ClaimError::SigningExecutionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClaimError::SigningExecutionFailed(format!(
                "gateway returned {}: {}",
                status, body
            )));
        }

        response
            .json::<ExecuteResponse>()
            .await
            .map_err(|e| ClaimError::SigningExecutionFailed(format!("Unreadable response: {}", e)))
    }

    fn network(&self) -> String {
        self.network.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_paths() {
        let client = GatewaySigningClient::new("http://localhost:7470/", "serrano").unwrap();
        assert_eq!(client.endpoint("execute"), "http://localhost:7470/web/execute");
        assert!(!client.is_ready());
        assert_eq!(client.network(), "serrano");
    }

    #[tokio::test]
    async fn test_unreachable_gateway_stays_not_ready() {
        // Port 9 (discard) is never an HTTP server in test environments
        let client = GatewaySigningClient::new("http://127.0.0.1:9", "serrano").unwrap();
        assert!(client.connect().await.is_err());
        assert!(!client.is_ready());
    }
}
