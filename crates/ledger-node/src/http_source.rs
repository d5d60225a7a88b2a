use crate::constants::CHAIN_PATH;
use ledger_core::{ChainResponse, ChainSource, PeerError};
use std::time::Duration;
use tracing::debug;

/// Fetches peer chains from `http://{peer}/blockchain`.
#[derive(Clone, Debug)]
pub struct HttpChainSource {
    client: reqwest::Client,
}

impl HttpChainSource {
    /// `timeout` bounds each peer request, connect included.
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl ChainSource for HttpChainSource {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, PeerError> {
        let url = format!("http://{peer}{CHAIN_PATH}");
        debug!(%url, "fetching peer chain");
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PeerError::Unreachable {
                peer: peer.to_string(),
                reason: e.to_string(),
            })?;
        let status = res.status();
        if !status.is_success() {
            return Err(PeerError::BadResponse {
                peer: peer.to_string(),
                status: status.as_u16(),
            });
        }
        res.json::<ChainResponse>()
            .await
            .map_err(|e| PeerError::Malformed {
                peer: peer.to_string(),
                reason: e.to_string(),
            })
    }
}
