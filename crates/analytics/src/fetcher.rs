//! Backend access.
//!
//! [`DataFetcher`] is the seam the view controller depends on; [`HttpFetcher`]
//! is the production implementation over `reqwest`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use foundation::GeometryCache;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::columns::ColumnCatalog;
use crate::features::{HexCollection, RegionCollection};
use crate::protocol::{ErrorPayload, HexMapPayload, RegionMapPayload, ViewConfiguration};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Every way a fetch can fail, flattened to a message the UI can show.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchFailure {
    fn transport(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Source of analysis results.
///
/// Each call is a single attempt; retries are the caller's business.
pub trait DataFetcher {
    fn fetch_regions<'a>(
        &'a self,
        config: &'a ViewConfiguration,
    ) -> BoxFuture<'a, Result<RegionCollection, FetchFailure>>;

    fn fetch_hexes<'a>(
        &'a self,
        config: &'a ViewConfiguration,
    ) -> BoxFuture<'a, Result<HexCollection, FetchFailure>>;

    fn fetch_columns(&self) -> BoxFuture<'_, Result<ColumnCatalog, FetchFailure>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetcherConfig {
    /// Backend root, e.g. `http://localhost:8000`. A trailing slash is ignored.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
    cache: GeometryCache,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchFailure> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(FetchFailure::transport)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache: GeometryCache::california(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &ViewConfiguration,
    ) -> Result<T, FetchFailure> {
        let url = self.url(path);
        debug!(%url, target = %body.target, "POST");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(FetchFailure::transport)?;
        read_json(resp).await
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, FetchFailure> {
    let status = resp.status();
    let bytes = resp.bytes().await.map_err(FetchFailure::transport)?;
    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorPayload>(&bytes)
            .map(|p| p.message())
            .unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        return Err(FetchFailure::Status {
            status: status.as_u16(),
            message,
        });
    }
    serde_json::from_slice(&bytes).map_err(|e| FetchFailure::Malformed(e.to_string()))
}

impl DataFetcher for HttpFetcher {
    fn fetch_regions<'a>(
        &'a self,
        config: &'a ViewConfiguration,
    ) -> BoxFuture<'a, Result<RegionCollection, FetchFailure>> {
        Box::pin(async move {
            let payload: RegionMapPayload = self.post_json("/map/counties", config).await?;
            let collection = RegionCollection::from_payload(payload, &self.cache);
            info!(features = collection.len(), "fetched county map");
            Ok(collection)
        })
    }

    fn fetch_hexes<'a>(
        &'a self,
        config: &'a ViewConfiguration,
    ) -> BoxFuture<'a, Result<HexCollection, FetchFailure>> {
        Box::pin(async move {
            let payload: HexMapPayload = self.post_json("/map/hexes", config).await?;
            let collection = HexCollection::from_payload(payload).map_err(FetchFailure::Malformed)?;
            info!(
                features = collection.feature_count(),
                resolutions = collection.by_resolution.len(),
                "fetched hex map"
            );
            Ok(collection)
        })
    }

    fn fetch_columns(&self) -> BoxFuture<'_, Result<ColumnCatalog, FetchFailure>> {
        Box::pin(async move {
            let resp = self
                .client
                .get(self.url("/columns"))
                .send()
                .await
                .map_err(FetchFailure::transport)?;
            read_json(resp).await
        })
    }
}
