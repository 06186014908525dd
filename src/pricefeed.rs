use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::PriceFeedConfig;

const CACHE_DURATION: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum PriceFeedError {
    #[error("price request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("price API returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("unparseable price {0:?}")]
    BadPrice(String),
}

/// Best-effort spot price source. Never fails the caller: no price is `None`.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn spot_price(&self, pair: &str) -> Option<Decimal>;
}

#[derive(Debug, Deserialize)]
struct BinancePriceResponse {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

#[derive(Clone)]
struct CachedPrice {
    price: Decimal,
    timestamp: Instant,
}

pub struct BinancePriceFeed {
    http_client: Client,
    api_url: String,
    cache: Arc<RwLock<HashMap<String, CachedPrice>>>,
}

impl BinancePriceFeed {
    pub fn new(api_url: &str, timeout: Duration) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_url: api_url.trim_end_matches('/').to_string(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &PriceFeedConfig) -> Self {
        Self::new(&config.api_url, Duration::from_millis(config.timeout_ms))
    }

    pub async fn get_price(&self, pair: &str) -> Result<Decimal, PriceFeedError> {
        let symbol = pair.to_uppercase();

        // 1. Check cache
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&symbol) {
                if cached.timestamp.elapsed() < CACHE_DURATION {
                    return Ok(cached.price);
                }
            }
        }

        // 2. Fetch from Binance
        let url = format!("{}/api/v3/ticker/price", self.api_url);
        let resp = self
            .http_client
            .get(url)
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PriceFeedError::Status(resp.status()));
        }

        let data: BinancePriceResponse = resp.json().await?;
        let price =
            Decimal::from_str(&data.price).map_err(|_| PriceFeedError::BadPrice(data.price.clone()))?;

        // 3. Update cache
        {
            let mut cache = self.cache.write().await;
            cache.insert(
                symbol,
                CachedPrice {
                    price,
                    timestamp: Instant::now(),
                },
            );
        }

        Ok(price)
    }
}

#[async_trait]
impl PriceFeed for BinancePriceFeed {
    async fn spot_price(&self, pair: &str) -> Option<Decimal> {
        match self.get_price(pair).await {
            Ok(price) => {
                debug!("💱 {} spot price {}", pair, price);
                Some(price)
            }
            Err(e) => {
                warn!("⚠️ No price for {}: {}", pair, e);
                None
            }
        }
    }
}
