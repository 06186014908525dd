use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::address::ChainAddress;
use crate::types::ChainEndpoint;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub chain: ChainConfig,
    pub directory: DirectoryConfig,
    pub price_feed: PriceFeedConfig,
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    pub token_contract: String,
    pub token_symbol: String,
    pub call_timeout_ms: u64,
    pub retry_count: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryConfig {
    pub api_url: String,
    /// Lookup is skipped entirely without a key
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PriceFeedConfig {
    /// e.g. `POLUSDT`; no pair means no fiat estimate
    pub pair: Option<String>,
    pub api_url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    pub allow_derived_fallback: bool,
    pub concurrent_candidates: bool,
    pub request_timeout_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 137,
            rpc_url: "https://polygon-rpc.com".to_string(),
            token_contract: "0x3150E01c36ad3Af80bA16C1836eFCD967E96776e".to_string(),
            token_symbol: "GOLDIES".to_string(),
            call_timeout_ms: 8_000,
            retry_count: 1,
            retry_backoff_ms: 300,
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.neynar.com".to_string(),
            api_key: None,
            timeout_ms: 3_000,
        }
    }
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            pair: None,
            api_url: "https://api.binance.com".to_string(),
            timeout_ms: 2_000,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            allow_derived_fallback: true,
            concurrent_candidates: false,
            request_timeout_ms: 20_000,
        }
    }
}

/// Typed env var; unset or unparseable falls back to `default`.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Unset or blank is `None`.
fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let chain_defaults = ChainConfig::default();
        let chain = ChainConfig {
            chain_id: env_or("CHAIN_ID", chain_defaults.chain_id),
            rpc_url: env_opt("RPC_URL").unwrap_or(chain_defaults.rpc_url),
            token_contract: env_opt("TOKEN_CONTRACT_ADDRESS")
                .unwrap_or(chain_defaults.token_contract),
            token_symbol: env_opt("TOKEN_SYMBOL").unwrap_or(chain_defaults.token_symbol),
            call_timeout_ms: env_or("RPC_CALL_TIMEOUT_MS", chain_defaults.call_timeout_ms),
            retry_count: env_or("RPC_RETRY_COUNT", chain_defaults.retry_count),
            retry_backoff_ms: env_or("RPC_RETRY_BACKOFF_MS", chain_defaults.retry_backoff_ms),
        };

        let directory_defaults = DirectoryConfig::default();
        let directory = DirectoryConfig {
            api_url: env_opt("DIRECTORY_API_URL").unwrap_or(directory_defaults.api_url),
            api_key: env_opt("DIRECTORY_API_KEY"),
            timeout_ms: env_or("DIRECTORY_TIMEOUT_MS", directory_defaults.timeout_ms),
        };

        let price_defaults = PriceFeedConfig::default();
        let price_feed = PriceFeedConfig {
            pair: env_opt("PRICE_FEED_PAIR"),
            api_url: env_opt("PRICE_FEED_API_URL").unwrap_or(price_defaults.api_url),
            timeout_ms: env_or("PRICE_FEED_TIMEOUT_MS", price_defaults.timeout_ms),
        };

        let resolver_defaults = ResolverConfig::default();
        let resolver = ResolverConfig {
            allow_derived_fallback: env_or(
                "ALLOW_DERIVED_FALLBACK",
                resolver_defaults.allow_derived_fallback,
            ),
            concurrent_candidates: env_or(
                "CONCURRENT_CANDIDATES",
                resolver_defaults.concurrent_candidates,
            ),
            request_timeout_ms: env_or("REQUEST_TIMEOUT_MS", resolver_defaults.request_timeout_ms),
        };

        Ok(Config {
            chain,
            directory,
            price_feed,
            resolver,
        })
    }

    /// Validated endpoint for the configured chain and token.
    pub fn endpoint(&self) -> anyhow::Result<ChainEndpoint> {
        url::Url::parse(&self.chain.rpc_url)
            .with_context(|| format!("invalid RPC_URL {:?}", self.chain.rpc_url))?;
        let token_contract = ChainAddress::parse(&self.chain.token_contract)
            .with_context(|| {
                format!(
                    "invalid TOKEN_CONTRACT_ADDRESS {:?}",
                    self.chain.token_contract
                )
            })?;

        Ok(ChainEndpoint {
            chain_id: self.chain.chain_id,
            rpc_url: self.chain.rpc_url.clone(),
            token_contract,
            token_symbol: self.chain.token_symbol.clone(),
        })
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.directory.timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            chain: ChainConfig::default(),
            directory: DirectoryConfig::default(),
            price_feed: PriceFeedConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }

    #[test]
    fn test_default_endpoint() {
        let endpoint = config().endpoint().unwrap();
        assert_eq!(endpoint.chain_id, 137);
        assert_eq!(
            endpoint.token_contract.checksummed(),
            "0x3150E01c36ad3Af80bA16C1836eFCD967E96776e"
        );
        assert_eq!(endpoint.token_symbol, "GOLDIES");
    }

    #[test]
    fn test_bad_endpoint_config_is_rejected() {
        let mut bad_url = config();
        bad_url.chain.rpc_url = "polygon rpc".to_string();
        assert!(bad_url.endpoint().is_err());

        let mut bad_token = config();
        bad_token.chain.token_contract = "0x3150e01c36ad3af80ba16c1836efcd967e9677".to_string();
        assert!(bad_token.endpoint().is_err());
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("TOKEN_BALANCE_CARD_TEST_RETRIES", "lots");
        assert_eq!(env_or("TOKEN_BALANCE_CARD_TEST_RETRIES", 1u32), 1);
        env::set_var("TOKEN_BALANCE_CARD_TEST_RETRIES", " 3 ");
        assert_eq!(env_or("TOKEN_BALANCE_CARD_TEST_RETRIES", 1u32), 3);
        env::remove_var("TOKEN_BALANCE_CARD_TEST_RETRIES");
    }
}
