//! Identity → balance pipeline.
//!
//! [`BalanceResolver`] ties the identity resolver, chain client and price feed
//! together and reduces every failure to a [`ResolutionOutcome`] the rendering
//! layer can show directly.

use futures_util::stream::{FuturesOrdered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::chain::{CallPolicy, ChainClient, EthersTokenReader, FailureReason};
use crate::config::Config;
use crate::format::balance_result;
use crate::identity::{IdentityDirectory, IdentityResolver, NeynarDirectory, Resolution};
use crate::pricefeed::{BinancePriceFeed, PriceFeed};
use crate::types::{
    BalanceResult, ChainEndpoint, ConfidenceWarning, RawBalance, ResolvedCandidate,
    ViewerIdentity,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Success {
        candidate: ResolvedCandidate,
        balance: BalanceResult,
        /// Set when the address came from an untrusted derivation.
        warning: Option<ConfidenceWarning>,
    },
    NoIdentity,
    NoAddressFound,
    ChainCallFailed {
        reason: FailureReason,
    },
    InvalidAddress,
}

impl ResolutionOutcome {
    /// Short user-facing line. Never contains diagnostic detail.
    pub fn headline(&self, symbol: &str) -> String {
        match self {
            ResolutionOutcome::Success { balance, .. } => {
                format!("{} {}", balance.formatted, symbol)
            }
            ResolutionOutcome::NoIdentity | ResolutionOutcome::NoAddressFound => {
                "No connected wallet found".to_string()
            }
            ResolutionOutcome::InvalidAddress => "Invalid wallet address".to_string(),
            ResolutionOutcome::ChainCallFailed { .. } => "Error fetching balance".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResolutionOutcome::Success { .. })
    }
}

/// One candidate's result in [`BalanceResolver::resolve_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateBalance {
    pub candidate: ResolvedCandidate,
    pub balance: Option<BalanceResult>,
    pub failure: Option<FailureReason>,
}

/// Balances of every candidate for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Portfolio {
    pub entries: Vec<CandidateBalance>,
    /// Sum over the candidates that succeeded.
    pub total: BalanceResult,
    pub warning: Option<ConfidenceWarning>,
}

pub struct BalanceResolver {
    identities: IdentityResolver,
    chain: ChainClient,
    prices: Option<Arc<dyn PriceFeed>>,
    price_pair: Option<String>,
    concurrent: bool,
    request_timeout: Duration,
}

impl BalanceResolver {
    pub fn new(identities: IdentityResolver, chain: ChainClient) -> Self {
        Self {
            identities,
            chain,
            prices: None,
            price_pair: None,
            concurrent: false,
            request_timeout: Duration::from_secs(20),
        }
    }

    /// Production wiring: ethers JSON-RPC reader, Neynar directory (if a key
    /// is configured) and Binance prices (if a pair is configured).
    pub fn from_config(config: &Config) -> Self {
        let directory = NeynarDirectory::from_config(&config.directory)
            .map(|d| Arc::new(d) as Arc<dyn IdentityDirectory>);
        if directory.is_none() {
            info!("📒 No directory API key, skipping id lookups");
        }
        let identities = IdentityResolver::new(
            directory,
            config.lookup_timeout(),
            config.resolver.allow_derived_fallback,
        );
        let chain = ChainClient::new(
            Arc::new(EthersTokenReader::new()),
            CallPolicy::from(&config.chain),
        );

        let mut resolver = Self::new(identities, chain)
            .concurrent(config.resolver.concurrent_candidates)
            .with_request_timeout(config.request_timeout());
        if let Some(pair) = &config.price_feed.pair {
            resolver = resolver.with_price_feed(
                Arc::new(BinancePriceFeed::from_config(&config.price_feed)),
                pair,
            );
        }
        resolver
    }

    pub fn with_price_feed(mut self, feed: Arc<dyn PriceFeed>, pair: &str) -> Self {
        self.prices = Some(feed);
        self.price_pair = Some(pair.to_string());
        self
    }

    /// Query all candidates at once. The winner is still picked by priority.
    pub fn concurrent(mut self, enabled: bool) -> Self {
        self.concurrent = enabled;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Resolve `identity` and read its balance from the highest-priority
    /// candidate that answers.
    pub async fn resolve_balance(
        &self,
        identity: &ViewerIdentity,
        endpoint: &ChainEndpoint,
    ) -> ResolutionOutcome {
        match tokio::time::timeout(self.request_timeout, self.resolve_inner(identity, endpoint))
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    "⚠️ Request budget of {:?} exhausted for {:?}",
                    self.request_timeout, identity
                );
                ResolutionOutcome::ChainCallFailed {
                    reason: FailureReason::Timeout,
                }
            }
        }
    }

    /// Like [`resolve_balance`](Self::resolve_balance) but reads every
    /// candidate and sums the balances. `Err` carries the terminal outcome
    /// when nothing could be read.
    pub async fn resolve_all(
        &self,
        identity: &ViewerIdentity,
        endpoint: &ChainEndpoint,
    ) -> Result<Portfolio, ResolutionOutcome> {
        match tokio::time::timeout(self.request_timeout, self.resolve_all_inner(identity, endpoint))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "⚠️ Request budget of {:?} exhausted for {:?}",
                    self.request_timeout, identity
                );
                Err(ResolutionOutcome::ChainCallFailed {
                    reason: FailureReason::Timeout,
                })
            }
        }
    }

    async fn resolve_inner(
        &self,
        identity: &ViewerIdentity,
        endpoint: &ChainEndpoint,
    ) -> ResolutionOutcome {
        let resolution = self.identities.resolve(identity).await;
        if resolution.is_empty() {
            return classify_empty(identity, &resolution);
        }

        let (fetched, price) = tokio::join!(
            async {
                if self.concurrent {
                    self.first_success_concurrent(&resolution.candidates, endpoint)
                        .await
                } else {
                    self.first_success_sequential(&resolution.candidates, endpoint)
                        .await
                }
            },
            self.spot_price(),
        );

        match fetched {
            Ok((candidate, raw)) => {
                let balance = balance_result(raw, price);
                let warning = candidate.source.confidence_warning();
                info!(
                    "✅ {} {} for {} via {:?}",
                    balance.formatted, endpoint.token_symbol, candidate.address, candidate.source
                );
                if let Some(w) = warning {
                    warn!("⚠️ Balance for {} shown with warning {:?}", candidate.address, w);
                }
                ResolutionOutcome::Success {
                    candidate,
                    balance,
                    warning,
                }
            }
            Err(reason) => ResolutionOutcome::ChainCallFailed { reason },
        }
    }

    async fn resolve_all_inner(
        &self,
        identity: &ViewerIdentity,
        endpoint: &ChainEndpoint,
    ) -> Result<Portfolio, ResolutionOutcome> {
        let resolution = self.identities.resolve(identity).await;
        if resolution.is_empty() {
            return Err(classify_empty(identity, &resolution));
        }

        let lookups = resolution.candidates.iter().map(|candidate| async move {
            (*candidate, self.chain.get_balance(endpoint, &candidate.address).await)
        });
        let (results, price) = tokio::join!(futures_util::future::join_all(lookups), self.spot_price());

        let mut entries = Vec::with_capacity(results.len());
        let mut total: Option<RawBalance> = None;
        let mut warning = None;
        let mut last_failure = FailureReason::NetworkError;

        for (candidate, result) in results {
            match result {
                Ok(raw) => {
                    total = Some(match total {
                        None => raw,
                        Some(sum) => RawBalance {
                            amount: sum.amount.saturating_add(raw.amount),
                            decimals: sum.decimals,
                        },
                    });
                    warning = warning.or(candidate.source.confidence_warning());
                    entries.push(CandidateBalance {
                        candidate,
                        balance: Some(balance_result(raw, price)),
                        failure: None,
                    });
                }
                Err(e) => {
                    error!(
                        "❌ Balance read for {} failed: {}",
                        candidate.address,
                        e.diagnostic()
                    );
                    last_failure = e.reason();
                    entries.push(CandidateBalance {
                        candidate,
                        balance: None,
                        failure: Some(e.reason()),
                    });
                }
            }
        }

        match total {
            Some(total) => Ok(Portfolio {
                entries,
                total: balance_result(total, price),
                warning,
            }),
            None => Err(ResolutionOutcome::ChainCallFailed {
                reason: last_failure,
            }),
        }
    }

    async fn first_success_sequential(
        &self,
        candidates: &[ResolvedCandidate],
        endpoint: &ChainEndpoint,
    ) -> Result<(ResolvedCandidate, RawBalance), FailureReason> {
        let mut last_failure = FailureReason::NetworkError;
        for candidate in candidates {
            match self.chain.get_balance(endpoint, &candidate.address).await {
                Ok(raw) => return Ok((*candidate, raw)),
                Err(e) => {
                    error!(
                        "❌ Balance read for {} failed: {}",
                        candidate.address,
                        e.diagnostic()
                    );
                    last_failure = e.reason();
                }
            }
        }
        Err(last_failure)
    }

    /// All lookups run at once; results are consumed in priority order so the
    /// winner is the same as in the sequential path.
    async fn first_success_concurrent(
        &self,
        candidates: &[ResolvedCandidate],
        endpoint: &ChainEndpoint,
    ) -> Result<(ResolvedCandidate, RawBalance), FailureReason> {
        let mut pending: FuturesOrdered<_> = candidates
            .iter()
            .map(|candidate| async move {
                (*candidate, self.chain.get_balance(endpoint, &candidate.address).await)
            })
            .collect();

        let mut last_failure = FailureReason::NetworkError;
        while let Some((candidate, result)) = pending.next().await {
            match result {
                Ok(raw) => return Ok((candidate, raw)),
                Err(e) => {
                    error!(
                        "❌ Balance read for {} failed: {}",
                        candidate.address,
                        e.diagnostic()
                    );
                    last_failure = e.reason();
                }
            }
        }
        Err(last_failure)
    }

    async fn spot_price(&self) -> Option<rust_decimal::Decimal> {
        let (feed, pair) = match (&self.prices, &self.price_pair) {
            (Some(feed), Some(pair)) => (feed, pair),
            _ => return None,
        };
        // the price is decoration; it must not eat the chain calls' budget
        tokio::time::timeout(self.chain.policy().timeout, feed.spot_price(pair))
            .await
            .ok()
            .flatten()
    }
}

fn classify_empty(identity: &ViewerIdentity, resolution: &Resolution) -> ResolutionOutcome {
    if resolution.rejected.is_some() {
        ResolutionOutcome::InvalidAddress
    } else if identity.is_empty() {
        ResolutionOutcome::NoIdentity
    } else {
        ResolutionOutcome::NoAddressFound
    }
}
