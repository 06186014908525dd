use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::error::ChainCallError;
use super::reader::TokenReader;
use crate::address::ChainAddress;
use crate::config::ChainConfig;
use crate::types::{ChainEndpoint, RawBalance};

/// Per-call policy: independent timeout, bounded retries on transient errors.
#[derive(Debug, Clone, Copy)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            retries: 1,
            backoff: Duration::from_millis(300),
        }
    }
}

impl From<&ChainConfig> for CallPolicy {
    fn from(config: &ChainConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.call_timeout_ms),
            retries: config.retry_count,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Reads a token balance and its decimals for one address.
///
/// `decimals` is immutable for a deployed token, so it is cached for the life
/// of the process, keyed by chain id and contract. `balanceOf` is always read
/// fresh.
#[derive(Clone)]
pub struct ChainClient {
    reader: Arc<dyn TokenReader>,
    policy: CallPolicy,
    decimals_cache: Arc<RwLock<HashMap<(u64, ChainAddress), u8>>>,
}

impl ChainClient {
    pub fn new(reader: Arc<dyn TokenReader>, policy: CallPolicy) -> Self {
        Self {
            reader,
            policy,
            decimals_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn policy(&self) -> CallPolicy {
        self.policy
    }

    pub async fn get_balance(
        &self,
        endpoint: &ChainEndpoint,
        address: &ChainAddress,
    ) -> Result<RawBalance, ChainCallError> {
        let (amount, decimals) = tokio::try_join!(
            self.call_with_retry("balanceOf", || self.reader.balance_of(endpoint, address)),
            self.decimals(endpoint),
        )?;
        debug!(
            "Balance for {} on chain {}: raw={} decimals={}",
            address, endpoint.chain_id, amount, decimals
        );
        Ok(RawBalance { amount, decimals })
    }

    async fn decimals(&self, endpoint: &ChainEndpoint) -> Result<u8, ChainCallError> {
        let key = (endpoint.chain_id, endpoint.token_contract);

        // 1. Check cache
        {
            let cache = self.decimals_cache.read().await;
            if let Some(decimals) = cache.get(&key) {
                return Ok(*decimals);
            }
        }

        // 2. Fetch from contract
        let decimals = self
            .call_with_retry("decimals", || self.reader.decimals(endpoint))
            .await?;

        // 3. Update cache
        {
            let mut cache = self.decimals_cache.write().await;
            cache.insert(key, decimals);
        }

        Ok(decimals)
    }

    async fn call_with_retry<T, F, Fut>(&self, method: &str, mut call: F) -> Result<T, ChainCallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainCallError>>,
    {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.policy.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ChainCallError::timeout(method)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.reason().is_transient() && attempt < self.policy.retries => {
                    attempt += 1;
                    warn!(
                        "⚠️ {} failed ({}), retry {}/{}: {}",
                        method,
                        e.reason(),
                        attempt,
                        self.policy.retries,
                        e.diagnostic()
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::error::FailureReason;
    use async_trait::async_trait;
    use ethers::types::U256;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays scripted results; an exhausted script answers zero / 18.
    struct ScriptedReader {
        balances: Mutex<VecDeque<Result<U256, ChainCallError>>>,
        decimals: Mutex<VecDeque<Result<u8, ChainCallError>>>,
        balance_calls: AtomicUsize,
        decimals_calls: AtomicUsize,
        delay: Duration,
        decimals_delay: Duration,
    }

    impl ScriptedReader {
        fn new(script: Vec<Result<U256, ChainCallError>>) -> Self {
            Self {
                balances: Mutex::new(script.into()),
                decimals: Mutex::new(VecDeque::new()),
                balance_calls: AtomicUsize::new(0),
                decimals_calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                decimals_delay: Duration::ZERO,
            }
        }

        fn with_decimals(self, script: Vec<Result<u8, ChainCallError>>) -> Self {
            *self.decimals.lock().unwrap() = script.into();
            self
        }
    }

    #[async_trait]
    impl TokenReader for ScriptedReader {
        async fn balance_of(
            &self,
            _endpoint: &ChainEndpoint,
            _owner: &ChainAddress,
        ) -> Result<U256, ChainCallError> {
            self.balance_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.balances
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(U256::zero()))
        }

        async fn decimals(&self, _endpoint: &ChainEndpoint) -> Result<u8, ChainCallError> {
            self.decimals_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.decimals_delay).await;
            self.decimals.lock().unwrap().pop_front().unwrap_or(Ok(18))
        }
    }

    fn endpoint() -> ChainEndpoint {
        ChainEndpoint {
            chain_id: 137,
            rpc_url: "http://127.0.0.1:1".to_string(),
            token_contract: ChainAddress::parse("0x3150E01c36ad3Af80bA16C1836eFCD967E96776e")
                .unwrap(),
            token_symbol: "GOLDIES".to_string(),
        }
    }

    fn policy() -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(100),
            retries: 1,
            backoff: Duration::from_millis(5),
        }
    }

    fn owner() -> ChainAddress {
        ChainAddress::from_numeric_id(7)
    }

    fn net_err() -> ChainCallError {
        ChainCallError::new(FailureReason::NetworkError, "connection reset by peer")
    }

    #[tokio::test]
    async fn test_decimals_cached_balance_not() {
        let reader = Arc::new(ScriptedReader::new(vec![Ok(U256::from(1)), Ok(U256::from(2))]));
        let client = ChainClient::new(reader.clone(), policy());

        let first = client.get_balance(&endpoint(), &owner()).await.unwrap();
        let second = client.get_balance(&endpoint(), &owner()).await.unwrap();

        assert_eq!(first.amount, U256::from(1));
        assert_eq!(second.amount, U256::from(2));
        assert_eq!(second.decimals, 18);
        assert_eq!(reader.balance_calls.load(Ordering::SeqCst), 2);
        assert_eq!(reader.decimals_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_once_on_network_error() {
        let reader = Arc::new(ScriptedReader::new(vec![Err(net_err()), Ok(U256::from(5))]));
        let client = ChainClient::new(reader.clone(), policy());

        let balance = client.get_balance(&endpoint(), &owner()).await.unwrap();
        assert_eq!(balance.amount, U256::from(5));
        assert_eq!(reader.balance_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_failure_is_terminal() {
        let reader = Arc::new(ScriptedReader::new(vec![
            Err(net_err()),
            Err(net_err()),
            Ok(U256::from(5)),
        ]));
        let client = ChainClient::new(reader.clone(), policy());

        let err = client.get_balance(&endpoint(), &owner()).await.unwrap_err();
        assert_eq!(err.reason(), FailureReason::NetworkError);
        assert_eq!(reader.balance_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_revert_is_not_retried() {
        let reader = Arc::new(ScriptedReader::new(vec![Err(ChainCallError::new(
            FailureReason::ContractReverted,
            "execution reverted",
        ))]));
        let client = ChainClient::new(reader.clone(), policy());

        let err = client.get_balance(&endpoint(), &owner()).await.unwrap_err();
        assert_eq!(err.reason(), FailureReason::ContractReverted);
        assert_eq!(reader.balance_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_call_times_out_after_retry() {
        let mut reader = ScriptedReader::new(vec![]);
        reader.delay = Duration::from_secs(5);
        let reader = Arc::new(reader);
        let client = ChainClient::new(reader.clone(), policy());

        let started = std::time::Instant::now();
        let err = client.get_balance(&endpoint(), &owner()).await.unwrap_err();
        assert_eq!(err.reason(), FailureReason::Timeout);
        assert_eq!(reader.balance_calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_failed_decimals_is_not_cached() {
        let malformed = ChainCallError::new(FailureReason::MalformedResponse, "bad abi word");
        let reader = Arc::new(ScriptedReader::new(vec![]).with_decimals(vec![Err(malformed), Ok(6)]));
        let client = ChainClient::new(reader.clone(), policy());

        let err = client.get_balance(&endpoint(), &owner()).await.unwrap_err();
        assert_eq!(err.reason(), FailureReason::MalformedResponse);
        assert_eq!(reader.decimals_calls.load(Ordering::SeqCst), 1);

        let balance = client.get_balance(&endpoint(), &owner()).await.unwrap();
        assert_eq!(balance.decimals, 6);
        assert_eq!(reader.decimals_calls.load(Ordering::SeqCst), 2);

        client.get_balance(&endpoint(), &owner()).await.unwrap();
        assert_eq!(reader.decimals_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timed_out_decimals_is_not_cached() {
        let mut reader = ScriptedReader::new(vec![]);
        reader.decimals_delay = Duration::from_secs(5);
        let reader = Arc::new(reader);
        let client = ChainClient::new(reader.clone(), policy());

        let err = client.get_balance(&endpoint(), &owner()).await.unwrap_err();
        assert_eq!(err.reason(), FailureReason::Timeout);
        assert_eq!(reader.decimals_calls.load(Ordering::SeqCst), 2);
        assert!(client.decimals_cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_balance_failure_does_not_wait_for_decimals() {
        let mut reader = ScriptedReader::new(vec![Err(ChainCallError::new(
            FailureReason::ContractReverted,
            "execution reverted",
        ))]);
        reader.decimals_delay = Duration::from_secs(5);
        let reader = Arc::new(reader);
        let client = ChainClient::new(reader.clone(), policy());

        let started = std::time::Instant::now();
        let err = client.get_balance(&endpoint(), &owner()).await.unwrap_err();
        assert_eq!(err.reason(), FailureReason::ContractReverted);
        assert!(started.elapsed() < Duration::from_millis(90));
    }
}
