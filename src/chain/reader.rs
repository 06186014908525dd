use async_trait::async_trait;
use dashmap::DashMap;
use ethers::contract::ContractError;
use ethers::providers::{Http, Provider, ProviderError, RpcError};
use ethers::types::U256;
use std::sync::Arc;
use tracing::debug;

use super::contracts::Erc20;
use super::error::{ChainCallError, FailureReason};
use crate::address::ChainAddress;
use crate::types::ChainEndpoint;

/// The two contract reads the balance card needs.
///
/// Implementations classify their own failures; no transport error type leaks
/// past this trait.
#[async_trait]
pub trait TokenReader: Send + Sync {
    /// `balanceOf(owner)` on the endpoint's token contract
    async fn balance_of(
        &self,
        endpoint: &ChainEndpoint,
        owner: &ChainAddress,
    ) -> Result<U256, ChainCallError>;

    /// `decimals()` on the endpoint's token contract
    async fn decimals(&self, endpoint: &ChainEndpoint) -> Result<u8, ChainCallError>;
}

/// JSON-RPC reader backed by an ethers HTTP provider.
///
/// One provider is kept per RPC URL so connection pools are shared across
/// requests.
#[derive(Default)]
pub struct EthersTokenReader {
    providers: DashMap<String, Arc<Provider<Http>>>,
}

impl EthersTokenReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn provider(&self, endpoint: &ChainEndpoint) -> Result<Arc<Provider<Http>>, ChainCallError> {
        if let Some(provider) = self.providers.get(&endpoint.rpc_url) {
            return Ok(provider.clone());
        }

        let provider = Provider::<Http>::try_from(endpoint.rpc_url.as_str()).map_err(|e| {
            ChainCallError::new(
                FailureReason::NetworkError,
                format!("invalid rpc url {}: {}", endpoint.rpc_url, e),
            )
        })?;
        let provider = Arc::new(provider);
        debug!("🔌 New RPC provider for chain {}", endpoint.chain_id);
        self.providers
            .insert(endpoint.rpc_url.clone(), provider.clone());
        Ok(provider)
    }

    fn contract(&self, endpoint: &ChainEndpoint) -> Result<Erc20<Provider<Http>>, ChainCallError> {
        Ok(Erc20::new(
            endpoint.token_contract.as_address(),
            self.provider(endpoint)?,
        ))
    }
}

#[async_trait]
impl TokenReader for EthersTokenReader {
    async fn balance_of(
        &self,
        endpoint: &ChainEndpoint,
        owner: &ChainAddress,
    ) -> Result<U256, ChainCallError> {
        self.contract(endpoint)?
            .balance_of(owner.as_address())
            .call()
            .await
            .map_err(|e| classify_contract_error("balanceOf", e))
    }

    async fn decimals(&self, endpoint: &ChainEndpoint) -> Result<u8, ChainCallError> {
        self.contract(endpoint)?
            .decimals()
            .call()
            .await
            .map_err(|e| classify_contract_error("decimals", e))
    }
}

fn classify_contract_error(
    method: &str,
    err: ContractError<Provider<Http>>,
) -> ChainCallError {
    let reason = match &err {
        ContractError::Revert(_) => FailureReason::ContractReverted,
        ContractError::DecodingError(_)
        | ContractError::AbiError(_)
        | ContractError::DetokenizationError(_) => FailureReason::MalformedResponse,
        ContractError::MiddlewareError { e } => classify_provider_error(e),
        ContractError::ProviderError { e } => classify_provider_error(e),
        _ => FailureReason::MalformedResponse,
    };
    ChainCallError::new(reason, format!("{}: {}", method, err))
}

fn classify_provider_error(err: &ProviderError) -> FailureReason {
    if let Some(rpc_err) = err.as_error_response() {
        // geth reports reverts as code 3, others only in the message
        if rpc_err.code == 3 || rpc_err.message.to_lowercase().contains("revert") {
            return FailureReason::ContractReverted;
        }
        return FailureReason::NetworkError;
    }
    if err.as_serde_error().is_some() {
        return FailureReason::MalformedResponse;
    }
    FailureReason::NetworkError
}
