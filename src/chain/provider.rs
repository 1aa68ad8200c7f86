//! Node provider with multi-RPC support and read failover

use super::NodeClient;
use crate::config::NetworkOptions;
use crate::error::{ClientError, ClientResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider, ProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// HTTP node connection; reads fail over between the configured URLs,
/// raw transactions always go to the active provider only
pub struct EthNode {
    chain_id: u64,
    http_providers: Vec<Provider<Http>>,
    current_provider: AtomicUsize,
}

impl EthNode {
    /// Create a node connection and check the node serves the configured chain
    pub async fn connect(options: &NetworkOptions) -> ClientResult<Self> {
        let node = Self::new(options)?;

        let reported = node
            .read("chain_id", |p| async move { p.get_chainid().await })
            .await
            .map_err(|e| ClientError::rpc("chain_id", e))?;
        if reported != U256::from(options.network) {
            return Err(ClientError::Config(format!(
                "node reports chain id {} but options say {}",
                reported, options.network
            )));
        }

        info!(
            "Connected to chain {} via {}",
            options.network, options.provider
        );
        Ok(node)
    }

    /// Create a node connection without contacting it
    pub fn new(options: &NetworkOptions) -> ClientResult<Self> {
        let mut http_providers = Vec::new();

        for url in options.rpc_urls() {
            match Provider::<Http>::try_from(url) {
                Ok(provider) => {
                    http_providers.push(provider.interval(Duration::from_millis(100)));
                    debug!("Added HTTP provider for chain {}: {}", options.network, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(ClientError::Config(format!(
                "no valid RPC URL for chain {}",
                options.network
            )));
        }

        Ok(Self {
            chain_id: options.network,
            http_providers,
            current_provider: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.chain_id, next);
    }

    /// Run a read on each provider in turn until one answers
    async fn read<'a, T, F, Fut>(&'a self, operation: &'static str, f: F) -> Result<T, ProviderError>
    where
        F: Fn(&'a Provider<Http>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut last_error = None;
        for _ in 0..self.http_providers.len() {
            match f(self.http()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "{} failed on chain {}: {}",
                        operation, self.chain_id, e
                    );
                    last_error = Some(e);
                    if self.http_providers.len() > 1 {
                        self.failover();
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::CustomError(format!("{operation}: no providers"))
        }))
    }
}

#[async_trait]
impl NodeClient for EthNode {
    async fn chain_id(&self) -> Result<U256, ProviderError> {
        self.read("chain_id", |p| async move { p.get_chainid().await })
            .await
    }

    async fn pending_transaction_count(&self, address: Address) -> Result<U256, ProviderError> {
        self.read("transaction_count", |p| async move {
            p.get_transaction_count(address, Some(BlockNumber::Pending.into()))
                .await
        })
        .await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, ProviderError> {
        // A revert is an answer, not an outage: no failover
        self.http().estimate_gas(tx, None).await
    }

    async fn gas_price(&self) -> Result<U256, ProviderError> {
        self.read("gas_price", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn balance(&self, address: Address) -> Result<U256, ProviderError> {
        self.read("balance", |p| async move { p.get_balance(address, None).await })
            .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ProviderError> {
        let pending = self.http().send_raw_transaction(raw).await?;
        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        self.read("receipt", |p| async move {
            p.get_transaction_receipt(tx_hash).await
        })
        .await
    }

    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, ProviderError> {
        self.http().call(tx, None).await
    }
}
