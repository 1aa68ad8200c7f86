//! Unsigned transaction assembly

use super::gas::GasPricing;
use super::nonce::NonceTracker;
use crate::chain::NodeClient;
use crate::error::{ClientError, ClientResult};

use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::Arc;
use tracing::debug;

/// What the transaction does
#[derive(Debug, Clone)]
pub enum TxKind {
    /// Contract creation: bytecode followed by encoded constructor arguments
    Deploy { init_code: Bytes },
    /// Message call; empty `data` is a plain value transfer
    Call { to: Address, data: Bytes },
}

/// Gas limit policy
#[derive(Debug, Clone, Copy)]
pub enum GasLimit {
    Fixed(U256),
    Estimate,
}

/// Caller-controlled inputs of one build
#[derive(Debug, Clone)]
pub struct TxParams {
    pub value: U256,
    pub gas_limit: GasLimit,
    /// Overrides the builder's default pricing
    pub pricing: Option<GasPricing>,
}

impl Default for TxParams {
    fn default() -> Self {
        Self {
            value: U256::zero(),
            gas_limit: GasLimit::Estimate,
            pricing: None,
        }
    }
}

impl TxParams {
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: U256) -> Self {
        self.gas_limit = GasLimit::Fixed(gas_limit);
        self
    }

    pub fn with_pricing(mut self, pricing: GasPricing) -> Self {
        self.pricing = Some(pricing);
        self
    }
}

/// Fully populated legacy transaction, ready for signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub from: Address,
    /// `None` creates a contract
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub chain_id: u64,
}

impl UnsignedTransaction {
    pub fn is_creation(&self) -> bool {
        self.to.is_none()
    }

    /// EIP-155 legacy request for signing and RPC
    pub fn to_typed(&self) -> TypedTransaction {
        let mut request = TransactionRequest::new()
            .from(self.from)
            .value(self.value)
            .data(self.data.clone())
            .nonce(self.nonce)
            .gas_price(self.gas_price)
            .gas(self.gas_limit)
            .chain_id(self.chain_id);
        if let Some(to) = self.to {
            request = request.to(to);
        }
        TypedTransaction::Legacy(request)
    }
}

/// Assembles unsigned transactions from node state
pub struct TransactionBuilder {
    node: Arc<dyn NodeClient>,
    nonces: NonceTracker,
    pricing: GasPricing,
    chain_id: u64,
    /// Padding added to estimated gas limits, in percent
    gas_limit_buffer_percent: u64,
}

impl TransactionBuilder {
    pub fn new(node: Arc<dyn NodeClient>, pricing: GasPricing, chain_id: u64) -> Self {
        Self {
            nonces: NonceTracker::new(node.clone()),
            node,
            pricing,
            chain_id,
            gas_limit_buffer_percent: 0,
        }
    }

    pub fn with_gas_limit_buffer(mut self, percent: u64) -> Self {
        self.gas_limit_buffer_percent = percent;
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Read nonce and gas price, then fix or estimate the gas limit
    pub async fn build(
        &self,
        from: Address,
        kind: TxKind,
        params: TxParams,
    ) -> ClientResult<UnsignedTransaction> {
        let nonce = self.nonces.next_nonce(from).await?;

        let pricing = params.pricing.as_ref().unwrap_or(&self.pricing);
        let gas_price = pricing.resolve(self.node.as_ref()).await?;

        let (to, data) = match kind {
            TxKind::Deploy { init_code } => (None, init_code),
            TxKind::Call { to, data } => (Some(to), data),
        };

        let mut tx = UnsignedTransaction {
            from,
            to,
            value: params.value,
            data,
            nonce,
            gas_price,
            gas_limit: U256::zero(),
            chain_id: self.chain_id,
        };

        tx.gas_limit = match params.gas_limit {
            GasLimit::Fixed(limit) => limit,
            GasLimit::Estimate => self.estimate(&tx).await?,
        };

        debug!(
            "Built tx from {:?} nonce {} gas {} @ {} wei",
            tx.from, tx.nonce, tx.gas_limit, tx.gas_price
        );
        Ok(tx)
    }

    /// `eth_estimateGas` over the populated transaction without a gas field
    async fn estimate(&self, tx: &UnsignedTransaction) -> ClientResult<U256> {
        let mut estimate_tx = tx.to_typed();
        if let TypedTransaction::Legacy(ref mut request) = estimate_tx {
            request.gas = None;
        }

        let estimate = self
            .node
            .estimate_gas(&estimate_tx)
            .await
            .map_err(|e| ClientError::EstimationFailed(e.to_string()))?;

        let buffer = estimate * self.gas_limit_buffer_percent / 100;
        Ok(estimate + buffer)
    }
}
