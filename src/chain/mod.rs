//! Chain module - the node RPC boundary
//!
//! This module provides:
//! - The `NodeClient` trait every pipeline stage talks to
//! - An ethers HTTP implementation with read failover
//! - The `Receipt` returned by a confirmed submission

pub mod provider;

#[cfg(test)]
pub(crate) mod memory;

pub use provider::EthNode;

use async_trait::async_trait;
use ethers::providers::ProviderError;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256, U64};

/// Node RPC calls used by the submission pipeline
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Chain id reported by the node
    async fn chain_id(&self) -> Result<U256, ProviderError>;

    /// `eth_getTransactionCount(address, "pending")`
    async fn pending_transaction_count(&self, address: Address) -> Result<U256, ProviderError>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, ProviderError>;

    async fn gas_price(&self) -> Result<U256, ProviderError>;

    async fn balance(&self, address: Address) -> Result<U256, ProviderError>;

    /// `eth_sendRawTransaction`, returning the transaction hash
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ProviderError>;

    async fn transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, ProviderError>;

    /// `eth_call` against the latest block
    async fn call(&self, tx: &TypedTransaction) -> Result<Bytes, ProviderError>;
}

/// Confirmation record of one included transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: H256,
    pub contract_address: Option<Address>,
    /// `true` when the node reports status 1
    pub status: bool,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status
    }
}

impl From<TransactionReceipt> for Receipt {
    fn from(receipt: TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            contract_address: receipt.contract_address,
            status: receipt.status == Some(U64::from(1)),
            block_number: receipt.block_number.map(|b| b.as_u64()),
            gas_used: receipt.gas_used,
        }
    }
}
