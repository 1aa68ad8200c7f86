//! In-memory node used by tests
//!
//! Decodes signed RLP, recovers the sender and enforces nonce order and
//! balances the way a real node would. Every read yields to the scheduler so
//! overlapping submissions interleave.

use super::NodeClient;

use async_trait::async_trait;
use ethers::providers::ProviderError;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, NameOrAddress, TransactionReceipt, H256, U256};
use ethers::utils::{get_contract_address, keccak256, rlp::Rlp};
use std::collections::HashMap;
use std::sync::Mutex;

pub(crate) const TRANSFER_GAS: u64 = 21_000;

#[derive(Default)]
struct NodeState {
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, U256>,
    receipts: HashMap<H256, TransactionReceipt>,
    receipt_polls: HashMap<H256, u32>,
    accepted: Vec<(Address, U256)>,
    estimate_error: Option<String>,
    withhold_receipts: bool,
    stall_receipts: bool,
    stall_broadcasts: bool,
    receipt_delay_polls: u32,
    revert_execution: bool,
    call_result: Bytes,
    block_number: u64,
}

pub(crate) struct InMemoryNode {
    chain_id: u64,
    state: Mutex<NodeState>,
}

impl InMemoryNode {
    pub(crate) fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(NodeState::default()),
        }
    }

    pub(crate) fn fund(&self, address: Address, amount: U256) {
        let mut state = self.state.lock().unwrap();
        *state.balances.entry(address).or_default() += amount;
    }

    pub(crate) fn balance_of(&self, address: Address) -> U256 {
        let state = self.state.lock().unwrap();
        state.balances.get(&address).copied().unwrap_or_default()
    }

    pub(crate) fn fail_estimates(&self, message: &str) {
        self.state.lock().unwrap().estimate_error = Some(message.to_string());
    }

    pub(crate) fn withhold_receipts(&self) {
        self.state.lock().unwrap().withhold_receipts = true;
    }

    /// Receipt polls never return
    pub(crate) fn stall_receipts(&self) {
        self.state.lock().unwrap().stall_receipts = true;
    }

    /// Raw transaction submissions never return
    pub(crate) fn stall_broadcasts(&self) {
        self.state.lock().unwrap().stall_broadcasts = true;
    }

    pub(crate) fn delay_receipts(&self, polls: u32) {
        self.state.lock().unwrap().receipt_delay_polls = polls;
    }

    pub(crate) fn revert_execution(&self) {
        self.state.lock().unwrap().revert_execution = true;
    }

    pub(crate) fn set_call_result(&self, output: Bytes) {
        self.state.lock().unwrap().call_result = output;
    }

    /// `(sender, nonce)` of every accepted transaction, in acceptance order
    pub(crate) fn accepted(&self) -> Vec<(Address, U256)> {
        self.state.lock().unwrap().accepted.clone()
    }

    fn reject(message: &str) -> ProviderError {
        ProviderError::CustomError(message.to_string())
    }
}

#[async_trait]
impl NodeClient for InMemoryNode {
    async fn chain_id(&self) -> Result<U256, ProviderError> {
        Ok(U256::from(self.chain_id))
    }

    async fn pending_transaction_count(&self, address: Address) -> Result<U256, ProviderError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state.nonces.get(&address).copied().unwrap_or_default())
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, ProviderError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.estimate_error {
            return Err(Self::reject(message));
        }

        let data_len = tx.data().map(|d| d.len() as u64).unwrap_or(0);
        let creation = if tx.to().is_none() { 32_000 } else { 0 };
        Ok(U256::from(TRANSFER_GAS + creation + 16 * data_len))
    }

    async fn gas_price(&self) -> Result<U256, ProviderError> {
        Ok(U256::from(20_000_000_000u64))
    }

    async fn balance(&self, address: Address) -> Result<U256, ProviderError> {
        tokio::task::yield_now().await;
        Ok(self.balance_of(address))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256, ProviderError> {
        tokio::task::yield_now().await;
        let stalled = self.state.lock().unwrap().stall_broadcasts;
        if stalled {
            std::future::pending::<()>().await;
        }

        let (tx, signature) = TypedTransaction::decode_signed(&Rlp::new(raw.as_ref()))
            .map_err(|e| Self::reject(&format!("invalid transaction: {e}")))?;
        let from = signature
            .recover(tx.sighash())
            .map_err(|e| Self::reject(&format!("invalid signature: {e}")))?;
        let hash = H256::from(keccak256(raw.as_ref()));

        if tx.chain_id().map(|id| id.as_u64()) != Some(self.chain_id) {
            return Err(Self::reject("invalid chain id for signer"));
        }

        let mut state = self.state.lock().unwrap();

        let nonce = tx.nonce().copied().unwrap_or_default();
        let expected = state.nonces.get(&from).copied().unwrap_or_default();
        if nonce < expected {
            return Err(Self::reject(&format!(
                "nonce too low: next nonce {expected}, tx nonce {nonce}"
            )));
        }
        if nonce > expected {
            return Err(Self::reject(&format!(
                "nonce too high: next nonce {expected}, tx nonce {nonce}"
            )));
        }

        let gas = tx.gas().copied().unwrap_or_default();
        let price = tx.gas_price().unwrap_or_default();
        let value = tx.value().copied().unwrap_or_default();
        let cost = gas * price + value;
        let balance = state.balances.get(&from).copied().unwrap_or_default();
        if cost > balance {
            return Err(Self::reject(&format!(
                "insufficient funds for gas * price + value: balance {balance}, tx cost {cost}"
            )));
        }

        let reverted = state.revert_execution;
        let to = match tx.to() {
            Some(NameOrAddress::Address(address)) => Some(*address),
            _ => None,
        };
        let contract_address = match to {
            None if !reverted => Some(get_contract_address(from, nonce)),
            _ => None,
        };

        // Reverted executions still pay for gas
        let charged = if reverted { gas * price } else { cost };
        state.balances.insert(from, balance - charged);
        if !reverted {
            if let Some(recipient) = to.or(contract_address) {
                *state.balances.entry(recipient).or_default() += value;
            }
        }
        state.nonces.insert(from, expected + 1);
        state.accepted.push((from, nonce));
        state.block_number += 1;

        let receipt = TransactionReceipt {
            transaction_hash: hash,
            from,
            to,
            contract_address,
            block_number: Some(state.block_number.into()),
            gas_used: Some(gas),
            status: Some(if reverted { 0u64 } else { 1u64 }.into()),
            ..Default::default()
        };
        state.receipts.insert(hash, receipt);

        Ok(hash)
    }

    async fn transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        let stalled = self.state.lock().unwrap().stall_receipts;
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock().unwrap();
        if state.withhold_receipts {
            return Ok(None);
        }

        let delay = state.receipt_delay_polls;
        let polls = state.receipt_polls.entry(tx_hash).or_default();
        *polls += 1;
        if *polls <= delay {
            return Ok(None);
        }

        Ok(state.receipts.get(&tx_hash).cloned())
    }

    async fn call(&self, _tx: &TypedTransaction) -> Result<Bytes, ProviderError> {
        Ok(self.state.lock().unwrap().call_result.clone())
    }
}
