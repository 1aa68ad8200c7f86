//! Signing, broadcast and confirmation of built transactions

use super::builder::UnsignedTransaction;
use crate::account::Account;
use crate::chain::{NodeClient, Receipt};
use crate::error::{BroadcastRejection, ClientError, ClientResult};

use ethers::signers::Signer;
use ethers::types::{Address, Bytes, H256, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Signed RLP bytes of one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: H256,
    pub from: Address,
    pub nonce: U256,
    pub raw: Bytes,
}

/// Signs transactions locally with the account's key
#[derive(Debug, Clone, Copy)]
pub struct TransactionSigner {
    chain_id: u64,
}

impl TransactionSigner {
    pub fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }

    /// Sign an EIP-155 legacy transaction; consumes it so it cannot be reused
    pub async fn sign(
        &self,
        tx: UnsignedTransaction,
        account: &Account,
    ) -> ClientResult<SignedTransaction> {
        if tx.chain_id != self.chain_id {
            return Err(ClientError::Sign(format!(
                "transaction chain id {} differs from signer chain id {}",
                tx.chain_id, self.chain_id
            )));
        }
        if tx.gas_limit.is_zero() {
            return Err(ClientError::Sign("gas limit is zero".to_string()));
        }
        if tx.from != account.address() {
            return Err(ClientError::Sign(format!(
                "transaction sender {:?} is not account {:?}",
                tx.from,
                account.address()
            )));
        }

        let wallet = account.wallet(self.chain_id)?;
        let typed = tx.to_typed();
        let signature = wallet
            .sign_transaction(&typed)
            .await
            .map_err(|e| ClientError::Sign(e.to_string()))?;

        let raw = typed.rlp_signed(&signature);
        Ok(SignedTransaction {
            hash: typed.hash(&signature),
            from: tx.from,
            nonce: tx.nonce,
            raw,
        })
    }
}

/// Submits signed transactions and waits for their receipts
pub struct Broadcaster {
    node: Arc<dyn NodeClient>,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

impl Broadcaster {
    pub fn new(node: Arc<dyn NodeClient>, poll_interval: Duration, receipt_timeout: Duration) -> Self {
        Self {
            node,
            poll_interval,
            receipt_timeout,
        }
    }

    /// `eth_sendRawTransaction`; node rejections become `Broadcast` errors
    pub async fn broadcast(&self, signed: &SignedTransaction) -> ClientResult<H256> {
        let tx_hash = timeout(
            self.receipt_timeout,
            self.node.send_raw_transaction(signed.raw.clone()),
        )
        .await
        .map_err(|_| ClientError::Rpc {
            operation: "broadcast",
            message: format!(
                "no answer for {:?} within {:?}",
                signed.hash, self.receipt_timeout
            ),
        })?
        .map_err(|e| {
            let message = e.to_string();
            let reason = BroadcastRejection::classify(&message);
            warn!(
                "Broadcast of nonce {} from {:?} rejected ({}): {}",
                signed.nonce, signed.from, reason, message
            );
            ClientError::Broadcast { reason, message }
        })?;

        if tx_hash != signed.hash {
            warn!(
                "Node returned hash {:?} for locally computed {:?}",
                tx_hash, signed.hash
            );
        }

        info!(
            "Transaction sent: {:?} (from {:?}, nonce {})",
            tx_hash, signed.from, signed.nonce
        );
        Ok(tx_hash)
    }

    /// Poll until the node reports a receipt; mempool acceptance is not enough
    pub async fn await_receipt(&self, tx_hash: H256) -> ClientResult<Receipt> {
        let started = Instant::now();

        // A poll that never returns must not outlive the deadline either
        match timeout(self.receipt_timeout, self.poll_receipt(tx_hash, started)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::ReceiptTimeout {
                tx_hash,
                waited: started.elapsed(),
            }),
        }
    }

    async fn poll_receipt(&self, tx_hash: H256, started: Instant) -> ClientResult<Receipt> {
        loop {
            match self.node.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    let receipt = Receipt::from(receipt);
                    debug!(
                        "Receipt for {:?} in block {:?} (status {})",
                        tx_hash, receipt.block_number, receipt.status
                    );
                    return Ok(receipt);
                }
                Ok(None) => {}
                Err(e) => {
                    // Transient read failures are retried until the deadline
                    warn!("Receipt poll for {:?} failed: {}", tx_hash, e);
                }
            }

            let waited = started.elapsed();
            if waited >= self.receipt_timeout {
                return Err(ClientError::ReceiptTimeout { tx_hash, waited });
            }
            sleep(self.poll_interval.min(self.receipt_timeout - waited)).await;
        }
    }

    /// Sign, broadcast and wait: one outcome per transaction
    pub async fn submit(
        &self,
        signer: &TransactionSigner,
        tx: UnsignedTransaction,
        account: &Account,
    ) -> ClientResult<Receipt> {
        let signed = signer.sign(tx, account).await?;
        let tx_hash = self.broadcast(&signed).await?;
        self.await_receipt(tx_hash).await
    }
}
