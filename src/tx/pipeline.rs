//! The shared submission pipeline
//!
//! Every write (deployment, contract call, value transfer) runs
//! build → fee check → sign → broadcast → receipt while holding its sender's
//! turn in the `AccountQueue`.

use super::builder::{TransactionBuilder, TxKind, TxParams};
use super::gas::GasPricing;
use super::guard::{FeeEstimate, FeeGuard, FeeReference};
use super::nonce::AccountQueue;
use super::sender::{Broadcaster, TransactionSigner};
use crate::account::Account;
use crate::chain::{NodeClient, Receipt};
use crate::config::{GasConfig, NetworkOptions, SubmissionConfig};
use crate::error::ClientResult;

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// One write request
#[derive(Debug, Clone)]
pub struct Submission {
    pub kind: TxKind,
    pub params: TxParams,
    pub fee_reference: FeeReference,
}

/// Receipt plus the fee the guard approved
#[derive(Debug, Clone)]
pub struct Submitted {
    pub receipt: Receipt,
    pub fee: FeeEstimate,
}

pub struct SubmissionPipeline {
    node: Arc<dyn NodeClient>,
    builder: TransactionBuilder,
    guard: FeeGuard,
    signer: TransactionSigner,
    broadcaster: Broadcaster,
    queue: AccountQueue,
    options: NetworkOptions,
}

impl SubmissionPipeline {
    pub fn new(
        node: Arc<dyn NodeClient>,
        options: NetworkOptions,
        pricing: GasPricing,
        submission: &SubmissionConfig,
    ) -> Self {
        Self {
            builder: TransactionBuilder::new(node.clone(), pricing, options.network),
            guard: FeeGuard::new(node.clone()),
            signer: TransactionSigner::new(options.network),
            broadcaster: Broadcaster::new(
                node.clone(),
                submission.poll_interval(),
                submission.receipt_timeout(),
            ),
            queue: AccountQueue::new(),
            node,
            options,
        }
    }

    /// Pipeline configured from settings sections
    pub fn from_config(
        node: Arc<dyn NodeClient>,
        options: NetworkOptions,
        gas: &GasConfig,
        submission: &SubmissionConfig,
    ) -> ClientResult<Self> {
        let pricing = GasPricing::from_config(gas)?;
        let mut pipeline = Self::new(node, options, pricing, submission);
        pipeline.builder = pipeline
            .builder
            .with_gas_limit_buffer(gas.gas_limit_buffer_percent);
        Ok(pipeline)
    }

    pub fn node(&self) -> &Arc<dyn NodeClient> {
        &self.node
    }

    pub fn options(&self) -> &NetworkOptions {
        &self.options
    }

    /// Run one submission for `account`, waiting for earlier ones to finish
    pub async fn submit(&self, account: &Account, submission: Submission) -> ClientResult<Submitted> {
        let started = Instant::now();
        let _turn = self.queue.acquire(account.address()).await;

        match self.run(account, submission).await {
            Ok(submitted) => {
                crate::metrics::record_tx_confirmed(started.elapsed().as_secs_f64());
                info!(
                    "Confirmed {:?} from {:?} (status {})",
                    submitted.receipt.transaction_hash,
                    account.address(),
                    submitted.receipt.status
                );
                Ok(submitted)
            }
            Err(e) => {
                crate::metrics::record_tx_failed(e.stage());
                error!("Submission from {:?} failed: {}", account.address(), e);
                Err(e)
            }
        }
    }

    async fn run(&self, account: &Account, submission: Submission) -> ClientResult<Submitted> {
        let tx = self
            .builder
            .build(account.address(), submission.kind, submission.params)
            .await?;
        let fee = self.guard.check(&tx, submission.fee_reference).await?;

        let signed = self.signer.sign(tx, account).await?;
        let tx_hash = self.broadcaster.broadcast(&signed).await?;
        crate::metrics::record_tx_submitted();

        let receipt = self.broadcaster.await_receipt(tx_hash).await?;
        Ok(Submitted { receipt, fee })
    }
}
