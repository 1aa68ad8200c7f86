//! Contract deployment through the submission pipeline

use super::artifact::CompiledArtifact;
use crate::account::Account;
use crate::chain::Receipt;
use crate::error::{ClientError, ClientResult};
use crate::tx::{FeeReference, Submission, SubmissionPipeline, TxKind, TxParams};

use ethers::abi::Token;
use ethers::types::Address;
use std::sync::Arc;
use tracing::info;

/// Address and receipt of a deployed contract
#[derive(Debug, Clone)]
pub struct Deployment {
    pub address: Address,
    pub receipt: Receipt,
}

pub struct ContractDeployer {
    pipeline: Arc<SubmissionPipeline>,
}

impl ContractDeployer {
    pub fn new(pipeline: Arc<SubmissionPipeline>) -> Self {
        Self { pipeline }
    }

    /// Deploy `artifact` from `account`; the fee is checked against its balance
    pub async fn deploy(
        &self,
        artifact: &CompiledArtifact,
        account: &Account,
        constructor_args: &[Token],
    ) -> ClientResult<Deployment> {
        let init_code = artifact.deploy_data(constructor_args)?;

        let submitted = self
            .pipeline
            .submit(
                account,
                Submission {
                    kind: TxKind::Deploy { init_code },
                    params: TxParams::default(),
                    fee_reference: FeeReference::SenderBalance,
                },
            )
            .await?;
        let receipt = submitted.receipt;

        if !receipt.succeeded() {
            return Err(deployment_failed(format!(
                "{} creation {:?} reverted",
                artifact.name, receipt.transaction_hash
            )));
        }
        let address = match receipt.contract_address {
            Some(address) if !address.is_zero() => address,
            _ => {
                return Err(deployment_failed(format!(
                    "receipt {:?} carries no contract address",
                    receipt.transaction_hash
                )))
            }
        };

        info!("Deployed {} at {:?}", artifact.name, address);
        Ok(Deployment { address, receipt })
    }
}

/// The pipeline saw a receipt, so the failure is counted here
fn deployment_failed(message: String) -> ClientError {
    let err = ClientError::DeploymentFailed(message);
    crate::metrics::record_tx_failed(err.stage());
    err
}
