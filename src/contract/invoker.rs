//! Contract method calls: writes through the pipeline, reads via `eth_call`

use crate::account::Account;
use crate::chain::Receipt;
use crate::error::{ClientError, ClientResult};
use crate::tx::{
    FeeReference, Submission, SubmissionPipeline, Submitted, TxKind, TxParams,
};

use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::Arc;
use tracing::debug;

pub struct ContractInvoker {
    pipeline: Arc<SubmissionPipeline>,
}

impl ContractInvoker {
    pub fn new(pipeline: Arc<SubmissionPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Arc<SubmissionPipeline> {
        &self.pipeline
    }

    /// State-changing call with no value attached
    pub async fn invoke(
        &self,
        contract: Address,
        encoded_call: Bytes,
        account: &Account,
    ) -> ClientResult<Receipt> {
        self.invoke_with(contract, encoded_call, account, TxParams::default())
            .await
            .map(|submitted| submitted.receipt)
    }

    /// Payable call; the fee is still checked against the sender's balance
    pub async fn invoke_with_value(
        &self,
        contract: Address,
        encoded_call: Bytes,
        value: U256,
        account: &Account,
    ) -> ClientResult<Receipt> {
        self.invoke_with(
            contract,
            encoded_call,
            account,
            TxParams::default().with_value(value),
        )
        .await
        .map(|submitted| submitted.receipt)
    }

    pub(crate) async fn invoke_with(
        &self,
        contract: Address,
        encoded_call: Bytes,
        account: &Account,
        params: TxParams,
    ) -> ClientResult<Submitted> {
        debug!(
            "Invoking {:?} selector 0x{}",
            contract,
            hex::encode(encoded_call.get(..4).unwrap_or_default())
        );

        self.pipeline
            .submit(
                account,
                Submission {
                    kind: TxKind::Call {
                        to: contract,
                        data: encoded_call,
                    },
                    params,
                    fee_reference: FeeReference::SenderBalance,
                },
            )
            .await
    }

    /// Pure read: no nonce, no signature, no transaction
    pub async fn query(&self, contract: Address, encoded_call: Bytes) -> ClientResult<Bytes> {
        let request = TransactionRequest::new().to(contract).data(encoded_call);
        self.pipeline
            .node()
            .call(&TypedTransaction::Legacy(request))
            .await
            .map_err(|e| ClientError::rpc("call", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockNodeClient;
    use crate::chain::NodeClient;
    use crate::tx::pipeline::tests::{funded_node, test_account, test_pipeline};

    fn invoker(node: Arc<dyn NodeClient>) -> ContractInvoker {
        ContractInvoker::new(Arc::new(test_pipeline(node)))
    }

    #[tokio::test]
    async fn test_invoke_sends_call_to_contract() {
        let account = test_account();
        let node = funded_node("1");
        let contract = Address::random();

        let receipt = invoker(node.clone())
            .invoke_with_value(
                contract,
                Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
                U256::from(5u64),
                &account,
            )
            .await
            .unwrap();

        assert!(receipt.succeeded());
        assert_eq!(receipt.contract_address, None);
        assert_eq!(node.balance_of(contract), U256::from(5u64));
    }

    #[tokio::test]
    async fn test_query_bypasses_pipeline() {
        let mut node = MockNodeClient::new();
        node.expect_pending_transaction_count().never();
        node.expect_send_raw_transaction().never();
        node.expect_call()
            .withf(|tx| tx.data().map(|d| d.len()) == Some(4))
            .times(1)
            .returning(|_| Ok(Bytes::from(vec![0u8; 32])));

        let output = invoker(Arc::new(node))
            .query(Address::random(), Bytes::from(vec![1, 2, 3, 4]))
            .await
            .unwrap();
        assert_eq!(output.len(), 32);
    }
}
