//! Balances, value transfers and ERC-20 tokens

use crate::account::Account;
use crate::chain::Receipt;
use crate::contract::ContractInvoker;
use crate::error::{ClientError, ClientResult};
use crate::tx::{FeeReference, Submission, SubmissionPipeline, Submitted, TxKind, TxParams};
use crate::units::to_display;

use ethers::abi::{parse_abi, Abi, Token};
use ethers::types::{Address, Bytes, U256};
use std::sync::Arc;
use tracing::info;

/// Receipt and approved fee of a value transfer
pub type TransferOutcome = Submitted;

/// Gas limit for funding a contract's payable fallback
pub const FUND_GAS_LIMIT: u64 = 90_000;

const ERC20_ABI: &[&str] = &[
    "function transfer(address to, uint256 amount) returns (bool)",
    "function balanceOf(address holder) view returns (uint256)",
];

pub struct Wallet {
    pipeline: Arc<SubmissionPipeline>,
    invoker: ContractInvoker,
    erc20: Abi,
}

impl Wallet {
    pub fn new(pipeline: Arc<SubmissionPipeline>) -> ClientResult<Self> {
        let erc20 = parse_abi(ERC20_ABI).map_err(|e| ClientError::Abi(format!("erc20: {e}")))?;
        Ok(Self {
            invoker: ContractInvoker::new(pipeline.clone()),
            pipeline,
            erc20,
        })
    }

    pub async fn balance(&self, address: Address) -> ClientResult<U256> {
        self.pipeline
            .node()
            .balance(address)
            .await
            .map_err(|e| ClientError::rpc("balance", e))
    }

    /// Balance in whole units, e.g. `"0.020000000000000000"`
    pub async fn balance_display(&self, address: Address) -> ClientResult<String> {
        let balance = self.balance(address).await?;
        Ok(to_display(balance, self.pipeline.options().decimals))
    }

    /// Plain value transfer; refused when the fee is larger than `amount`
    pub async fn send(
        &self,
        from: &Account,
        to: Address,
        amount: U256,
    ) -> ClientResult<TransferOutcome> {
        self.transfer(from, to, amount, TxParams::default().with_value(amount))
            .await
    }

    /// Fund a contract with a fixed gas limit
    pub async fn fund(
        &self,
        from: &Account,
        contract: Address,
        amount: U256,
    ) -> ClientResult<TransferOutcome> {
        let params = TxParams::default()
            .with_value(amount)
            .with_gas_limit(U256::from(FUND_GAS_LIMIT));
        self.transfer(from, contract, amount, params).await
    }

    async fn transfer(
        &self,
        from: &Account,
        to: Address,
        amount: U256,
        params: TxParams,
    ) -> ClientResult<TransferOutcome> {
        let submitted = self
            .pipeline
            .submit(
                from,
                Submission {
                    kind: TxKind::Call {
                        to,
                        data: Bytes::default(),
                    },
                    params,
                    fee_reference: FeeReference::Amount(amount),
                },
            )
            .await?;

        let decimals = self.pipeline.options().decimals;
        info!(
            "Sent {} from {:?} to {:?} (fee {})",
            to_display(amount, decimals),
            from.address(),
            to,
            to_display(submitted.fee.fee, decimals)
        );
        Ok(submitted)
    }

    /// ERC-20 `transfer`; the fee is checked against the sender's ether balance
    pub async fn send_token(
        &self,
        from: &Account,
        token: Address,
        to: Address,
        amount: U256,
    ) -> ClientResult<Receipt> {
        let data = self.encode_erc20("transfer", &[Token::Address(to), Token::Uint(amount)])?;
        self.invoker.invoke(token, data, from).await
    }

    pub async fn token_balance(&self, token: Address, holder: Address) -> ClientResult<U256> {
        let data = self.encode_erc20("balanceOf", &[Token::Address(holder)])?;
        let output = self.invoker.query(token, data).await?;

        let function = self.erc20_function("balanceOf")?;
        let tokens = function
            .decode_output(&output)
            .map_err(|e| ClientError::Abi(format!("balanceOf output: {e}")))?;
        match tokens.first() {
            Some(Token::Uint(balance)) => Ok(*balance),
            _ => Err(ClientError::Abi(format!(
                "balanceOf of {token:?} returned no amount"
            ))),
        }
    }

    fn erc20_function(&self, method: &str) -> ClientResult<&ethers::abi::Function> {
        self.erc20
            .function(method)
            .map_err(|e| ClientError::Abi(format!("erc20 {method}: {e}")))
    }

    fn encode_erc20(&self, method: &str, args: &[Token]) -> ClientResult<Bytes> {
        self.erc20_function(method)?
            .encode_input(args)
            .map(Bytes::from)
            .map_err(|e| ClientError::Abi(format!("erc20 {method}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::memory::{InMemoryNode, TRANSFER_GAS};
    use crate::tx::pipeline::tests::{funded_node, test_account, test_pipeline};
    use crate::units::{gwei, to_base_units};
    use ethers::abi::encode;

    fn wallet(node: Arc<InMemoryNode>) -> Wallet {
        Wallet::new(Arc::new(test_pipeline(node))).unwrap()
    }

    #[tokio::test]
    async fn test_send_reports_fee_and_moves_value() {
        let account = test_account();
        let node = funded_node("0.02");
        let wallet = wallet(node.clone());
        let to = Address::random();
        let amount = to_base_units("0.01", 18).unwrap();

        let submitted = wallet.send(&account, to, amount).await.unwrap();

        assert_eq!(submitted.fee.gas_limit, U256::from(TRANSFER_GAS));
        assert_eq!(submitted.fee.fee, to_base_units("0.000672", 18).unwrap());
        assert_eq!(wallet.balance(to).await.unwrap(), amount);
        assert_eq!(
            wallet.balance(account.address()).await.unwrap(),
            to_base_units("0.009328", 18).unwrap()
        );
    }

    #[tokio::test]
    async fn test_send_smaller_than_fee_is_refused() {
        let account = test_account();
        let node = funded_node("0.02");

        let err = tokio_test::assert_err!(
            wallet(node.clone())
                .send(&account, Address::random(), to_base_units("0.0001", 18).unwrap())
                .await
        );

        assert!(matches!(err, ClientError::FeeExceeds { reference: "amount", .. }));
        assert!(node.accepted().is_empty());
    }

    #[tokio::test]
    async fn test_fund_uses_fixed_gas_limit() {
        let account = test_account();
        let node = funded_node("1");
        let contract = Address::random();

        let submitted = wallet(node.clone())
            .fund(&account, contract, to_base_units("0.5", 18).unwrap())
            .await
            .unwrap();

        assert_eq!(submitted.fee.gas_limit, U256::from(FUND_GAS_LIMIT));
        assert_eq!(submitted.fee.fee, U256::from(FUND_GAS_LIMIT) * gwei(32));
        assert_eq!(node.balance_of(contract), to_base_units("0.5", 18).unwrap());
    }

    #[tokio::test]
    async fn test_balance_display_uses_decimals() {
        let account = test_account();
        let node = funded_node("0.02");

        let shown = tokio_test::assert_ok!(wallet(node).balance_display(account.address()).await);
        assert!(shown.starts_with("0.02"));
    }

    #[tokio::test]
    async fn test_token_transfer_and_balance() {
        let account = test_account();
        let node = funded_node("1");
        let wallet = wallet(node.clone());
        let token = Address::random();

        let receipt = wallet
            .send_token(&account, token, Address::random(), U256::from(1_000u64))
            .await
            .unwrap();
        assert!(receipt.succeeded());
        assert_eq!(node.accepted().len(), 1);

        node.set_call_result(Bytes::from(encode(&[Token::Uint(U256::from(42u64))])));
        let balance = wallet.token_balance(token, account.address()).await.unwrap();
        assert_eq!(balance, U256::from(42u64));
    }
}
