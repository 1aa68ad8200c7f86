//! Pre-signing fee check

use super::builder::UnsignedTransaction;
use crate::chain::NodeClient;
use crate::error::{ClientError, ClientResult};

use ethers::types::U256;
use std::sync::Arc;
use tracing::debug;

/// Worst-case fee of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub gas_limit: U256,
    pub gas_price: U256,
    pub fee: U256,
}

impl FeeEstimate {
    /// `gas_limit × gas_price`; `None` on overflow
    pub fn of(tx: &UnsignedTransaction) -> Option<Self> {
        let fee = tx.gas_limit.checked_mul(tx.gas_price)?;
        Some(Self {
            gas_limit: tx.gas_limit,
            gas_price: tx.gas_price,
            fee,
        })
    }
}

/// What the fee is compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeReference {
    /// The amount being moved (value-transfer flows)
    Amount(U256),
    /// The sender's balance, read fresh from the node
    SenderBalance,
}

/// Rejects transactions whose fee already dooms them
pub struct FeeGuard {
    node: Arc<dyn NodeClient>,
}

impl FeeGuard {
    pub fn new(node: Arc<dyn NodeClient>) -> Self {
        Self { node }
    }

    /// Fails with `FeeExceeds` when `fee > reference`; equality passes
    pub async fn check(
        &self,
        tx: &UnsignedTransaction,
        reference: FeeReference,
    ) -> ClientResult<FeeEstimate> {
        let (limit, label) = match reference {
            FeeReference::Amount(amount) => (amount, "amount"),
            FeeReference::SenderBalance => {
                let balance = self
                    .node
                    .balance(tx.from)
                    .await
                    .map_err(|e| ClientError::rpc("balance", e))?;
                (balance, "balance")
            }
        };

        let estimate = FeeEstimate::of(tx).ok_or(ClientError::FeeExceeds {
            fee: U256::MAX,
            limit,
            reference: label,
        })?;

        if estimate.fee > limit {
            return Err(ClientError::FeeExceeds {
                fee: estimate.fee,
                limit,
                reference: label,
            });
        }

        debug!("Fee {} within {} {}", estimate.fee, label, limit);
        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockNodeClient;
    use crate::units::{self, to_base_units};
    use ethers::types::{Address, Bytes};

    fn transfer(gas_limit: u64, gas_price: U256) -> UnsignedTransaction {
        UnsignedTransaction {
            from: Address::random(),
            to: Some(Address::random()),
            value: U256::zero(),
            data: Bytes::default(),
            nonce: U256::zero(),
            gas_price,
            gas_limit: U256::from(gas_limit),
            chain_id: 3,
        }
    }

    fn guard_with_balance(balance: U256) -> FeeGuard {
        let mut node = MockNodeClient::new();
        node.expect_balance().returning(move |_| Ok(balance));
        FeeGuard::new(Arc::new(node))
    }

    #[tokio::test]
    async fn test_accepts_fee_equal_to_reference() {
        let guard = FeeGuard::new(Arc::new(MockNodeClient::new()));
        let tx = transfer(21_000, U256::from(10u64));

        let estimate = guard
            .check(&tx, FeeReference::Amount(U256::from(210_000u64)))
            .await
            .unwrap();
        assert_eq!(estimate.fee, U256::from(210_000u64));

        let err = guard
            .check(&tx, FeeReference::Amount(U256::from(209_999u64)))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::FeeExceeds { reference: "amount", .. }));
    }

    #[tokio::test]
    async fn test_small_transfer_cannot_cover_fee() {
        let guard = FeeGuard::new(Arc::new(MockNodeClient::new()));
        let tx = transfer(21_000, units::gwei(32));

        let fee = FeeEstimate::of(&tx).unwrap().fee;
        assert_eq!(fee, to_base_units("0.000672", 18).unwrap());

        assert!(guard
            .check(&tx, FeeReference::Amount(to_base_units("0.02", 18).unwrap()))
            .await
            .is_ok());
        assert!(matches!(
            guard
                .check(&tx, FeeReference::Amount(to_base_units("0.0001", 18).unwrap()))
                .await,
            Err(ClientError::FeeExceeds { .. })
        ));
    }

    #[tokio::test]
    async fn test_balance_reference_reads_node() {
        let tx = transfer(21_000, units::gwei(32));

        let funded = guard_with_balance(to_base_units("0.02", 18).unwrap());
        assert!(funded.check(&tx, FeeReference::SenderBalance).await.is_ok());

        let empty = guard_with_balance(U256::zero());
        assert!(matches!(
            empty.check(&tx, FeeReference::SenderBalance).await,
            Err(ClientError::FeeExceeds { reference: "balance", .. })
        ));
    }

    #[tokio::test]
    async fn test_overflowing_fee_is_rejected() {
        let guard = FeeGuard::new(Arc::new(MockNodeClient::new()));
        let mut tx = transfer(2, U256::MAX);
        tx.gas_limit = U256::from(2u64);

        assert!(matches!(
            guard.check(&tx, FeeReference::Amount(U256::MAX)).await,
            Err(ClientError::FeeExceeds { .. })
        ));
    }
}
