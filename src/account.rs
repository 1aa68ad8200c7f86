//! Caller-owned signing accounts

use crate::error::{ClientError, ClientResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use std::fmt;
use std::str::FromStr;

/// Address plus the hex private key that controls it.
///
/// Never persisted; the key is only turned into a wallet at signing time.
#[derive(Clone)]
pub struct Account {
    address: Address,
    private_key: String,
}

impl Account {
    pub fn new(address: Address, private_key: impl Into<String>) -> Self {
        Self {
            address,
            private_key: private_key.into(),
        }
    }

    /// Parse an `{address, private_key}` pair given as strings
    pub fn parse(address: &str, private_key: &str) -> ClientResult<Self> {
        let address = Address::from_str(address)
            .map_err(|e| ClientError::Config(format!("invalid address {address}: {e}")))?;
        Ok(Self::new(address, private_key))
    }

    /// Derive the address from the key
    pub fn from_private_key(private_key: &str) -> ClientResult<Self> {
        let wallet = parse_wallet(private_key)?;
        Ok(Self::new(wallet.address(), private_key))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Wallet for signing on `chain_id`; the key must control `address`
    pub(crate) fn wallet(&self, chain_id: u64) -> ClientResult<LocalWallet> {
        let wallet = parse_wallet(&self.private_key)?;
        if wallet.address() != self.address {
            return Err(ClientError::Sign(format!(
                "private key controls {:?}, not {:?}",
                wallet.address(),
                self.address
            )));
        }
        Ok(wallet.with_chain_id(chain_id))
    }
}

fn parse_wallet(private_key: &str) -> ClientResult<LocalWallet> {
    private_key
        .trim()
        .trim_start_matches("0x")
        .parse::<LocalWallet>()
        .map_err(|e| ClientError::Sign(format!("invalid private key: {e}")))
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Well-known development key for 0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266
    pub(crate) const KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_derives_address_from_key() {
        let account = Account::from_private_key(KEY).unwrap();
        assert_eq!(
            account.address(),
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );
        assert_eq!(account.wallet(1337).unwrap().chain_id(), 1337);
    }

    #[test]
    fn test_mismatched_key_is_a_sign_error() {
        let account = Account::new(Address::random(), KEY);
        assert!(matches!(account.wallet(1), Err(ClientError::Sign(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let account = Account::from_private_key(KEY).unwrap();
        assert!(!format!("{account:?}").contains(KEY));
    }
}
