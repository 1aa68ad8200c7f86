//! Trato client - deploys and drives Trato escrow contracts
//!
//! Every write goes through one pipeline: gas pricing, nonce assignment,
//! fee check, signing, broadcast and receipt, serialized per account.

pub mod account;
pub mod chain;
pub mod config;
pub mod contract;
pub mod error;
pub mod metrics;
pub mod tx;
pub mod units;
pub mod wallet;

pub use account::Account;
pub use error::{ClientError, ClientResult};
