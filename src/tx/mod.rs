//! Transaction submission: nonces, gas, fee checks, signing and confirmation

mod builder;
mod gas;
mod guard;
mod nonce;
pub(crate) mod pipeline;
mod sender;

pub use builder::{GasLimit, TransactionBuilder, TxKind, TxParams, UnsignedTransaction};
pub use gas::{fastest_to_wei, GasOracle, GasPricing};
pub use guard::{FeeEstimate, FeeGuard, FeeReference};
pub use nonce::{AccountQueue, AccountTurn, NonceTracker};
pub use pipeline::{Submission, SubmissionPipeline, Submitted};
pub use sender::{Broadcaster, SignedTransaction, TransactionSigner};
