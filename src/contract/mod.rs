//! Contract deployment, invocation and the typed Trato wrapper

pub mod artifact;
pub mod deployer;
pub mod invoker;
pub mod trato;

pub use artifact::CompiledArtifact;
pub use deployer::{ContractDeployer, Deployment};
pub use invoker::ContractInvoker;
pub use trato::{ascii_token, Member, TratoContract};
