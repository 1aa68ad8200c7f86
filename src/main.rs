//! Trato Client - deploys a Trato escrow contract and funds it
//!
//! Reads settings, connects to the node, deploys the configured artifact
//! through the submission pipeline and reports the resulting balances.

use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use trato_client::chain::EthNode;
use trato_client::config::{DeploymentConfig, Settings};
use trato_client::contract::{CompiledArtifact, ContractDeployer};
use trato_client::metrics::MetricsServer;
use trato_client::tx::SubmissionPipeline;
use trato_client::units::to_base_units;
use trato_client::wallet::Wallet;
use trato_client::Account;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Trato Client v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for chain {} ({})",
        settings.network.network, settings.network.provider
    );

    let private_key = env::var(&settings.wallet.private_key_env).with_context(|| {
        format!(
            "private key variable {} is not set",
            settings.wallet.private_key_env
        )
    })?;
    let account = Account::parse(&settings.wallet.address, &private_key)?;

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    // Connect and assemble the pipeline
    let node = Arc::new(EthNode::connect(&settings.network).await?);
    let pipeline = Arc::new(SubmissionPipeline::from_config(
        node,
        settings.network.clone(),
        &settings.gas,
        &settings.submission,
    )?);
    let wallet = Wallet::new(pipeline.clone())?;

    info!(
        "Account {:?} holds {}",
        account.address(),
        wallet.balance_display(account.address()).await?
    );

    match &settings.deployment {
        Some(deployment) => {
            let result = deploy(&settings, deployment, &account, pipeline, &wallet).await;
            if let Err(e) = &result {
                error!("Deployment failed: {:#}", e);
            }
            result?;
        }
        None => info!("No deployment configured"),
    }

    // Keep serving metrics until asked to stop
    if let Some(handle) = metrics_handle {
        info!("Trato Client is idle, waiting for shutdown signal");
        shutdown_signal().await;
        info!("Shutdown signal received, stopping...");
        handle.abort();
    }

    info!("Trato Client stopped");
    Ok(())
}

async fn deploy(
    settings: &Settings,
    deployment: &DeploymentConfig,
    account: &Account,
    pipeline: Arc<SubmissionPipeline>,
    wallet: &Wallet,
) -> Result<()> {
    let output = std::fs::read_to_string(&deployment.artifact_path).with_context(|| {
        format!(
            "Failed to read compiler output: {:?}",
            deployment.artifact_path
        )
    })?;
    let artifact =
        CompiledArtifact::from_solc_output(&output, &deployment.source, &deployment.contract)?;
    let args = artifact.tokenize_constructor_args(&deployment.constructor_args)?;

    let deployed = ContractDeployer::new(pipeline)
        .deploy(&artifact, account, &args)
        .await?;
    info!(
        "{} deployed at {:?} in block {:?}",
        artifact.name, deployed.address, deployed.receipt.block_number
    );

    if let Some(amount) = &deployment.fund_amount {
        let amount = to_base_units(amount, settings.network.decimals)?;
        let funded = wallet.fund(account, deployed.address, amount).await?;
        info!(
            "Funded {:?} in {:?}",
            deployed.address, funded.receipt.transaction_hash
        );
    }

    let (contract_balance, account_balance) = futures::future::try_join(
        wallet.balance_display(deployed.address),
        wallet.balance_display(account.address()),
    )
    .await?;
    info!(
        "Contract {:?} holds {}, account {:?} holds {}",
        deployed.address,
        contract_balance,
        account.address(),
        account_balance
    );

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,trato_client=debug,hyper=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if env::var_os("TRATO_LOG_JSON").is_some() {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
