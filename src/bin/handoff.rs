//! Wallet handoff demo
//!
//! Creates two in-memory wallet endpoints, funds the payer, and moves value
//! between them with the payment handoff protocol.
//!
//! ## Usage
//! ```bash
//! # Pay 5000 satoshis from the local wallet to the remote one on testnet
//! cargo run --bin handoff -- --network test --amount 5000
//!
//! # Remote wallet pays the local wallet, JSON receipt
//! cargo run --bin handoff -- --direction import --json
//!
//! # Mismatched networks are refused before any key is derived
//! cargo run --bin handoff -- --network main --remote-network test
//!
//! # Load amount and labels from a file
//! cargo run --bin handoff -- --config handoff.json
//! ```
//!
//! Set `RUST_LOG=debug` for stage-by-stage logs.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wallet_handoff_libs::{
    config::HandoffConfig,
    data_structures::{Network, DEFAULT_BASKET},
    errors::HandoffError,
    events::listeners::TracingListener,
    handoff::{HandoffDirection, HandoffOrchestrator, HandoffReceipt},
    interface::ListOutputsArgs,
    wallet::{WalletEndpoint, WalletEndpointBuilder},
};

/// Move value between two wallets with the payment handoff protocol
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Network of the local endpoint
    #[arg(long, default_value = "test")]
    network: Network,

    /// Network of the remote endpoint (defaults to --network)
    #[arg(long)]
    remote_network: Option<Network>,

    /// Satoshis to hand off (overrides the config file)
    #[arg(long)]
    amount: Option<u64>,

    /// Starting balance of the paying endpoint
    #[arg(long, default_value = "100000")]
    fund: u64,

    /// `export` pays the remote endpoint, `import` pays the local one
    #[arg(long, default_value = "export")]
    direction: HandoffDirection,

    /// Print the receipt as JSON
    #[arg(long)]
    json: bool,

    /// Handoff configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn load_config(args: &CliArgs) -> Result<HandoffConfig, String> {
    let config = match &args.config {
        Some(path) => HandoffConfig::from_json_file(path).map_err(|e| e.to_string())?,
        None => HandoffConfig::new(5000),
    };
    let config = match args.amount {
        Some(amount) => config.with_amount(amount),
        None => config,
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn build_endpoint(name: &str, network: Network, funding: u64) -> Result<WalletEndpoint, String> {
    let mut builder = WalletEndpointBuilder::new(name).with_network(network);
    if funding > 0 {
        builder = builder.with_funding(funding);
    }
    builder.build().map_err(|e| e.to_string())
}

async fn payee_balance(endpoint: &WalletEndpoint) -> Result<u64, HandoffError> {
    let outputs = endpoint
        .wallet()
        .list_outputs(ListOutputsArgs::basket(DEFAULT_BASKET))
        .await?;
    Ok(outputs.spendable_satoshis())
}

fn print_receipt(receipt: &HandoffReceipt, balance: u64, json: bool) -> Result<(), String> {
    if json {
        let value = serde_json::json!({
            "receipt": receipt,
            "payeeBalance": balance,
        });
        let rendered = serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
        println!("{rendered}");
    } else {
        println!("Handoff {} ({})", receipt.handoff_id, receipt.direction);
        println!("  stage:   {}", receipt.stage);
        println!("  txid:    {}", receipt.txid);
        println!("  amount:  {} satoshis", receipt.amount);
        println!("  sender:  {}", receipt.sender_identity_key.short());
        println!("  payee:   {}", receipt.payee_identity_key.short());
        println!("  balance: {balance} satoshis");
        if receipt.is_merge {
            println!("  (already held by payee; nothing credited)");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.json);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error[InvalidSpec]: {e}");
            return ExitCode::from(2);
        }
    };

    let remote_network = args.remote_network.unwrap_or(args.network);
    let (local_funding, remote_funding) = match args.direction {
        HandoffDirection::Export => (args.fund, 0),
        HandoffDirection::Import => (0, args.fund),
    };
    let endpoints = build_endpoint("local", args.network, local_funding)
        .and_then(|local| Ok((local, build_endpoint("remote", remote_network, remote_funding)?)));
    let (local, remote) = match endpoints {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("error[Wallet]: {e}");
            return ExitCode::from(2);
        }
    };

    let orchestrator = match HandoffOrchestrator::new(config)
        .and_then(|o| {
            o.with_listener(Box::new(TracingListener::new()))
                .map_err(|e| HandoffError::InvalidSpec(e.to_string()))
        }) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            eprintln!("error[{}]: {e}", e.kind());
            return ExitCode::from(2);
        }
    };

    let receipt = match orchestrator.transfer(&local, &remote, args.direction).await {
        Ok(receipt) => receipt,
        Err(e) => {
            if let Some(progress) = orchestrator.latest() {
                eprintln!("handoff {} stopped after {}", progress.handoff_id, progress.stage);
            }
            eprintln!("error[{}]: {e}", e.kind());
            return ExitCode::FAILURE;
        }
    };

    let payee = match args.direction {
        HandoffDirection::Export => &remote,
        HandoffDirection::Import => &local,
    };
    let balance = match payee_balance(payee).await {
        Ok(balance) => balance,
        Err(e) => {
            eprintln!("error[{}]: {e}", e.kind());
            return ExitCode::FAILURE;
        }
    };

    match print_receipt(&receipt, balance, args.json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error[Serialization]: {e}");
            ExitCode::FAILURE
        }
    }
}
