// Copyright (c) 2026 WePay v3 Client Contributors. MIT License.
// See LICENSE for details.

//! # wepay
//!
//! Entry point for the `wepay` binary. Parses CLI arguments, initializes
//! logging, resolves the merchant credential, and runs one command against
//! the v3 API. Results are printed to stdout as JSON; logs go to stderr.
//!
//! - `certificates` — download, decrypt and cache the platform certificates
//! - `transfer`     — create and query batch transfers
//! - `version`      — print build version information

mod cli;
mod logging;
mod settings;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;

use wepay_protocol::{AuthenticatedDispatcher, MerchantCredential};
use wepay_transfers::{BatchQuery, DetailStatus, TransferBatchRequest, TransferClient};

use cli::{Commands, GlobalArgs, TransferCommands, WepayCli};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = WepayCli::parse();

    match cli.command {
        Commands::Version => {
            print_version();
            Ok(())
        }
        Commands::Certificates => {
            let dispatcher = connect(&cli.global)?;
            download_certificates(&dispatcher).await
        }
        Commands::Transfer { command } => {
            let dispatcher = connect(&cli.global)?;
            run_transfer(TransferClient::new(Arc::new(dispatcher)), command).await
        }
    }
}

/// Initializes logging and builds the dispatcher from file + flags.
fn connect(global: &GlobalArgs) -> Result<AuthenticatedDispatcher> {
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&global.log_format),
    );

    let (merchant, client) = settings::resolve(global)?;
    let credential =
        MerchantCredential::from_settings(&merchant).context("invalid merchant credential")?;
    tracing::info!(
        mch_id = credential.mch_id(),
        serial_no = credential.serial_no(),
        base_url = %client.base_url,
        cache_dir = %client.cache_dir.display(),
        "merchant credential loaded"
    );

    AuthenticatedDispatcher::new(credential, client).context("failed to build API client")
}

/// Refreshes the certificate cache and reports what was installed.
async fn download_certificates(dispatcher: &AuthenticatedDispatcher) -> Result<()> {
    let outcome = dispatcher
        .refresh_certificates()
        .await
        .context("failed to download platform certificates")?;

    let installed: Vec<_> = outcome
        .installed
        .iter()
        .map(|cert| {
            json!({
                "serial_no": cert.serial_no(),
                "effective_time": cert.effective_time(),
                "expire_time": cert.expire_time(),
            })
        })
        .collect();
    let failures: Vec<_> = outcome
        .failures
        .iter()
        .map(|f| json!({ "serial_no": f.serial_no, "reason": f.reason }))
        .collect();

    print_json(&json!({ "installed": installed, "failures": failures }))?;

    if outcome.installed.is_empty() {
        anyhow::bail!("no platform certificate could be installed");
    }
    Ok(())
}

async fn run_transfer(client: TransferClient, command: TransferCommands) -> Result<()> {
    match command {
        TransferCommands::Create(args) => {
            let raw = std::fs::read_to_string(&args.file)
                .with_context(|| format!("failed to read {}", args.file.display()))?;
            let batch: TransferBatchRequest = serde_json::from_str(&raw)
                .with_context(|| format!("invalid batch request in {}", args.file.display()))?;
            let created = client
                .create_batch(&batch)
                .await
                .context("failed to create transfer batch")?;
            print_json(&created)
        }
        TransferCommands::Query(args) => {
            let detail_status: DetailStatus = args
                .detail_status
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let query = BatchQuery {
                need_query_detail: !args.no_details,
                offset: args.offset,
                limit: args.limit,
                detail_status,
            };
            let record = match (&args.batch_id, &args.out_batch_no) {
                (Some(batch_id), _) => client.query_by_batch_id(batch_id, &query).await,
                (None, Some(out_batch_no)) => client.query_by_out_batch_no(out_batch_no, &query).await,
                (None, None) => anyhow::bail!("either --batch-id or --out-batch-no is required"),
            }
            .context("failed to query transfer batch")?;
            print_json(&record)
        }
        TransferCommands::Detail(args) => {
            let detail = match (
                &args.batch_id,
                &args.detail_id,
                &args.out_batch_no,
                &args.out_detail_no,
            ) {
                (Some(batch_id), Some(detail_id), _, _) => {
                    client.detail_by_batch_id(batch_id, detail_id).await
                }
                (_, _, Some(out_batch_no), Some(out_detail_no)) => {
                    client.detail_by_out_batch_no(out_batch_no, out_detail_no).await
                }
                _ => anyhow::bail!(
                    "either --batch-id with --detail-id or --out-batch-no with --out-detail-no is required"
                ),
            }
            .context("failed to query transfer detail")?;
            print_json(&detail)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("wepay       {}", env!("CARGO_PKG_VERSION"));
    println!("user-agent  {}", wepay_protocol::config::DEFAULT_USER_AGENT);
    println!("rustc       {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
