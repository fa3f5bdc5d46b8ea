//! chainrotor CLI — resolve chains and call their public RPC endpoints.
//!
//! Usage:
//! ```bash
//! # List every chain in the catalog
//! chainrotor chains
//!
//! # Show the endpoints known for a chain
//! chainrotor resolve --chain 137
//!
//! # Send a JSON-RPC call through a rotator over the chain's endpoints
//! chainrotor call --chain 1 --method eth_getBalance --params '["0xabc...", "latest"]'
//!
//! # Check every endpoint of a chain once
//! chainrotor probe --chain 56
//! ```

mod config;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use futures::future::join_all;
use serde_json::Value;

use chainrotor_core::{HealthStatus, Rotator, RpcTransport, TracingNotifier, TransportError};
use chainrotor_directory::{default_rotator, EndpointDirectory, SchemeDialer};

use crate::config::{init_tracing, CliConfig};

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().cloned() else {
        print_usage();
        process::exit(1);
    };
    let rest = &args[1..];

    let result = match command.as_str() {
        "chains" => with_context(rest, cmd_chains).await,
        "resolve" => with_context(rest, cmd_resolve).await,
        "call" => with_context(rest, cmd_call).await,
        "probe" => with_context(rest, cmd_probe).await,
        "version" | "--version" | "-V" => {
            println!("chainrotor {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("chainrotor {}", env!("CARGO_PKG_VERSION"));
    println!("Resolve chains and call their public RPC endpoints\n");
    println!("USAGE:");
    println!("    chainrotor <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    chains     List every chain in the catalog");
    println!("    resolve    Show the endpoints and metadata of one chain");
    println!("    call       Send a JSON-RPC call through a rotator");
    println!("    probe      Send eth_blockNumber to every endpoint of a chain");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("FLAGS:");
    println!("    --chain <ID>       Chain id                      [resolve, call, probe]");
    println!("    --method <NAME>    JSON-RPC method               [call]");
    println!("    --params <JSON>    JSON array of params          [call, default: []]");
    println!("    --ws               Use a WebSocket endpoint      [call]");
    println!("    --config <PATH>    JSON config file");
    println!("    --json             Emit logs as JSON");
}

/// Load config, set up logging and open the directory, then run `cmd`.
async fn with_context<F, Fut>(args: &[String], cmd: F) -> anyhow::Result<()>
where
    F: FnOnce(Vec<String>, CliConfig, EndpointDirectory) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<()>>,
{
    let mut config = match parse_flag(args, "--config") {
        Some(path) => CliConfig::load(&PathBuf::from(path))?,
        None => CliConfig::default(),
    };
    if has_flag(args, "--json") {
        config.log.json = true;
    }
    init_tracing(&config.log);

    let directory = EndpointDirectory::open(config.directory.clone())
        .await
        .context("opening endpoint directory")?;
    cmd(args.to_vec(), config, directory).await
}

async fn cmd_chains(_args: Vec<String>, _config: CliConfig, directory: EndpointDirectory) -> anyhow::Result<()> {
    let mut chains: Vec<_> = directory.resolve_all().await?.into_values().collect();
    chains.sort_by_key(|c| c.chain_id);

    println!("{:>12}  {:<8}  {:>5}  NAME", "CHAIN ID", "SYMBOL", "RPCS");
    for chain in &chains {
        println!(
            "{:>12}  {:<8}  {:>5}  {}",
            chain.chain_id,
            chain.native_symbol,
            chain.rpc_urls.len(),
            chain.chain_name
        );
    }
    println!("\n{} chains", chains.len());
    Ok(())
}

async fn cmd_resolve(args: Vec<String>, _config: CliConfig, directory: EndpointDirectory) -> anyhow::Result<()> {
    let chain_id = chain_flag(&args)?;
    let record = directory
        .resolve(chain_id)
        .await?
        .ok_or_else(|| anyhow!("unknown chain id {chain_id}"))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn cmd_call(args: Vec<String>, config: CliConfig, directory: EndpointDirectory) -> anyhow::Result<()> {
    let chain_id = chain_flag(&args)?;
    let method = parse_flag(&args, "--method").ok_or_else(|| anyhow!("--method is required"))?;
    let params: Vec<Value> = match parse_flag(&args, "--params") {
        Some(raw) => serde_json::from_str(&raw).context("--params must be a JSON array")?,
        None => vec![],
    };

    let rotator = build_rotator(&directory, chain_id, &config).await?;
    let client = if has_flag(&args, "--ws") {
        rotator.next_ws()?
    } else {
        rotator.next_http()?
    };
    tracing::info!(endpoint = client.endpoint(), %method, "sending call");

    let result: anyhow::Result<Value> = client.call(1, &method, params).await.map_err(Into::into);
    rotator.close();

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}

async fn cmd_probe(args: Vec<String>, config: CliConfig, directory: EndpointDirectory) -> anyhow::Result<()> {
    let chain_id = chain_flag(&args)?;
    let rotator = build_rotator(&directory, chain_id, &config).await?;
    let timeout = config
        .rotator
        .request_timeout()
        .unwrap_or(Duration::from_secs(30));

    let rotator = &rotator;
    let probes = (0..rotator.len()).filter_map(|slot| rotator.client(slot)).map(|client| async move {
        let start = Instant::now();
        let call = async {
            let block: Result<String, TransportError> = client.call(1, "eth_blockNumber", vec![]).await;
            block
        };
        let outcome = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(block)) => Ok(block),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => {
                let err = TransportError::Timeout { ms: timeout.as_millis() as u64 };
                rotator.report_failure(client.slot(), &err);
                Err(err.to_string())
            }
        };
        (client, start.elapsed(), outcome)
    });

    for (client, latency, outcome) in join_all(probes).await {
        match outcome {
            Ok(block) => println!(
                "  OK    {:>6}ms  {:<9}  {}  block {}",
                latency.as_millis(),
                client.kind(),
                client.endpoint(),
                parse_block(&block)
            ),
            Err(e) => println!("  FAIL  {:>6}ms  {:<9}  {}  {e}", latency.as_millis(), client.kind(), client.endpoint()),
        }
    }

    let healthy = rotator
        .health_summary()
        .iter()
        .filter(|s| s.status == HealthStatus::Healthy)
        .count();
    println!("\n{healthy}/{} endpoints healthy ({})", rotator.len(), rotator.health());
    rotator.close();
    Ok(())
}

async fn build_rotator(directory: &EndpointDirectory, chain_id: i64, config: &CliConfig) -> anyhow::Result<Rotator> {
    let dialer = SchemeDialer::new(config.http.clone(), config.ws.clone());
    let builder = Rotator::builder()
        .config(config.rotator.clone())
        .notifier(Arc::new(TracingNotifier));
    let rotator = default_rotator(directory, chain_id, &dialer, builder)
        .await
        .with_context(|| format!("building rotator for chain {chain_id}"))?;
    Ok(rotator)
}

fn chain_flag(args: &[String]) -> anyhow::Result<i64> {
    let raw = parse_flag(args, "--chain").ok_or_else(|| anyhow!("--chain is required"))?;
    raw.parse().with_context(|| format!("invalid chain id '{raw}'"))
}

fn parse_block(hex: &str) -> String {
    match u64::from_str_radix(hex.trim_start_matches("0x"), 16) {
        Ok(n) => n.to_string(),
        Err(_) => hex.to_string(),
    }
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
