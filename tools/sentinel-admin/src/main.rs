//! sentinel-admin: governance CLI for a Sentinel Fleet hub.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sentinel_admin::HubAdminClient;
use shared_types::IntegrationEvent;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sentinel-admin")]
#[command(about = "Inspect and govern a Sentinel Fleet hub")]
struct Args {
    /// Hub admin endpoint
    #[arg(short, long, env = "SN_HUB_URL", default_value = "http://127.0.0.1:8080")]
    endpoint: String,

    /// Bearer token for seal, reset and anomaly
    #[arg(long, env = "SN_GOVERNANCE_TOKEN", default_value = "", hide_env_values = true)]
    token: String,

    /// Tor SOCKS listener, for hubs reachable only as .onion
    #[arg(long, env = "SN_ADMIN_SOCKS_PROXY")]
    socks_proxy: Option<String>,

    /// Print raw JSON instead of a summary
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show Φ, contingency and per-node state
    Status,
    /// Force the fleet into SEALED
    Seal {
        #[arg(long)]
        reason: String,
    },
    /// Return the fleet to NORMAL
    Reset {
        #[arg(long)]
        reason: String,
    },
    /// Report an externally detected phantom density for a node
    Anomaly {
        #[arg(long)]
        node: String,
        #[arg(long)]
        density: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let client = HubAdminClient::new(&args.endpoint, args.socks_proxy.as_deref())
        .context("failed to build HTTP client")?
        .with_token(args.token.clone());

    match &args.command {
        Command::Status => {
            let fleet = client.fleet().await.context("status request failed")?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&fleet)?);
                return Ok(());
            }
            println!("phi          {:.4}", fleet.phi_score);
            println!("contingency  {}", fleet.contingency);
            if let Some(reason) = &fleet.contingency_reason {
                println!("reason       {reason}");
            }
            println!(
                "nodes        {} known, {} live, {} stale",
                fleet.known_nodes, fleet.live_nodes, fleet.stale_nodes
            );
            for node in &fleet.nodes {
                println!(
                    "  {:<24} seq {:>8}  score {:.3}  {}{}",
                    node.node_id.as_str(),
                    node.last_sequence,
                    node.rolling_score,
                    if node.stale { "STALE" } else { "live" },
                    node.anomaly
                        .as_ref()
                        .map(|flag| format!("  anomaly {}", flag.class.as_str()))
                        .unwrap_or_default()
                );
            }
        }
        Command::Seal { reason } => {
            let event = client.seal(reason).await.context("seal failed")?;
            print_event(&event, args.json)?;
        }
        Command::Reset { reason } => {
            let event = client.reset(reason).await.context("reset failed")?;
            print_event(&event, args.json)?;
        }
        Command::Anomaly { node, density } => {
            let event = client
                .report_anomaly(node, *density)
                .await
                .context("anomaly report failed")?;
            print_event(&event, args.json)?;
        }
    }
    Ok(())
}

fn print_event(event: &IntegrationEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(event)?);
    } else {
        println!(
            "phi {:.4}  contingency {}  sealed {}",
            event.new_phi_score, event.contingency, event.contingency_activated
        );
    }
    Ok(())
}
