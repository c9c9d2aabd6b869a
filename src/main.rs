use std::time::Duration;

use clap::Parser;
use mdgate::config::AppConfig;
use mdgate::demo;
use mdgate::telemetry;

/// Simulated venues feeding the market data store, with orders pushed
/// through the pre-trade risk gate.
#[derive(Debug, Parser)]
#[command(name = "mdgate", version)]
struct Args {
    /// Config file (toml/yaml/json); MDGATE__* env vars override it
    #[arg(short, long)]
    config: Option<String>,

    /// How long to run before printing the summary
    #[arg(short, long, default_value_t = 10)]
    duration_secs: u64,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    telemetry::init_tracing(&args.log);
    telemetry::init_metrics()?;

    let cfg = AppConfig::load(args.config.as_deref())?;
    let report = demo::run_demo(cfg, Duration::from_secs(args.duration_secs)).await?;

    println!("\n=== Risk Gate Summary ===");
    println!("Accepted: {}, Rejected: {}", report.accepted, report.rejected);
    println!(
        "Check latency: p50 {} ns, p99 {} ns, max {} ns",
        report.p50_ns, report.p99_ns, report.max_ns
    );
    Ok(())
}
