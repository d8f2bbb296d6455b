// fraudscope/src/main.rs
//
// fraudscope: fraud analytics over scored payment transactions
//
// Five operational modes:
//   serve  HTTP API for the dashboard (default)
//   rings  print detected fraud rings
//   mules  print money-mule candidates
//   info   print what was loaded
//   eval   markdown (or JSON) model-quality report
//
// Usage:
//   fraudscope --mode serve --bind 0.0.0.0:8000
//   fraudscope --mode rings --data transactions.csv
//   fraudscope --mode eval --config fraudscope.toml --json

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fraudscope::api::{self, AppState};
use fraudscope::config::Settings;
use fraudscope::engine::{detect_fraud_rings, detect_mule_accounts, GraphParams, MuleParams, RelationshipGraph, RingParams};
use fraudscope::eval::report::{print_markdown, to_json, EvalReport};
use fraudscope::records::{FraudRing, MuleCandidate};
use fraudscope::state::{DatasetInfo, DatasetProvider};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "fraudscope",
    about   = "Transaction fraud analytics: risk scoring, fraud rings, money mules",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    #[arg(long, value_enum, default_value = "serve")]
    mode: Mode,

    #[arg(long, help = "TOML settings file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Transactions CSV (overrides config)")]
    data: Option<PathBuf>,

    #[arg(long, help = "Listen address for serve mode (overrides config)")]
    bind: Option<String>,

    #[arg(long, help = "Seed for synthetic data and scoring noise")]
    seed: Option<u64>,

    #[arg(long, help = "eval mode: emit JSON instead of markdown")]
    json: bool,
}

#[derive(Clone, ValueEnum)]
enum Mode {
    Serve,  // HTTP API
    Rings,  // one-shot ring detection
    Mules,  // one-shot mule detection
    Info,   // dataset summary
    Eval,   // model quality report
}

// ── Terminal output ───────────────────────────────────────────────────────────

fn print_banner() {
    println!("\x1b[1m");
    println!("  ┌─┐┬─┐┌─┐┬ ┬┌┬┐┌─┐┌─┐┌─┐┌─┐┌─┐");
    println!("  ├┤ ├┬┘├─┤│ │ ││└─┐│  │ │├─┘├┤ ");
    println!("  └  ┴└─┴ ┴└─┘─┴┘└─┘└─┘└─┘┴  └─┘");
    println!("\x1b[0m");
    println!("  \x1b[90mTransaction fraud analytics | rings · mules · model health\x1b[0m\n");
}

fn print_ring(ring: &FraudRing) {
    let (color, icon) = if ring.avg_fraud_probability >= 0.75 {
        ("\x1b[91;1m", "🔴")
    } else {
        ("\x1b[93;1m", "🟡")
    };
    let reset = "\x1b[0m";
    let more = ring.account_count.saturating_sub(ring.accounts.len());
    let tail = if more > 0 { format!(" \x1b[90m(+{more} more){reset}") } else { String::new() };

    println!("\n{}{} {}{}", color, icon, ring.ring_id, reset);
    println!("  Accounts: {}{}{}", color, ring.account_count, reset);
    println!("  Txns    : {}", ring.transaction_count);
    println!("  Volume  : ${:.2}", ring.total_volume);
    println!("  Avg prob: {}{:.4}{}", color, ring.avg_fraud_probability, reset);
    println!("  Members : {}{}", ring.accounts.join(", "), tail);
}

fn print_mule(m: &MuleCandidate) {
    let color = if m.redistribution_ratio >= 0.95 { "\x1b[91;1m" } else { "\x1b[93;1m" };
    let reset = "\x1b[0m";
    println!("\n{}🟠 MULE {}{}", color, m.account, reset);
    println!("  In      : ${:.2} from {} senders", m.amount_received, m.unique_senders);
    println!("  Out     : ${:.2} to {} receivers", m.amount_sent, m.unique_receivers);
    println!("  Ratio   : {}{:.2}{}", color, m.redistribution_ratio, reset);
    println!("  Avg prob: {:.4}", m.avg_fraud_prob);
}

fn print_info(info: &DatasetInfo) {
    let state = if info.degraded { "\x1b[93;1mDEGRADED\x1b[0m" } else { "\x1b[92mOK\x1b[0m" };
    println!("  Dataset : {} (v{})", state, info.version);
    if let Some(src) = &info.source {
        println!("  Source  : {}", src.label());
    }
    println!("  Rows    : {}", info.row_count);
    println!("  Fraud   : {} ({:.2}%)", info.fraud_count, info.fraud_rate * 100.0);
    if let Some(range) = &info.date_range {
        println!("  Range   : {} → {}", range.start, range.end);
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive("fraudscope=info".parse()?))
        .compact().init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(path) = cli.data { settings.data.path = path; }
    if let Some(bind) = cli.bind { settings.server.bind = bind; }
    if let Some(seed) = cli.seed { settings.data.seed = seed; }

    let settings = Arc::new(settings);
    let provider = Arc::new(DatasetProvider::new(settings.data.clone(), settings.scoring.clone()));

    match cli.mode {
        Mode::Serve => {
            print_banner();
            // Load before accepting traffic so the first request is not the slow one
            let warm = Arc::clone(&provider);
            tokio::task::spawn_blocking(move || { warm.get(); }).await?;
            print_info(&provider.info());
            println!("\n  Mode: \x1b[96mSERVE\x1b[0m  |  {}\n", settings.server.bind);
            api::serve(AppState::new(provider, settings)).await?;
        }

        Mode::Rings => {
            let ds = provider.get();
            let graph = RelationshipGraph::build(ds.rows(), GraphParams::from(&settings.network));
            let rings = detect_fraud_rings(&graph, RingParams::from(&settings.network));
            info!(
                "{} accounts, {} edges, {} suspicious txns → {} rings",
                graph.nodes().len(), graph.edges().len(), graph.suspicious().len(), rings.len()
            );
            rings.iter().for_each(print_ring);
            if rings.is_empty() { println!("  No fraud rings detected."); }
        }

        Mode::Mules => {
            let ds = provider.get();
            let mules = detect_mule_accounts(ds.rows(), MuleParams::from(&settings.mules));
            info!("{} mule candidates", mules.len());
            mules.iter().for_each(print_mule);
            if mules.is_empty() { println!("  No mule accounts detected."); }
        }

        Mode::Info => {
            provider.get();
            print_info(&provider.info());
        }

        Mode::Eval => {
            let ds = provider.get();
            let report = EvalReport::build(&ds, &settings.model);
            if cli.json {
                println!("{}", to_json(&report));
            } else {
                print_markdown(&report);
            }
        }
    }

    Ok(())
}
