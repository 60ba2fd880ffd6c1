use clap::Parser;
use pfsim_rs::config::SimConfig;
use pfsim_rs::error::{SimError, SimResult};
use pfsim_rs::net::{NetWorld, Network, SignalRow, SimContext, SinkReport, TopologyGraph};
use pfsim_rs::sim::{SimTime, Simulator};
use pfsim_rs::topo::fat_tree::{FatTreeOpts, build_fat_tree};
use pfsim_rs::topo::layout::TopologyLayout;
use pfsim_rs::workload::schedule_workload;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "storage-sim",
    about = "Simulate the data path of a fat-tree connected storage cluster"
)]
struct Args {
    /// Path to a JSON config (partial documents override defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a JSON topology layout; defaults to a built-in fat-tree
    #[arg(long)]
    topology: Option<PathBuf>,

    /// Fat-tree arity (even, >= 2)
    #[arg(long, default_value_t = 4)]
    k: usize,

    /// Storage servers attached to each core switch
    #[arg(long, default_value_t = 1)]
    oss_per_core: usize,

    /// Storage targets behind each storage server
    #[arg(long, default_value_t = 3)]
    ost_per_oss: usize,

    /// Override the random seed from the config
    #[arg(long)]
    seed: Option<u64>,

    /// Run until this time (ms); defaults to running until completion
    #[arg(long)]
    until_ms: Option<u64>,

    /// Print a JSON summary on stdout instead of the human-readable one
    #[arg(long)]
    summary_json: bool,
}

#[derive(Debug, Serialize)]
struct Summary {
    #[serde(flatten)]
    sink: SinkReport,
    final_time_ns: u64,
    events: u64,
    transmitted_fragments: u64,
    transmitted_bytes: u64,
    signals: Vec<SignalRow>,
}

fn read(path: &Path) -> SimResult<String> {
    fs::read_to_string(path)
        .map_err(|e| SimError::InvalidConfig(format!("read {}: {e}", path.display())))
}

fn load_config(args: &Args) -> SimResult<SimConfig> {
    let mut cfg = match &args.config {
        Some(path) => SimConfig::from_json_str(&read(path)?)?,
        None => SimConfig::default(),
    };
    if let Some(seed) = args.seed {
        cfg.seed = seed;
    }
    Ok(cfg)
}

fn load_topology(args: &Args) -> SimResult<TopologyGraph> {
    match &args.topology {
        Some(path) => TopologyLayout::from_json_str(&read(path)?)?.build(),
        None => {
            let opts = FatTreeOpts {
                k: args.k,
                oss_per_core: args.oss_per_core,
                ost_per_oss: args.ost_per_oss,
                ..FatTreeOpts::default()
            };
            build_fat_tree(&opts).map(|(graph, _)| graph)
        }
    }
}

fn run(args: &Args) -> SimResult<Summary> {
    let cfg = load_config(args)?;
    let graph = load_topology(args)?;
    let ctx = SimContext::build(graph, cfg)?;

    let mut sim = Simulator::default();
    let mut world = NetWorld::new(Network::new(ctx));
    schedule_workload(&mut sim, &world);

    match args.until_ms {
        Some(ms) => sim.run_until(SimTime::from_millis(ms), &mut world)?,
        None => sim.run(&mut world)?,
    }

    let net = &world.net;
    Ok(Summary {
        sink: net.sink.report(),
        final_time_ns: sim.now().as_nanos(),
        events: sim.executed(),
        transmitted_fragments: net.stats.transmitted_fragments,
        transmitted_bytes: net.stats.transmitted_bytes,
        signals: net.stats.rows(),
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();
    let summary = match run(&args) {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, configuration = e.is_configuration(), "simulation aborted");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.summary_json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("error: serialize summary: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        info!(events = summary.events, "summary ready");
        println!(
            "done @ {}ns, completed={}, read_bytes={}, write_bytes={}, mean_latency_us={:.3}, throughput_mbps={:.3}",
            summary.final_time_ns,
            summary.sink.completed,
            summary.sink.read_bytes,
            summary.sink.write_bytes,
            summary.sink.mean_latency_us,
            summary.sink.throughput_mbps
        );
    }
    ExitCode::SUCCESS
}
