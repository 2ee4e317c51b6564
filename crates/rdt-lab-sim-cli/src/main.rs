use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, info};

use rdt_lab_abstract::SimConfig;
use rdt_lab_protocol::AlternatingBit;
use rdt_lab_simulator::scenario_runner::{load_scenario, run_loaded};
use rdt_lab_simulator::{SimulationReport, Simulator};

#[derive(Parser, Debug)]
#[command(author, version, about = "Stop-and-wait RDT lab simulator")]
struct Args {
    /// Load simulation parameters from a TOML file; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of application packets to generate.
    #[arg(long)]
    packets: Option<u32>,

    /// Frame loss probability [0, 1].
    #[arg(long)]
    loss: Option<f64>,

    /// Frame corruption probability [0, 1].
    #[arg(long)]
    corrupt: Option<f64>,

    /// Average time between packets from the application (> 0).
    #[arg(long)]
    interarrival: Option<f64>,

    /// Trace level, 0 (warnings only) to 3 (everything).
    #[arg(long)]
    trace: Option<u8>,

    /// Retransmission timeout used by both entities.
    #[arg(long)]
    timeout: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Let B generate application data as well (`--bidirectional false` turns it off).
    #[arg(long, action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    bidirectional: Option<bool>,

    /// Run a scenario file and check its assertions.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.sim_config()?;
    init_logging(config.trace_level);
    info!("rdt-lab-sim-cli starting…");

    let report = match &args.scenario {
        Some(path) => run_scenario_file(path, config)?,
        None => run_default_sim(config)?,
    };
    print_summary(&report);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

impl Args {
    fn sim_config(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => SimConfig::default(),
        };
        if let Some(v) = self.packets {
            config.max_packets = v;
        }
        if let Some(v) = self.loss {
            config.loss_prob = v;
        }
        if let Some(v) = self.corrupt {
            config.corrupt_prob = v;
        }
        if let Some(v) = self.interarrival {
            config.mean_interarrival = v;
        }
        if let Some(v) = self.trace {
            config.trace_level = v;
        }
        if let Some(v) = self.timeout {
            config.timeout = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.bidirectional {
            config.bidirectional = v;
        }
        Ok(config)
    }
}

fn init_logging(trace_level: u8) {
    let level = match trace_level {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn entity(config: &SimConfig) -> AlternatingBit {
    AlternatingBit::new(config.timeout)
}

fn run_default_sim(config: SimConfig) -> Result<SimulationReport> {
    info!(
        "packets={} loss={} corrupt={} interarrival={} trace={}",
        config.max_packets,
        config.loss_prob,
        config.corrupt_prob,
        config.mean_interarrival,
        config.trace_level
    );
    let mut sim = Simulator::new(config.clone(), entity(&config), entity(&config))
        .context("Simulator refused to start")?;
    sim.run_until_complete();
    Ok(sim.export_report())
}

fn run_scenario_file(path: &Path, config: SimConfig) -> Result<SimulationReport> {
    let scenario = load_scenario(path)?;
    run_loaded(&scenario, config, entity)
}

fn print_summary(report: &SimulationReport) {
    println!(
        "Simulator terminated at time {:.3} after {} packets from the application",
        report.simulated_time, report.packets_generated
    );
    println!(
        "frames sent: {} | lost: {} | corrupted: {} | delivered: {}",
        report.channel.frames_sent,
        report.channel.frames_lost,
        report.channel.frames_corrupted,
        report.deliveries.len()
    );
}

fn load_config(path: &Path) -> Result<SimConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: SimConfig = toml::from_str(&content).context("Failed to parse config file")?;
    Ok(config)
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
