//! CXL memory controller simulator CLI.
//!
//! This binary builds a controller + DRAM system from an optional JSON
//! config, plays a synthetic workload through it, drains, and prints the
//! controller statistics.

use clap::{Parser, Subcommand};
use std::{fs, process};

use cxlsim_core::config::{Config, TrafficPattern};
use cxlsim_core::sim::eventq::DrainState;
use cxlsim_core::sim::traffic::TrafficGen;
use cxlsim_core::Simulator;

#[derive(Parser, Debug)]
#[command(
    name = "cxlsim",
    author,
    version,
    about = "CXL compressed-memory controller simulator",
    long_about = "Model a memory controller behind a CXL.mem link with transparent LZ4 line \
compression.\n\nConfiguration is JSON (see cxlsim_core::config::Config); every field has a \
built-in default.\n\nExamples:\n  cxlsim run\n  cxlsim run --packets 4096 --pattern random\n  \
cxlsim run --config sweep.json --stats summary --stats latency"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a synthetic workload and print statistics.
    Run {
        /// JSON configuration file; defaults apply for missing fields.
        #[arg(short, long)]
        config: Option<String>,

        /// Override the number of packets to inject.
        #[arg(short, long)]
        packets: Option<usize>,

        /// Override the traffic pattern.
        #[arg(long, value_parser = parse_pattern)]
        pattern: Option<TrafficPattern>,

        /// Override the RNG seed.
        #[arg(long)]
        seed: Option<u64>,

        /// Statistics sections to print (repeatable); all when omitted.
        #[arg(long)]
        stats: Vec<String>,
    },
}

fn parse_pattern(s: &str) -> Result<TrafficPattern, String> {
    match s.to_ascii_lowercase().as_str() {
        "write-read" | "writeread" | "write-then-read" => Ok(TrafficPattern::WriteRead),
        "random" => Ok(TrafficPattern::Random),
        other => Err(format!("unknown pattern '{}', expected write-read or random", other)),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            packets,
            pattern,
            seed,
            stats,
        } => cmd_run(config, packets, pattern, seed, stats),
    }
}

fn load_config(path: Option<&str>) -> Config {
    let Some(path) = path else {
        return Config::default();
    };
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("cxlsim: cannot read config {}: {}", path, err);
            process::exit(1);
        }
    };
    match serde_json::from_str(&text) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("cxlsim: malformed config {}: {}", path, err);
            process::exit(1);
        }
    }
}

fn cmd_run(
    config: Option<String>,
    packets: Option<usize>,
    pattern: Option<TrafficPattern>,
    seed: Option<u64>,
    stats: Vec<String>,
) {
    let mut config = load_config(config.as_deref());
    if let Some(packets) = packets {
        config.traffic.num_packets = packets;
    }
    if let Some(pattern) = pattern {
        config.traffic.pattern = pattern;
    }
    if let Some(seed) = seed {
        config.general.seed = seed;
    }

    println!(
        "Configuration: {} packets, {:?} pattern, seed {}",
        config.traffic.num_packets, config.traffic.pattern, config.general.seed
    );
    println!(
        "  Queues: rd {} / wr {} / resp {}  threshold {}  block {} B",
        config.ctrl.read_buffer_size,
        config.ctrl.write_buffer_size,
        config.ctrl.response_buffer_size,
        config.ctrl.write_pkt_threshold,
        config.ctrl.compressed_size
    );

    let traffic = TrafficGen::new(&config);
    let mut sim = match Simulator::new(&config, Box::new(traffic)) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("cxlsim: configuration error: {}", err);
            process::exit(1);
        }
    };

    sim.run();
    let drained = sim.drain();
    if drained != DrainState::Drained {
        eprintln!("cxlsim: system failed to drain");
        process::exit(1);
    }

    if !sim.requestor.done() {
        eprintln!("cxlsim: workload did not complete");
        process::exit(1);
    }
    if let Some(r#gen) = sim.requestor.as_traffic_gen() {
        println!(
            "[*] {} packets issued, {} responses, {} verify errors",
            r#gen.issued(),
            r#gen.received(),
            r#gen.verify_errors()
        );
        if r#gen.verify_errors() > 0 {
            process::exit(1);
        }
    }

    sim.ctrl.stats.print_sections(&stats, sim.now());
}
