//! Traffic Generator End-to-End Tests.
//!
//! Runs seeded workloads through the full system and checks completion,
//! payload round-trips, and statistics consistency.

use cxlsim_core::config::{Config, TrafficPattern};
use cxlsim_core::sim::traffic::TrafficGen;
use cxlsim_core::Simulator;

fn base_config() -> Config {
    let mut config = Config::default();
    config.mem.ram_base = 0;
    config.mem.ram_size = 1024 * 1024;
    config.ctrl.write_pkt_threshold = 16;
    config.traffic.working_set = 2048;
    config.traffic.period = 1_000;
    config
}

fn run_workload(config: &Config) -> Simulator {
    let _ = env_logger::builder().is_test(true).try_init();
    let traffic = TrafficGen::new(config);
    let mut sim = Simulator::new(config, Box::new(traffic)).expect("valid config");
    sim.run();
    sim.drain();
    sim.run();
    sim
}

#[test]
fn write_then_read_round_trips() {
    let mut config = base_config();
    config.traffic.num_packets = 64;
    config.traffic.pattern = TrafficPattern::WriteRead;
    let sim = run_workload(&config);

    assert!(sim.requestor.done(), "workload incomplete");
    let r#gen = sim.requestor.as_traffic_gen().expect("traffic gen");
    assert_eq!(r#gen.issued(), 64);
    assert_eq!(r#gen.received(), 64);
    assert_eq!(r#gen.verify_errors(), 0);

    let s = &sim.ctrl.stats;
    assert_eq!(s.num_packets, 64);
    assert_eq!(s.read_packets + s.write_packets, 64);
    assert_eq!(
        s.read_packets,
        s.serviced_by_wrq + s.dram_read_packets + s.non_dram_read_packets
    );
}

#[test]
fn random_mix_round_trips() {
    let mut config = base_config();
    config.traffic.num_packets = 200;
    config.traffic.pattern = TrafficPattern::Random;
    config.general.seed = 7;
    let sim = run_workload(&config);

    assert!(sim.requestor.done(), "workload incomplete");
    let r#gen = sim.requestor.as_traffic_gen().expect("traffic gen");
    assert_eq!(r#gen.verify_errors(), 0);
    assert_eq!(sim.ctrl.stats.num_packets, 200);
}

#[test]
fn seeds_are_deterministic() {
    let mut config = base_config();
    config.traffic.num_packets = 100;
    config.traffic.pattern = TrafficPattern::Random;
    let a = run_workload(&config);
    let b = run_workload(&config);
    assert_eq!(a.now(), b.now());
    assert_eq!(a.ctrl.stats.read_packets, b.ctrl.stats.read_packets);
    assert_eq!(a.ctrl.stats.total_latency, b.ctrl.stats.total_latency);
    assert_eq!(a.ctrl.stats.compressed_bytes, b.ctrl.stats.compressed_bytes);
}

#[test]
fn small_queues_still_complete() {
    let mut config = base_config();
    config.traffic.num_packets = 120;
    config.traffic.pattern = TrafficPattern::Random;
    config.ctrl.read_buffer_size = 2;
    config.ctrl.write_buffer_size = 4;
    config.ctrl.write_pkt_threshold = 4;
    config.ctrl.response_buffer_size = 2;
    config.mem.mem_queue_size = 2;
    // Inject fast enough to hit every backpressure path.
    config.traffic.period = 100;
    let sim = run_workload(&config);

    assert!(sim.requestor.done(), "workload incomplete");
    let r#gen = sim.requestor.as_traffic_gen().expect("traffic gen");
    assert_eq!(r#gen.received(), 120);
    assert_eq!(r#gen.verify_errors(), 0);
    assert_eq!(sim.ctrl.open_latency_records(), 0);
}
