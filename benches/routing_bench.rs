// Routing latency benchmark
// Measures per-event classification and fan-out through the reference table
// Target: p99 well under one MIDI byte time (~320us) so routing never adds audible lag

use rigboot::config::presets::reference_routing;
use rigboot::routing::{run_worker, MidiEvent, RoutingTable};
use std::hint::black_box;
use std::time::{Duration, Instant};

/// Benchmark configuration
const ITERATIONS: usize = 100_000;
const WARMUP_ITERATIONS: usize = 10_000;
const BUDGET_P99: Duration = Duration::from_micros(320);

/// Latency percentiles
struct LatencyStats {
    p50: Duration,
    p95: Duration,
    p99: Duration,
    min: Duration,
    max: Duration,
    mean: Duration,
}

impl LatencyStats {
    fn from_samples(mut samples: Vec<Duration>) -> Self {
        samples.sort();
        let len = samples.len();

        let p50_idx = (len as f64 * 0.50) as usize;
        let p95_idx = (len as f64 * 0.95) as usize;
        let p99_idx = (len as f64 * 0.99) as usize;

        let sum: Duration = samples.iter().sum();
        let mean = sum / len as u32;

        Self {
            p50: samples[p50_idx],
            p95: samples[p95_idx],
            p99: samples[p99_idx],
            min: samples[0],
            max: samples[len - 1],
            mean,
        }
    }

    fn print(&self, label: &str) {
        println!("\n{}", label);
        println!("  p50: {:?}", self.p50);
        println!("  p95: {:?}", self.p95);
        println!("  p99: {:?}", self.p99);
        println!("  min: {:?}", self.min);
        println!("  max: {:?}", self.max);
        println!("  mean: {:?}", self.mean);
    }
}

struct BenchmarkResult {
    scenario: String,
    stats: LatencyStats,
    passed: bool,
}

impl BenchmarkResult {
    fn print(&self) {
        println!("\n=== {} ===", self.scenario);
        self.stats.print("Latency");
        if self.passed {
            println!("PASS");
        } else {
            println!("FAIL: p99={:?} (target <{:?})", self.stats.p99, BUDGET_P99);
        }
    }
}

fn measure(scenario: &str, table: &RoutingTable, events: &[MidiEvent]) -> BenchmarkResult {
    for i in 0..WARMUP_ITERATIONS {
        black_box(table.route(&events[i % events.len()]));
    }

    let mut samples = Vec::with_capacity(ITERATIONS);
    for i in 0..ITERATIONS {
        let event = &events[i % events.len()];
        let start = Instant::now();
        black_box(table.route(black_box(event)));
        samples.push(start.elapsed());
    }

    let stats = LatencyStats::from_samples(samples);
    BenchmarkResult {
        scenario: scenario.to_string(),
        passed: stats.p99 < BUDGET_P99,
        stats,
    }
}

fn note_on(channel: u8) -> MidiEvent {
    MidiEvent::NoteOn {
        channel,
        note: 60,
        velocity: 100,
    }
}

/// Whole worker loop including JSON decode and encode
fn measure_worker(table: &RoutingTable) -> BenchmarkResult {
    let line = "{\"kind\":\"note_on\",\"channel\":3,\"note\":60,\"velocity\":100}\n";
    let mut samples = Vec::with_capacity(ITERATIONS / 10);
    let mut sink = Vec::with_capacity(256);
    for _ in 0..ITERATIONS / 10 {
        sink.clear();
        let start = Instant::now();
        let _ = black_box(run_worker(table, line.as_bytes(), &mut sink));
        samples.push(start.elapsed());
    }

    let stats = LatencyStats::from_samples(samples);
    BenchmarkResult {
        scenario: "Worker line round trip (fan-out)".to_string(),
        passed: stats.p99 < BUDGET_P99,
        stats,
    }
}

fn main() {
    println!("=== rigboot Routing Latency Benchmark ===");
    println!("Iterations: {} (after {} warmup)", ITERATIONS, WARMUP_ITERATIONS);

    let table = reference_routing();
    let pedal = MidiEvent::Control {
        channel: 1,
        controller: 64,
        value: 127,
    };

    let results = vec![
        measure("Single rule", &table, &[note_on(1)]),
        measure("Fan-out rule", &table, &[note_on(3), note_on(5)]),
        measure("Sustain broadcast", &table, &[pedal]),
        measure("Unmapped channel", &table, &[note_on(11)]),
        measure_worker(&table),
    ];

    for result in &results {
        result.print();
    }

    let passed_count = results.iter().filter(|r| r.passed).count();
    let total_count = results.len();
    println!("\n=== Summary ===");
    println!("{}/{} scenarios passed", passed_count, total_count);

    if passed_count == total_count {
        println!("All routing budgets met");
        std::process::exit(0);
    } else {
        println!("Some routing budgets exceeded");
        std::process::exit(1);
    }
}
