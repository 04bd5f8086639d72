//! Blocking queue throughput and latency benchmark.
//!
//! Usage:
//!     cargo run --release --bin queue_bench
//!
//! Environment variables:
//!     PRODUCER_CPU=0        Pin producer to CPU 0 (default: 0)
//!     CONSUMER_CPU=2        Pin consumer to CPU 2 (default: 2)
//!     QUEUE_CAPACITY=1024   Queue capacity, 0 for unbounded (default: 1024)
//!     RUST_LOG=conveyor=debug  Trace filter (requires `--features tracing`)

use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use conveyor::{Priority, Queue, QueueConfig, Timeout};

const ITERATIONS: usize = 1 << 20;
const DEFAULT_CAPACITY: usize = 1024;

type Payload = u64;

fn env_usize(name: &str) -> Option<usize> {
    env::var(name).ok().and_then(|s| s.parse().ok())
}

fn get_cpu_affinity() -> (Option<usize>, Option<usize>) {
    let producer_cpu = env_usize("PRODUCER_CPU").or(Some(0));
    let consumer_cpu = env_usize("CONSUMER_CPU").or(Some(2));
    (producer_cpu, consumer_cpu)
}

fn pin_to_cpu(cpu: Option<usize>) {
    if let Some(id) = cpu {
        core_affinity::set_for_current(core_affinity::CoreId { id });
    }
}

fn new_queue(label: &str, capacity: usize) -> Queue<Payload> {
    Queue::with_config(QueueConfig {
        capacity,
        label: Some(label.to_string()),
    })
}

/// Spawns `f` on its own pinned thread and spins until it has started.
fn spawn_pinned<F>(cpu: Option<usize>, f: F) -> thread::JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    let ready = Arc::new(AtomicBool::new(false));
    let ready_clone = Arc::clone(&ready);
    let handle = thread::spawn(move || {
        pin_to_cpu(cpu);
        ready_clone.store(true, Ordering::Release);
        f();
    });
    while !ready.load(Ordering::Acquire) {
        std::hint::spin_loop();
    }
    handle
}

fn bench_throughput(capacity: usize, producer_cpu: Option<usize>, consumer_cpu: Option<usize>) {
    let queue = new_queue("throughput", capacity);
    let consumer = queue.clone();

    let consumer_thread = spawn_pinned(consumer_cpu, move || {
        for expected in 0..ITERATIONS as Payload {
            let value = consumer.pull(Timeout::Infinite).unwrap();
            if value != expected {
                panic!("Data corruption: expected {}, got {}", expected, value);
            }
        }
    });

    pin_to_cpu(producer_cpu);
    let start = Instant::now();

    for i in 0..ITERATIONS as Payload {
        queue.push(i, Priority::Normal, Timeout::Infinite).unwrap();
    }

    consumer_thread.join().unwrap();
    let elapsed = start.elapsed();

    let ops_per_ms = ITERATIONS as u128 * 1_000_000 / elapsed.as_nanos();
    println!("{} ops/ms", ops_per_ms);
}

fn bench_rtt(capacity: usize, producer_cpu: Option<usize>, consumer_cpu: Option<usize>) {
    let requests = new_queue("rtt-requests", capacity);
    let responses = new_queue("rtt-responses", capacity);

    let responder = {
        let requests = requests.clone();
        let responses = responses.clone();
        spawn_pinned(consumer_cpu, move || {
            while let Ok(value) = requests.pull(Timeout::Infinite) {
                responses.push(value, Priority::Normal, Timeout::Infinite).unwrap();
            }
        })
    };

    pin_to_cpu(producer_cpu);
    let start = Instant::now();

    for i in 0..ITERATIONS as Payload {
        requests.push(i, Priority::Normal, Timeout::Infinite).unwrap();
        responses.pull(Timeout::Infinite).unwrap();
    }

    let elapsed = start.elapsed();
    requests.close();
    responder.join().unwrap();

    let rtt_ns = elapsed.as_nanos() / ITERATIONS as u128;
    println!("{} ns RTT", rtt_ns);
}

fn main() {
    conveyor::init_tracing();

    let (producer_cpu, consumer_cpu) = get_cpu_affinity();
    let capacity = env_usize("QUEUE_CAPACITY").unwrap_or(DEFAULT_CAPACITY);

    println!(
        "conveyor queue (capacity={}, iters={}):",
        capacity, ITERATIONS
    );
    bench_throughput(capacity, producer_cpu, consumer_cpu);
    bench_rtt(capacity, producer_cpu, consumer_cpu);
}
