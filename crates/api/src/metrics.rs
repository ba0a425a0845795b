use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    Generate,
    Verify,
    Optimize,
}

#[derive(Default)]
struct OperationStats {
    calls: AtomicUsize,
    total_time_us: AtomicU64,
}

impl OperationStats {
    fn record(&self, duration: Duration) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.total_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> OperationSnapshot {
        let calls = self.calls.load(Ordering::Relaxed);
        let total = self.total_time_us.load(Ordering::Relaxed) as f64;
        OperationSnapshot {
            calls,
            avg_time_ms: if calls > 0 {
                total / calls as f64 / 1000.0 // Convert to ms
            } else {
                0.0
            },
        }
    }
}

#[derive(Default)]
pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    generate: OperationStats,
    verify: OperationStats,
    optimize: OperationStats,

    // Output sizes
    total_nodes_returned: AtomicUsize,
    total_edges_returned: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self, operation: Operation, duration: Duration, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        match operation {
            Operation::Generate => self.generate.record(duration),
            Operation::Verify => self.verify.record(duration),
            Operation::Optimize => self.optimize.record(duration),
        }
    }

    pub fn record_graph(&self, nodes: usize, edges: usize) {
        self.total_nodes_returned.fetch_add(nodes, Ordering::Relaxed);
        self.total_edges_returned.fetch_add(edges, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            generate: self.generate.snapshot(),
            verify: self.verify.snapshot(),
            optimize: self.optimize.snapshot(),
            total_nodes_returned: self.total_nodes_returned.load(Ordering::Relaxed),
            total_edges_returned: self.total_edges_returned.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct OperationSnapshot {
    pub calls: usize,
    pub avg_time_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub generate: OperationSnapshot,
    pub verify: OperationSnapshot,
    pub optimize: OperationSnapshot,
    pub total_nodes_returned: usize,
    pub total_edges_returned: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
