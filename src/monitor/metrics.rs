// src/monitor/metrics.rs

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    pub connected_clients: Arc<AtomicU64>,
    pub total_connections: Arc<AtomicU64>,
    pub command_count: Arc<AtomicU64>,
    pub command_stats: Arc<DashMap<String, u64>>,
    pub keys_expired: Arc<AtomicU64>,
    pub events_published: Arc<AtomicU64>,
    pub events_dropped: Arc<AtomicU64>,
    pub pushes_sent: Arc<AtomicU64>,
    pub pushes_dropped: Arc<AtomicU64>,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics::default()
    }

    pub fn record_command(&self, command: &str) {
        self.command_count.fetch_add(1, Ordering::Relaxed);
        self.command_stats
            .entry(command.to_string())
            .and_modify(|c| *c += 1)
            .or_insert(1);
    }

    pub fn to_prometheus(&self) -> String {
        fn write_metric(out: &mut String, name: &str, kind: &str, help: &str, value: u64) {
            out.push_str(&format!("# HELP {} {}\n", name, help));
            out.push_str(&format!("# TYPE {} {}\n", name, kind));
            out.push_str(&format!("{} {}\n", name, value));
        }

        let mut output = String::new();

        write_metric(
            &mut output,
            "tidekv_connected_clients",
            "gauge",
            "Current number of client connections",
            self.connected_clients.load(Ordering::Relaxed),
        );
        write_metric(
            &mut output,
            "tidekv_total_connections",
            "counter",
            "Total connections since startup",
            self.total_connections.load(Ordering::Relaxed),
        );
        write_metric(
            &mut output,
            "tidekv_command_count",
            "counter",
            "Total commands processed",
            self.command_count.load(Ordering::Relaxed),
        );
        write_metric(
            &mut output,
            "tidekv_keys_expired",
            "counter",
            "Keys removed by expiry sweeps",
            self.keys_expired.load(Ordering::Relaxed),
        );
        write_metric(
            &mut output,
            "tidekv_events_published",
            "counter",
            "Change events accepted into the dispatch queue",
            self.events_published.load(Ordering::Relaxed),
        );
        write_metric(
            &mut output,
            "tidekv_events_dropped",
            "counter",
            "Change events dropped because the dispatch queue stayed full",
            self.events_dropped.load(Ordering::Relaxed),
        );
        write_metric(
            &mut output,
            "tidekv_pushes_sent",
            "counter",
            "Notifications queued to subscriber sessions",
            self.pushes_sent.load(Ordering::Relaxed),
        );
        write_metric(
            &mut output,
            "tidekv_pushes_dropped",
            "counter",
            "Notifications dropped on full session queues",
            self.pushes_dropped.load(Ordering::Relaxed),
        );

        output.push_str("# HELP tidekv_command_stats Command statistics\n");
        output.push_str("# TYPE tidekv_command_stats counter\n");
        for entry in self.command_stats.iter() {
            output.push_str(&format!(
                "tidekv_command_stats{{command=\"{}\"}} {}\n",
                entry.key(),
                entry.value()
            ));
        }

        output
    }
}
