// src/monitor/info.rs

use std::sync::atomic::Ordering;

use crate::app::App;

pub fn build_info_response(section: Option<&str>, app: &App) -> String {
    let sections = section
        .map(|s| vec![s])
        .unwrap_or_else(|| vec!["server", "clients", "memory", "stats", "commandstats"]);

    let metrics = &app.monitor.metrics;
    let mut response = String::new();

    for sec in sections {
        match sec.to_lowercase().as_str() {
            "server" => {
                response.push_str("# Server\n");
                response.push_str(&format!("tidekv_version:{}\n", env!("CARGO_PKG_VERSION")));
                response.push_str(&format!("os:{}\n", std::env::consts::OS));
                response.push_str(&format!("addr:{}\n", app.cfg.addr));
            }
            "clients" => {
                response.push_str("# Clients\n");
                response.push_str(&format!(
                    "connected_clients:{}\n",
                    metrics.connected_clients.load(Ordering::Relaxed)
                ));
                response.push_str(&format!(
                    "total_connections:{}\n",
                    metrics.total_connections.load(Ordering::Relaxed)
                ));
            }
            "memory" => {
                response.push_str("# Memory\n");
                response.push_str(&format!("used_memory:{} bytes\n", app.store.approx_bytes()));
            }
            "stats" => {
                response.push_str("# Stats\n");
                response.push_str(&format!(
                    "total_commands_processed:{}\n",
                    metrics.command_count.load(Ordering::Relaxed)
                ));
                response.push_str(&format!("total_keys:{}\n", app.store.len()));
                response.push_str(&format!(
                    "keys_expired:{}\n",
                    metrics.keys_expired.load(Ordering::Relaxed)
                ));
                response.push_str(&format!("subscribed_keys:{}\n", app.subs.key_count()));
                response.push_str(&format!(
                    "subscriptions:{}\n",
                    app.subs.subscription_count()
                ));
                response.push_str(&format!(
                    "events_published:{}\n",
                    metrics.events_published.load(Ordering::Relaxed)
                ));
                response.push_str(&format!(
                    "events_dropped:{}\n",
                    metrics.events_dropped.load(Ordering::Relaxed)
                ));
                response.push_str(&format!(
                    "pushes_sent:{}\n",
                    metrics.pushes_sent.load(Ordering::Relaxed)
                ));
                response.push_str(&format!(
                    "pushes_dropped:{}\n",
                    metrics.pushes_dropped.load(Ordering::Relaxed)
                ));
            }
            "commandstats" => {
                response.push_str("# Command Stats\n");
                for entry in metrics.command_stats.iter() {
                    response.push_str(&format!("cmd_{}:{}\n", entry.key(), entry.value()));
                }
            }
            _ => {}
        }
    }

    response
}
