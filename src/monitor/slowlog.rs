// src/monitor/slowlog.rs

use super::SlowLogEntry;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub struct SlowLog {
    logs: Arc<Mutex<VecDeque<SlowLogEntry>>>,
    max_entries: usize,
    slow_threshold: Duration,
}

impl SlowLog {
    pub fn new(max_entries: usize, slow_threshold: Duration) -> Self {
        SlowLog {
            logs: Arc::new(Mutex::new(VecDeque::with_capacity(max_entries))),
            max_entries,
            slow_threshold,
        }
    }

    pub fn add_entry(&self, command: &str, duration: Duration, client_addr: &str) {
        if duration >= self.slow_threshold {
            let mut logs = self.logs.lock().unwrap();
            if logs.len() >= self.max_entries {
                logs.pop_back();
            }
            logs.push_front(SlowLogEntry {
                timestamp: Instant::now(),
                duration,
                command: command.to_string(),
                client_addr: client_addr.to_string(),
            });
        }
    }

    pub fn len(&self) -> usize {
        self.logs.lock().unwrap().len()
    }

    pub fn get_logs(&self) -> String {
        let logs = self.logs.lock().unwrap();
        let mut response = String::new();

        for (i, entry) in logs.iter().enumerate() {
            response.push_str(&format!(
                "{}. duration: {}ms, command: {}, client: {}\n",
                i + 1,
                entry.duration.as_millis(),
                entry.command,
                entry.client_addr
            ));
        }

        response
    }
}
