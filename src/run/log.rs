//! Run Log
//!
//! Append-only, human-readable log of one run. Lines are stamped with the
//! wall-clock time and rendered newline-terminated.

use chrono::Utc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunLog {
    entries: Vec<String>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a `[HH:MM:SS] message` line.
    pub fn push(&mut self, message: impl AsRef<str>) {
        let stamp = Utc::now().format("%H:%M:%S");
        self.entries.push(format!("[{}] {}", stamp, message.as_ref()));
    }

    pub fn node_started(&mut self, node_id: &str) {
        self.push(format!("Node {} started", node_id));
    }

    pub fn node_completed(&mut self, node_id: &str) {
        self.push(format!("Node {} completed successfully", node_id));
    }

    pub fn node_failed(&mut self, node_id: &str, error: &dyn std::fmt::Display) {
        self.push(format!("Node {} failed: {}", node_id, error));
    }

    pub fn node_retrying(&mut self, node_id: &str, attempt: u32, max_attempts: u32) {
        self.push(format!(
            "Node {} retrying (attempt {}/{})",
            node_id, attempt, max_attempts
        ));
    }

    pub fn node_skipped(&mut self, node_id: &str, reason: &str) {
        self.push(format!("Node {} skipped: {}", node_id, reason));
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Log text as stored on the run: each entry followed by a newline.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.entries.iter().map(|e| e.len() + 1).sum());
        for entry in &self.entries {
            out.push_str(entry);
            out.push('\n');
        }
        out
    }
}
