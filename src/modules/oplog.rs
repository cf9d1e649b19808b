use std::sync::{Arc, Mutex};

use chrono::Local;
use log::info;

/// Timestamped line buffer the host renders next to the sync controls.
/// Every line also goes to the regular log. Cloning is cheap and clones
/// share the buffer, so background tasks can keep appending.
#[derive(Clone, Debug, Default)]
pub struct OperatorLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl OperatorLog {
    pub fn new() -> OperatorLog {
        OperatorLog::default()
    }

    pub fn append(&self, message: &str) {
        info!(target: "robis", "{}", message);
        let line = format!("{} - {}", Local::now().format("%H:%M:%S"), message);
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }

    /// Snapshot of all lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}
