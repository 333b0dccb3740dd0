use anyhow::Context;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use kb_core::traits::{ActionRecord, ActionSink};

/// Appends one JSON object per line to a log file. Parent directories are
/// created on first write.
pub struct JsonlActionSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlActionSink {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into(), write_lock: Mutex::new(()) } }

    pub fn path(&self) -> &Path { &self.path }
}

impl ActionSink for JsonlActionSink {
    fn record(&self, record: &ActionRecord) -> anyhow::Result<()> {
        let line = serde_json::to_string(record)?;
        let _guard = self.write_lock.lock().map_err(|_| anyhow::anyhow!("telemetry lock poisoned"))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
