use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;

use farmbot::model::{Account, LogEntry};
use farmbot::store::Store;

/// File-backed store: `accounts.json` holds the account rows (edited by
/// hand or by tooling, re-read on every listing), `logs.jsonl` gets one
/// JSON line appended per bot log entry.
pub struct JsonStore {
    accounts_path: PathBuf,
    log_file: Mutex<File>,
}

impl JsonStore {
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("create {}", data_dir.display()))?;
        let accounts_path = data_dir.join("accounts.json");
        let log_path = data_dir.join("logs.jsonl");
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("open {}", log_path.display()))?;
        Ok(Self {
            accounts_path,
            log_file: Mutex::new(log_file),
        })
    }
}

impl Store for JsonStore {
    fn add_log(&self, entry: &LogEntry) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let mut file = self.log_file.lock().unwrap();
        file.write_all(&line)?;
        Ok(())
    }

    fn list_accounts(&self) -> anyhow::Result<Vec<Account>> {
        let data = match std::fs::read(&self.accounts_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("read accounts.json"),
        };
        serde_json::from_slice(&data).context("parse accounts.json")
    }
}
