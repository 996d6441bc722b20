use crate::model::{Account, LogEntry};

/// Persistence seam consumed by the engine. The daemon decides what backs
/// it; the engine only appends log lines and lists accounts for auto-start.
pub trait Store: Send + Sync {
    fn add_log(&self, entry: &LogEntry) -> anyhow::Result<()>;
    fn list_accounts(&self) -> anyhow::Result<Vec<Account>>;
}
