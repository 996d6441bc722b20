use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc;

use crate::model::{LogEntry, LogLevel};
use crate::store::Store;

const SUBSCRIBER_BUFFER: usize = 100;

/// Per-account structured log fan-out.
///
/// Every entry goes three ways: appended to the store (best-effort, store
/// errors are swallowed so a slow disk can't stall the session), pushed to
/// every live subscriber with a non-blocking send (drop on full), and
/// mirrored onto `tracing` for the daemon's own output.
pub struct Logger {
    account_id: i64,
    store: Option<Arc<dyn Store>>,
    subscribers: Mutex<HashMap<u64, mpsc::Sender<Arc<LogEntry>>>>,
    next_sub_id: Mutex<u64>,
}

impl Logger {
    pub fn new(account_id: i64, store: Option<Arc<dyn Store>>) -> Arc<Self> {
        Arc::new(Self {
            account_id,
            store,
            subscribers: Mutex::new(HashMap::new()),
            next_sub_id: Mutex::new(0),
        })
    }

    pub fn account_id(&self) -> i64 {
        self.account_id
    }

    pub fn info(&self, tag: &str, message: impl Into<String>) {
        self.emit(LogLevel::Info, tag, message.into());
    }

    pub fn warn(&self, tag: &str, message: impl Into<String>) {
        self.emit(LogLevel::Warn, tag, message.into());
    }

    pub fn error(&self, tag: &str, message: impl Into<String>) {
        self.emit(LogLevel::Error, tag, message.into());
    }

    fn emit(&self, level: LogLevel, tag: &str, message: String) {
        let entry = Arc::new(LogEntry {
            account_id: self.account_id,
            tag: tag.to_string(),
            message,
            level,
            created_at: Utc::now(),
        });

        if let Some(store) = &self.store {
            let _ = store.add_log(&entry);
        }

        {
            let mut subs = self.subscribers.lock().unwrap();
            subs.retain(|_, tx| match tx.try_send(entry.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
        }

        match level {
            LogLevel::Warn => {
                tracing::warn!(account = self.account_id, tag = %entry.tag, "{}", entry.message)
            }
            LogLevel::Error => {
                tracing::error!(account = self.account_id, tag = %entry.tag, "{}", entry.message)
            }
            LogLevel::Debug => {
                tracing::debug!(account = self.account_id, tag = %entry.tag, "{}", entry.message)
            }
            LogLevel::Info => {
                tracing::info!(account = self.account_id, tag = %entry.tag, "{}", entry.message)
            }
        }
    }

    /// Register a live log subscriber. Drop the receiver (or call
    /// [`Logger::unsubscribe`]) to stop; a dead receiver is also pruned on
    /// the next emit.
    pub fn subscribe(&self) -> (u64, mpsc::Receiver<Arc<LogEntry>>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = {
            let mut next = self.next_sub_id.lock().unwrap();
            *next += 1;
            *next
        };
        self.subscribers.lock().unwrap().insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().unwrap().remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore(AtomicUsize);

    impl Store for CountingStore {
        fn add_log(&self, _entry: &LogEntry) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("disk full")
        }

        fn list_accounts(&self) -> anyhow::Result<Vec<crate::model::Account>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn store_errors_are_swallowed_and_subscribers_still_receive() {
        let store = Arc::new(CountingStore(AtomicUsize::new(0)));
        let logger = Logger::new(9, Some(store.clone()));
        let (_id, mut rx) = logger.subscribe();

        logger.info("农场", "收获3块");

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.account_id, 9);
        assert_eq!(entry.tag, "农场");
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(store.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn full_subscriber_drops_entries_without_blocking() {
        let logger = Logger::new(1, None);
        let (_id, mut rx) = logger.subscribe();
        for i in 0..SUBSCRIBER_BUFFER + 20 {
            logger.info("测试", format!("line {i}"));
        }
        // The channel holds at most SUBSCRIBER_BUFFER entries; the rest were
        // dropped silently and emit never blocked.
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, SUBSCRIBER_BUFFER);
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned() {
        let logger = Logger::new(1, None);
        let (id, rx) = logger.subscribe();
        drop(rx);
        logger.info("测试", "a");
        assert!(logger.subscribers.lock().unwrap().is_empty());
        // Unsubscribing an already-pruned id is a no-op.
        logger.unsubscribe(id);
    }
}
