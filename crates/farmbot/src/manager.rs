use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::catalog::GameCatalog;
use crate::config::BotConfig;
use crate::instance::Instance;
use crate::logger::Logger;
use crate::model::{Account, BotStatus};
use crate::net::NetTiming;
use crate::store::Store;

/// Registry of running instances keyed by account id. One per process;
/// the admin surface drives it and [`Manager::auto_start`] runs at boot.
pub struct Manager {
    instances: Mutex<HashMap<i64, Arc<Instance>>>,
    store: Arc<dyn Store>,
    catalog: Arc<GameCatalog>,
    server_url: String,
    client_version: String,
    timing: NetTiming,
}

impl Manager {
    pub fn new(
        store: Arc<dyn Store>,
        catalog: Arc<GameCatalog>,
        server_url: &str,
        client_version: &str,
    ) -> Self {
        Self::with_timing(
            store,
            catalog,
            server_url,
            client_version,
            NetTiming::default(),
        )
    }

    pub fn with_timing(
        store: Arc<dyn Store>,
        catalog: Arc<GameCatalog>,
        server_url: &str,
        client_version: &str,
        timing: NetTiming,
    ) -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            store,
            catalog,
            server_url: server_url.to_string(),
            client_version: client_version.to_string(),
            timing,
        }
    }

    /// Start every account flagged `auto_start` that has a login code.
    /// Individual failures are logged and skipped.
    pub async fn auto_start(&self) {
        let accounts = match self.store.list_accounts() {
            Ok(accounts) => accounts,
            Err(e) => {
                warn!(err = %e, "loading accounts for auto-start failed");
                return;
            }
        };
        for account in accounts {
            if !account.auto_start || account.code.is_empty() {
                continue;
            }
            let id = account.id;
            let name = account.name.clone();
            if let Err(e) = self.start_bot(account).await {
                warn!(account = id, name = %name, err = %e, "auto-start failed");
            }
        }
    }

    pub async fn start_bot(&self, account: Account) -> anyhow::Result<()> {
        let mut instances = self.instances.lock().await;
        if let Some(existing) = instances.get(&account.id) {
            if existing.is_running() {
                anyhow::bail!("bot #{} already running", account.id);
            }
        }

        let cfg = BotConfig::from_account(&account, &self.server_url, &self.client_version);
        let logger = Logger::new(account.id, Some(self.store.clone()));
        let instance = Instance::new(
            account,
            cfg,
            logger,
            self.catalog.clone(),
            self.timing.clone(),
        );
        instance.start().await?;
        info!(account = instance.account().id, "bot started");
        instances.insert(instance.account().id, instance);
        Ok(())
    }

    pub async fn stop_bot(&self, account_id: i64) -> anyhow::Result<()> {
        let instance = {
            let instances = self.instances.lock().await;
            instances.get(&account_id).cloned()
        };
        match instance {
            Some(instance) => {
                instance.stop().await;
                Ok(())
            }
            None => anyhow::bail!("bot #{account_id} not found"),
        }
    }

    pub async fn get_status(&self, account_id: i64) -> BotStatus {
        let instances = self.instances.lock().await;
        match instances.get(&account_id) {
            Some(instance) => instance.status(),
            None => BotStatus {
                account_id,
                running: false,
                ..Default::default()
            },
        }
    }

    pub async fn get_all_status(&self) -> Vec<BotStatus> {
        let instances = self.instances.lock().await;
        instances.values().map(|i| i.status()).collect()
    }

    pub async fn get_instance(&self, account_id: i64) -> Option<Arc<Instance>> {
        self.instances.lock().await.get(&account_id).cloned()
    }

    pub async fn stop_all(&self) {
        let instances: Vec<Arc<Instance>> =
            self.instances.lock().await.values().cloned().collect();
        for instance in instances {
            instance.stop().await;
        }
    }
}
