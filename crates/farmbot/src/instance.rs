use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::catalog::GameCatalog;
use crate::config::BotConfig;
use crate::landcache::LandCache;
use crate::logger::Logger;
use crate::model::{Account, BotStatus};
use crate::net::{DisconnectReason, Net, NetTiming};
use crate::workers::farm::FarmWorker;
use crate::workers::fertilizer::FertilizerWorker;
use crate::workers::friend::FriendWorker;
use crate::workers::task::TaskWorker;
use crate::workers::warehouse::WarehouseWorker;
use crate::workers::BotStats;

/// Login timeouts tolerated before the watchdog surrenders.
pub const MAX_LOGIN_TIMEOUT_ATTEMPTS: u32 = 3;

/// A connect-or-login failure, tagged with the disconnect reason so the
/// watchdog can strike-count login timeouts.
#[derive(Debug)]
pub struct ConnectFailure {
    pub reason: DisconnectReason,
    pub message: String,
}

impl std::fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConnectFailure {}

#[derive(Default)]
struct Inner {
    net: Option<Arc<Net>>,
    running: bool,
    started_at: Option<DateTime<Utc>>,
    error: String,
}

/// Per-account supervisor. Owns one session at a time; the watchdog task
/// re-establishes sessions after retryable disconnects with exponential
/// backoff, and surrenders on kickout, explicit stop, or repeated login
/// timeouts.
pub struct Instance {
    account: Account,
    cfg: Arc<BotConfig>,
    logger: Arc<Logger>,
    catalog: Arc<GameCatalog>,
    lands: Arc<LandCache>,
    stats: Arc<BotStats>,
    timing: NetTiming,
    inner: Mutex<Inner>,
    stop: CancellationToken,
}

impl Instance {
    pub fn new(
        account: Account,
        cfg: BotConfig,
        logger: Arc<Logger>,
        catalog: Arc<GameCatalog>,
        timing: NetTiming,
    ) -> Arc<Self> {
        Arc::new(Self {
            account,
            cfg: Arc::new(cfg),
            logger,
            catalog,
            lands: Arc::new(LandCache::new()),
            stats: Arc::new(BotStats::default()),
            timing,
            inner: Mutex::new(Inner::default()),
            stop: CancellationToken::new(),
        })
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().running
    }

    /// Connect, log in, start workers, then hand the session to the
    /// watchdog. Fails fast when the first connect or login fails.
    pub async fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        if self.is_running() {
            anyhow::bail!("bot #{} already running", self.account.id);
        }
        self.connect_and_run()
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        let inst = self.clone();
        tokio::spawn(inst.watchdog());
        Ok(())
    }

    /// Signal the watchdog and tear the session down.
    pub async fn stop(&self) {
        self.stop.cancel();
        let net = self.inner.lock().unwrap().net.clone();
        if let Some(net) = net {
            net.close().await;
        }
        self.inner.lock().unwrap().running = false;
    }

    async fn connect_and_run(&self) -> Result<(), ConnectFailure> {
        self.logger
            .info("启动", format!("正在连接 {} 平台...", self.cfg.platform));

        let net = match Net::connect(
            &self.cfg.server_url,
            &self.cfg.platform,
            &self.cfg.client_version,
            &self.cfg.code,
            self.logger.clone(),
            self.timing.clone(),
            None,
        )
        .await
        {
            Ok(net) => net,
            Err(e) => {
                let message = format!("connect: {e:#}");
                self.set_error(&message);
                return Err(ConnectFailure {
                    reason: DisconnectReason::Unknown,
                    message,
                });
            }
        };

        if let Err(e) = net.login().await {
            let reason = net.disconnect_reason();
            net.close().await;
            let message = format!("login: {e}");
            self.set_error(&message);
            return Err(ConnectFailure { reason, message });
        }

        {
            let mut inner = self.inner.lock().unwrap();
            inner.net = Some(net.clone());
            inner.running = true;
            inner.started_at = Some(Utc::now());
            inner.error.clear();
        }

        net.start_heartbeat();

        tokio::spawn(
            FarmWorker::new(
                net.clone(),
                self.logger.clone(),
                self.cfg.clone(),
                self.catalog.clone(),
                self.lands.clone(),
            )
            .run_loop(),
        );
        tokio::spawn(
            FriendWorker::new(
                net.clone(),
                self.logger.clone(),
                self.cfg.clone(),
                self.stats.clone(),
            )
            .run_loop(),
        );
        tokio::spawn(TaskWorker::new(net.clone(), self.logger.clone(), self.cfg.clone()).run_loop());
        tokio::spawn(
            WarehouseWorker::new(
                net.clone(),
                self.logger.clone(),
                self.cfg.clone(),
                self.catalog.clone(),
            )
            .run_loop(),
        );
        tokio::spawn(
            FertilizerWorker::new(net.clone(), self.logger.clone(), self.cfg.clone()).run_loop(),
        );

        Ok(())
    }

    async fn watchdog(self: Arc<Self>) {
        let mut backoff = self.timing.reconnect_backoff_init;
        let mut login_timeouts = 0u32;

        loop {
            let net = match self.inner.lock().unwrap().net.clone() {
                Some(net) => net,
                None => return,
            };

            tokio::select! {
                _ = net.done() => {}
                _ = self.stop.cancelled() => return,
            }

            let reason = net.disconnect_reason();
            self.inner.lock().unwrap().running = false;

            if !reason.retryable() {
                self.logger
                    .warn("系统", format!("连接断开 (reason={reason})，不再重连"));
                self.set_error(&format!("断开: {reason}"));
                return;
            }

            if reason == DisconnectReason::LoginTimeout {
                login_timeouts += 1;
                if login_timeouts >= MAX_LOGIN_TIMEOUT_ATTEMPTS {
                    self.surrender_on_login_timeout(login_timeouts);
                    return;
                }
            }

            self.logger.warn(
                "系统",
                format!("连接断开 (reason={reason})，{backoff:?} 后尝试重连..."),
            );

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = self.stop.cancelled() => {
                        self.logger.info("系统", "Bot 已停止");
                        return;
                    }
                }

                match self.connect_and_run().await {
                    Ok(()) => {
                        self.logger.info("重连", "成功");
                        backoff = self.timing.reconnect_backoff_init;
                        login_timeouts = 0;
                        break;
                    }
                    Err(e) => {
                        if e.reason == DisconnectReason::LoginTimeout {
                            login_timeouts += 1;
                            if login_timeouts >= MAX_LOGIN_TIMEOUT_ATTEMPTS {
                                self.surrender_on_login_timeout(login_timeouts);
                                return;
                            }
                        }
                        self.logger.warn("重连", format!("失败: {e}"));
                        backoff = (backoff * 2).min(self.timing.reconnect_backoff_max);
                    }
                }
            }
        }
    }

    fn surrender_on_login_timeout(&self, attempts: u32) {
        self.logger
            .warn("系统", format!("登录超时累计 {attempts} 次，停止重连"));
        self.set_error(&format!(
            "登录超时达上限 ({attempts}/{MAX_LOGIN_TIMEOUT_ATTEMPTS})"
        ));
    }

    fn set_error(&self, message: &str) {
        self.inner.lock().unwrap().error = message.to_string();
    }

    pub fn status(&self) -> BotStatus {
        let (net, running, started_at, error) = {
            let inner = self.inner.lock().unwrap();
            (
                inner.net.clone(),
                inner.running,
                inner.started_at,
                inner.error.clone(),
            )
        };

        let mut status = BotStatus {
            account_id: self.account.id,
            running,
            platform: self.cfg.platform.clone(),
            error,
            ..Default::default()
        };

        if running {
            if let Some(net) = net {
                let snap = net.user().snapshot();
                status.gid = snap.gid;
                status.name = snap.name;
                status.level = snap.level;
                status.exp = snap.exp;
                status.gold = snap.gold;
                status.started_at = started_at;

                if let Some(next_exp) = self.catalog.next_level_exp(snap.level) {
                    status.next_level_exp = next_exp;
                    status.exp_to_next_level = (next_exp - snap.exp).max(0);
                    let (rate, hours) = self.estimate_level_up(status.exp_to_next_level);
                    status.exp_rate_per_hour = rate;
                    status.hours_to_next_level = hours;
                }
            }
        }

        status.total_steal = self.stats.total_steal.load(Ordering::Relaxed);
        status.total_help = self.stats.total_help.load(Ordering::Relaxed);
        status.friends_count = self.stats.friends_count.load(Ordering::Relaxed);

        let (total_lands, unlocked_lands, lands) = self.lands.get();
        status.total_lands = total_lands;
        status.unlocked_lands = unlocked_lands;
        status.lands = lands;

        status
    }

    /// Project exp/hour and hours-to-level-up from current harvest data.
    ///
    /// Two models combined: discrete upcoming harvest events (to catch a
    /// level-up mid-cycle), then the steady-state rate for whatever exp is
    /// still missing. Multi-season crops harvest once per season, with the
    /// second season rerunning the tail phases of the grow table.
    fn estimate_level_up(&self, exp_to_next: i64) -> (f64, f64) {
        if exp_to_next <= 0 {
            return (0.0, 0.0);
        }
        let harvest_infos = self.lands.harvest_infos();
        if harvest_infos.is_empty() {
            return (0.0, 0.0);
        }

        let now_sec = Utc::now().timestamp();
        let mut total_exp_per_min = 0.0f64;

        struct HarvestEvent {
            time_sec: i64,
            exp: i64,
        }
        let mut events: Vec<HarvestEvent> = Vec::new();

        for h in &harvest_infos {
            // Server buff percentages are scaled by 100: 1000 = 10%.
            let adjusted_exp = h.crop_exp as f64 * (10_000 + h.exp_bonus_pct) as f64 / 10_000.0;
            if adjusted_exp <= 0.0 {
                continue;
            }

            let seasons = if h.crop_id > 0 {
                self.catalog.plant_seasons(h.crop_id)
            } else {
                1
            };
            let mut season2_grow_sec = 0i64;
            if seasons >= 2 {
                if let Some(pd) = self.catalog.phase_data(h.crop_id) {
                    if pd.season2_grow_time > 0 {
                        let mut s2_base = pd.season2_grow_time;
                        let mut s2_fert = pd.season2_max_phase;
                        if h.time_reduce_pct > 0 {
                            s2_base = s2_base * (10_000 - h.time_reduce_pct) / 10_000;
                            s2_fert = s2_fert * (10_000 - h.time_reduce_pct) / 10_000;
                        }
                        season2_grow_sec = (s2_base - s2_fert).max(1);
                    }
                }
            }

            if h.cycle_sec > 0 {
                let total_cycle_exp = adjusted_exp * seasons as f64;
                let mut total_cycle_sec = h.cycle_sec as f64;
                if seasons >= 2 && season2_grow_sec > 0 {
                    total_cycle_sec += season2_grow_sec as f64;
                }
                total_exp_per_min += total_cycle_exp / (total_cycle_sec / 60.0);
            }

            let current_season = h.season.max(1);
            if h.is_mature {
                events.push(HarvestEvent {
                    time_sec: now_sec,
                    exp: adjusted_exp as i64,
                });
                if current_season <= 1 && seasons >= 2 && season2_grow_sec > 0 {
                    events.push(HarvestEvent {
                        time_sec: now_sec + season2_grow_sec,
                        exp: adjusted_exp as i64,
                    });
                }
            } else if h.is_growing && h.mature_at_sec > now_sec {
                events.push(HarvestEvent {
                    time_sec: h.mature_at_sec,
                    exp: adjusted_exp as i64,
                });
                if current_season <= 1 && seasons >= 2 && season2_grow_sec > 0 {
                    events.push(HarvestEvent {
                        time_sec: h.mature_at_sec + season2_grow_sec,
                        exp: adjusted_exp as i64,
                    });
                }
            }
        }

        if total_exp_per_min <= 0.0 {
            return (0.0, 0.0);
        }
        let exp_rate_per_hour = total_exp_per_min * 60.0;

        events.sort_by_key(|e| e.time_sec);

        let mut remaining = exp_to_next;
        let mut last_event_time = now_sec;
        for e in &events {
            remaining -= e.exp;
            if remaining <= 0 {
                let secs_until = (e.time_sec - now_sec).max(0);
                return (exp_rate_per_hour, secs_until as f64 / 3600.0);
            }
            last_event_time = e.time_sec;
        }

        // Scheduled harvests aren't enough: extend with the steady rate.
        let additional_secs = remaining as f64 / total_exp_per_min * 60.0;
        let total_secs = ((last_event_time - now_sec) as f64 + additional_secs).max(0.0);
        (exp_rate_per_hour, total_secs / 3600.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{GameCatalog, PlantConfig, SeedShopExport};
    use crate::landcache::LandHarvestInfo;

    fn test_instance(catalog: Arc<GameCatalog>) -> Arc<Instance> {
        let account = Account {
            id: 1,
            user_id: 1,
            name: "t".to_string(),
            platform: "qq".to_string(),
            code: "c".to_string(),
            auto_start: false,
            farm_interval: 10,
            friend_interval: 10,
            enable_steal: true,
            force_lowest: false,
            enable_harvest: true,
            enable_plant: true,
            enable_sell: true,
            enable_weed: true,
            enable_bug: true,
            enable_water: true,
            enable_remove_dead: true,
            enable_upgrade_land: true,
            enable_help_friend: true,
            enable_claim_task: true,
            plant_crop_id: 0,
            sell_crop_ids: String::new(),
            steal_crop_ids: String::new(),
            auto_use_fertilizer: false,
            auto_buy_fertilizer: false,
            fertilizer_target_count: 0,
            fertilizer_buy_daily_limit: 0,
            created_at: None,
            updated_at: None,
        };
        let cfg = BotConfig::from_account(&account, "ws://127.0.0.1:1", "1.0");
        let logger = Logger::new(1, None);
        Instance::new(account, cfg, logger, catalog, NetTiming::default())
    }

    #[test]
    fn estimation_counts_discrete_harvests_first() {
        let catalog = Arc::new(GameCatalog::from_tables(
            vec![PlantConfig {
                id: 7,
                name: "wheat".to_string(),
                seed_id: 70,
                exp: 100,
                grow_phases: "a:600;成熟:0;".to_string(),
                seasons: 1,
                ..Default::default()
            }],
            Vec::new(),
            Some(SeedShopExport::default()),
        ));
        let inst = test_instance(catalog);
        let now = Utc::now().timestamp();
        inst.lands.update(
            1,
            1,
            Vec::new(),
            vec![LandHarvestInfo {
                land_id: 1,
                crop_id: 7,
                crop_exp: 100,
                cycle_sec: 600,
                mature_at_sec: now + 300,
                is_growing: true,
                season: 1,
                ..Default::default()
            }],
        );

        // 80 exp needed, one 100-exp harvest lands in ~300 s.
        let (rate, hours) = inst.estimate_level_up(80);
        assert!(rate > 0.0);
        assert!(hours > 0.0 && hours < 0.1, "hours = {hours}");
    }

    #[test]
    fn estimation_extends_with_steady_rate() {
        let catalog = Arc::new(GameCatalog::empty());
        let inst = test_instance(catalog);
        let now = Utc::now().timestamp();
        inst.lands.update(
            1,
            1,
            Vec::new(),
            vec![LandHarvestInfo {
                land_id: 1,
                crop_id: 0,
                crop_exp: 10,
                cycle_sec: 3600,
                mature_at_sec: now + 3600,
                is_growing: true,
                season: 1,
                ..Default::default()
            }],
        );

        // One 10-exp harvest per hour; 100 exp needed takes ~10 hours.
        let (rate, hours) = inst.estimate_level_up(100);
        assert!((rate - 10.0).abs() < 0.5, "rate = {rate}");
        assert!(hours > 9.0 && hours < 11.0, "hours = {hours}");
    }

    #[test]
    fn estimation_handles_no_data() {
        let inst = test_instance(Arc::new(GameCatalog::empty()));
        assert_eq!(inst.estimate_level_up(0), (0.0, 0.0));
        assert_eq!(inst.estimate_level_up(100), (0.0, 0.0));
    }

    #[test]
    fn status_reports_stopped_account() {
        let inst = test_instance(Arc::new(GameCatalog::empty()));
        let status = inst.status();
        assert_eq!(status.account_id, 1);
        assert!(!status.running);
        assert_eq!(status.gid, 0);
        assert!(status.error.is_empty());
    }
}
