use std::collections::HashSet;
use std::time::Duration;

use crate::model::Account;

/// Runtime configuration for one bot instance, frozen at session start.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub platform: String,
    pub code: String,
    pub server_url: String,
    pub client_version: String,

    pub farm_interval: Duration,
    pub friend_interval: Duration,
    pub enable_steal: bool,
    pub force_lowest: bool,

    pub enable_harvest: bool,
    pub enable_plant: bool,
    pub enable_sell: bool,
    pub enable_weed: bool,
    pub enable_bug: bool,
    pub enable_water: bool,
    pub enable_remove_dead: bool,
    pub enable_upgrade_land: bool,
    pub enable_help_friend: bool,
    pub enable_claim_task: bool,

    pub plant_crop_id: i64,
    pub sell_crop_ids: String,
    pub steal_crop_ids: String,

    pub auto_use_fertilizer: bool,
    pub auto_buy_fertilizer: bool,
    pub fertilizer_target_count: i64,
    pub fertilizer_buy_daily_limit: i64,
}

impl BotConfig {
    /// Build the per-session config from an account row plus the daemon-wide
    /// gateway settings. Intervals below one second fall back to 10 s.
    pub fn from_account(account: &Account, server_url: &str, client_version: &str) -> Self {
        Self {
            platform: account.platform.clone(),
            code: account.code.clone(),
            server_url: server_url.to_string(),
            client_version: client_version.to_string(),
            farm_interval: clamp_interval(account.farm_interval),
            friend_interval: clamp_interval(account.friend_interval),
            enable_steal: account.enable_steal,
            force_lowest: account.force_lowest,
            enable_harvest: account.enable_harvest,
            enable_plant: account.enable_plant,
            enable_sell: account.enable_sell,
            enable_weed: account.enable_weed,
            enable_bug: account.enable_bug,
            enable_water: account.enable_water,
            enable_remove_dead: account.enable_remove_dead,
            enable_upgrade_land: account.enable_upgrade_land,
            enable_help_friend: account.enable_help_friend,
            enable_claim_task: account.enable_claim_task,
            plant_crop_id: account.plant_crop_id,
            sell_crop_ids: account.sell_crop_ids.clone(),
            steal_crop_ids: account.steal_crop_ids.clone(),
            auto_use_fertilizer: account.auto_use_fertilizer,
            auto_buy_fertilizer: account.auto_buy_fertilizer,
            fertilizer_target_count: account.fertilizer_target_count,
            fertilizer_buy_daily_limit: account.fertilizer_buy_daily_limit,
        }
    }
}

fn clamp_interval(seconds: i64) -> Duration {
    if seconds < 1 {
        Duration::from_secs(10)
    } else {
        Duration::from_secs(seconds as u64)
    }
}

/// Parse a comma-separated crop id list. An empty result means "no filter",
/// i.e. every crop matches.
pub fn parse_crop_ids(s: &str) -> HashSet<i64> {
    s.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_below_one_second_are_clamped() {
        assert_eq!(clamp_interval(0), Duration::from_secs(10));
        assert_eq!(clamp_interval(-5), Duration::from_secs(10));
        assert_eq!(clamp_interval(3), Duration::from_secs(3));
    }

    #[test]
    fn crop_filter_parses_loose_input() {
        let ids = parse_crop_ids(" 101, 102 ,,abc, -3, 104");
        assert_eq!(ids, HashSet::from([101, 102, 104]));
        assert!(parse_crop_ids("").is_empty());
        assert!(parse_crop_ids(" , ,").is_empty());
    }
}
