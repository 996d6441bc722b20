use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// A managed game account. Created and edited externally; the engine reads
/// it once at instance start and treats it as immutable for the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub name: String,
    /// "qq" or "wx".
    #[serde(default)]
    pub platform: String,
    /// Persisted login code; empty until the account has authenticated once.
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub auto_start: bool,

    /// Farm check period, seconds.
    #[serde(default)]
    pub farm_interval: i64,
    /// Friend check period, seconds.
    #[serde(default)]
    pub friend_interval: i64,
    #[serde(default)]
    pub enable_steal: bool,
    /// Always plant the lowest-level seed instead of the efficiency pick.
    #[serde(default)]
    pub force_lowest: bool,

    #[serde(default = "default_true")]
    pub enable_harvest: bool,
    #[serde(default = "default_true")]
    pub enable_plant: bool,
    #[serde(default = "default_true")]
    pub enable_sell: bool,
    #[serde(default = "default_true")]
    pub enable_weed: bool,
    #[serde(default = "default_true")]
    pub enable_bug: bool,
    #[serde(default = "default_true")]
    pub enable_water: bool,
    #[serde(default = "default_true")]
    pub enable_remove_dead: bool,
    #[serde(default = "default_true")]
    pub enable_upgrade_land: bool,
    #[serde(default = "default_true")]
    pub enable_help_friend: bool,
    #[serde(default = "default_true")]
    pub enable_claim_task: bool,

    /// Specific crop to plant; 0 = auto select.
    #[serde(default)]
    pub plant_crop_id: i64,
    /// Comma-separated crop ids to sell; empty = all.
    #[serde(default)]
    pub sell_crop_ids: String,
    /// Comma-separated crop ids to steal; empty = all.
    #[serde(default)]
    pub steal_crop_ids: String,

    #[serde(default)]
    pub auto_use_fertilizer: bool,
    #[serde(default)]
    pub auto_buy_fertilizer: bool,
    #[serde(default)]
    pub fertilizer_target_count: i64,
    #[serde(default)]
    pub fertilizer_buy_daily_limit: i64,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Runtime status snapshot of one bot instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotStatus {
    pub account_id: i64,
    pub running: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub gid: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub level: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub exp: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub gold: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,

    #[serde(default)]
    pub exp_rate_per_hour: f64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub next_level_exp: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub exp_to_next_level: i64,
    #[serde(default)]
    pub hours_to_next_level: f64,

    #[serde(default)]
    pub total_steal: i64,
    #[serde(default)]
    pub total_help: i64,
    #[serde(default)]
    pub friends_count: i64,
    #[serde(default)]
    pub total_lands: i64,
    #[serde(default)]
    pub unlocked_lands: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lands: Vec<LandStatus>,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// Display status of a single land plot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LandStatus {
    pub id: i64,
    pub level: i64,
    pub max_level: i64,
    pub unlocked: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub crop_name: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub crop_id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phase: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One structured bot log line, fanned out on emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub account_id: i64,
    pub tag: String,
    pub message: String,
    pub level: LogLevel,
    pub created_at: DateTime<Utc>,
}
