use std::sync::Arc;
use std::time::Duration;

use farmproto::{item, task};
use prost::Message as _;

use crate::config::BotConfig;
use crate::logger::Logger;
use crate::net::Net;

const INITIAL_DELAY: Duration = Duration::from_secs(4);
const PERIOD: Duration = Duration::from_secs(5 * 60);
const CLAIM_THROTTLE: Duration = Duration::from_millis(300);

// Reward counter ids the server reuses for gold and exp.
const REWARD_GOLD_ID: i64 = 1;
const REWARD_EXP_ID: i64 = 2;

/// Claims every unlocked, completed, not-yet-claimed task.
pub struct TaskWorker {
    net: Arc<Net>,
    logger: Arc<Logger>,
    cfg: Arc<BotConfig>,
}

impl TaskWorker {
    pub fn new(net: Arc<Net>, logger: Arc<Logger>, cfg: Arc<BotConfig>) -> Self {
        Self { net, logger, cfg }
    }

    pub async fn run_loop(self) {
        if !self.cfg.enable_claim_task {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(INITIAL_DELAY) => {}
            _ = self.net.done() => return,
        }
        loop {
            self.tick().await;
            tokio::select! {
                _ = tokio::time::sleep(PERIOD) => {}
                _ = self.net.done() => return,
            }
        }
    }

    async fn tick(&self) {
        let reply: task::TaskInfoReply = match self
            .net
            .call(task::SERVICE, "TaskInfo", &task::TaskInfoRequest {})
            .await
        {
            Ok(r) => r,
            Err(_) => return,
        };
        let Some(info) = reply.task_info else {
            return;
        };

        let all_tasks = info
            .growth_tasks
            .iter()
            .chain(info.daily_tasks.iter())
            .chain(info.tasks.iter());
        let claimable: Vec<&task::Task> = all_tasks.filter(|t| is_claimable(t)).collect();
        if claimable.is_empty() {
            return;
        }

        self.logger
            .info("任务", format!("发现 {} 个可领取任务", claimable.len()));

        for t in claimable {
            let do_shared = t.share_multiple > 1;
            let req = task::ClaimTaskRewardRequest {
                id: t.id,
                do_shared,
            };
            let reply: task::ClaimTaskRewardReply =
                match self.net.call(task::SERVICE, "ClaimTaskReward", &req).await {
                    Ok(r) => r,
                    Err(e) => {
                        self.logger
                            .warn("任务", format!("领取失败 #{}: {e}", t.id));
                        continue;
                    }
                };

            let multi = if do_shared {
                format!(" ({}倍)", t.share_multiple)
            } else {
                String::new()
            };
            self.logger.info(
                "任务",
                format!("领取: {}{multi} → {}", t.desc, format_rewards(&reply.items)),
            );
            tokio::time::sleep(CLAIM_THROTTLE).await;
        }
    }
}

fn is_claimable(t: &task::Task) -> bool {
    t.is_unlocked && !t.is_claimed && t.total_progress > 0 && t.progress >= t.total_progress
}

fn format_rewards(items: &[item::Item]) -> String {
    if items.is_empty() {
        return "无".to_string();
    }
    let parts: Vec<String> = items
        .iter()
        .map(|item| match item.id {
            REWARD_GOLD_ID => format!("金币{}", item.count),
            REWARD_EXP_ID => format!("经验{}", item.count),
            _ => format!("物品({})x{}", item.id, item.count),
        })
        .collect();
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(unlocked: bool, claimed: bool, progress: i64, total: i64) -> task::Task {
        task::Task {
            id: 1,
            is_unlocked: unlocked,
            is_claimed: claimed,
            progress,
            total_progress: total,
            ..Default::default()
        }
    }

    #[test]
    fn claimable_needs_unlocked_complete_unclaimed() {
        assert!(is_claimable(&t(true, false, 5, 5)));
        assert!(is_claimable(&t(true, false, 7, 5)));
        assert!(!is_claimable(&t(false, false, 5, 5)));
        assert!(!is_claimable(&t(true, true, 5, 5)));
        assert!(!is_claimable(&t(true, false, 4, 5)));
        // A zero total means the server hasn't materialized the task yet.
        assert!(!is_claimable(&t(true, false, 0, 0)));
    }

    #[test]
    fn rewards_format_gold_exp_and_items() {
        let items = vec![
            item::Item {
                id: 1,
                count: 500,
                uid: 0,
            },
            item::Item {
                id: 2,
                count: 80,
                uid: 0,
            },
            item::Item {
                id: 80001,
                count: 3,
                uid: 0,
            },
        ];
        assert_eq!(format_rewards(&items), "金币500/经验80/物品(80001)x3");
        assert_eq!(format_rewards(&[]), "无");
    }
}
