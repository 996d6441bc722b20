use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use farmproto::{friend, plant, visit};
use prost::Message as _;

use super::farm::current_phase;
use super::BotStats;
use crate::config::{self, BotConfig};
use crate::logger::Logger;
use crate::net::Net;

const INITIAL_DELAY: Duration = Duration::from_secs(5);
const VISIT_THROTTLE: Duration = Duration::from_millis(500);
const OP_THROTTLE: Duration = Duration::from_millis(100);

/// Friend-list visit reason code.
const VISIT_REASON_FRIEND: i32 = 2;

/// Walks the friend list, visits farms with stealable or neglected crops,
/// helps (weed, bug, water) and steals within the configured crop filter.
/// Pending friend requests are accepted once, on the first tick.
pub struct FriendWorker {
    net: Arc<Net>,
    logger: Arc<Logger>,
    cfg: Arc<BotConfig>,
    stats: Arc<BotStats>,
}

#[derive(Debug, Default, Clone, Copy)]
struct VisitActions {
    steal: usize,
    water: usize,
    weed: usize,
    bug: usize,
}

impl FriendWorker {
    pub fn new(net: Arc<Net>, logger: Arc<Logger>, cfg: Arc<BotConfig>, stats: Arc<BotStats>) -> Self {
        Self {
            net,
            logger,
            cfg,
            stats,
        }
    }

    pub async fn run_loop(self) {
        tokio::select! {
            _ = tokio::time::sleep(INITIAL_DELAY) => {}
            _ = self.net.done() => return,
        }

        self.accept_applications().await;

        loop {
            self.tick().await;
            tokio::select! {
                _ = tokio::time::sleep(self.cfg.friend_interval) => {}
                _ = self.net.done() => return,
            }
        }
    }

    async fn tick(&self) {
        let my_gid = self.net.user().snapshot().gid;
        if my_gid == 0 {
            return;
        }

        let reply: friend::GetAllReply = match self
            .net
            .call(friend::SERVICE, "GetAll", &friend::GetAllRequest {})
            .await
        {
            Ok(r) => r,
            Err(e) => {
                self.logger.warn("好友", format!("获取好友失败: {e}"));
                return;
            }
        };
        if reply.game_friends.is_empty() {
            return;
        }
        self.stats
            .friends_count
            .store(reply.game_friends.len() as i64, Ordering::Relaxed);

        let mut targets = Vec::new();
        for f in &reply.game_friends {
            if f.gid == my_gid {
                continue;
            }
            let name = if !f.remark.is_empty() {
                f.remark.clone()
            } else if !f.name.is_empty() {
                f.name.clone()
            } else {
                format!("GID:{}", f.gid)
            };

            let (has_steal, has_help) = match &f.plant {
                Some(p) => (
                    p.steal_plant_num > 0,
                    p.dry_num > 0 || p.weed_num > 0 || p.insect_num > 0,
                ),
                None => (false, false),
            };
            let can_steal = has_steal && self.cfg.enable_steal;
            let can_help = has_help && self.cfg.enable_help_friend;
            if can_steal || can_help {
                targets.push((f.gid, name));
            }
        }
        if targets.is_empty() {
            return;
        }

        let mut total = VisitActions::default();
        let target_count = targets.len();
        for (gid, name) in targets {
            let actions = self.visit_friend(gid, &name).await;
            total.steal += actions.steal;
            total.water += actions.water;
            total.weed += actions.weed;
            total.bug += actions.bug;
            tokio::time::sleep(VISIT_THROTTLE).await;
        }

        let mut summary = Vec::new();
        if total.steal > 0 {
            summary.push(format!("偷{}", total.steal));
            self.stats
                .total_steal
                .fetch_add(total.steal as i64, Ordering::Relaxed);
        }
        if total.weed > 0 {
            summary.push(format!("除草{}", total.weed));
        }
        if total.bug > 0 {
            summary.push(format!("除虫{}", total.bug));
        }
        if total.water > 0 {
            summary.push(format!("浇水{}", total.water));
        }
        let helped = total.weed + total.bug + total.water;
        if helped > 0 {
            self.stats
                .total_help
                .fetch_add(helped as i64, Ordering::Relaxed);
        }
        if !summary.is_empty() {
            self.logger.info(
                "好友",
                format!("巡查 {target_count} 人 → {}", summary.join("/")),
            );
        }
    }

    async fn visit_friend(&self, friend_gid: i64, name: &str) -> VisitActions {
        let mut actions = VisitActions::default();

        let enter: visit::EnterReply = match self
            .net
            .call(
                visit::SERVICE,
                "Enter",
                &visit::EnterRequest {
                    host_gid: friend_gid,
                    reason: VISIT_REASON_FRIEND,
                },
            )
            .await
        {
            Ok(r) => r,
            Err(_) => return actions,
        };

        if !enter.lands.is_empty() {
            let status = analyze_friend_lands(&enter.lands, Utc::now().timestamp());

            if self.cfg.enable_help_friend {
                for land_id in &status.need_weed {
                    let req = plant::WeedOutRequest {
                        land_ids: vec![*land_id],
                        host_gid: friend_gid,
                    };
                    if self
                        .net
                        .send_request(plant::SERVICE, "WeedOut", req.encode_to_vec())
                        .await
                        .is_ok()
                    {
                        actions.weed += 1;
                    }
                    tokio::time::sleep(OP_THROTTLE).await;
                }
                for land_id in &status.need_bug {
                    let req = plant::InsecticideRequest {
                        land_ids: vec![*land_id],
                        host_gid: friend_gid,
                    };
                    if self
                        .net
                        .send_request(plant::SERVICE, "Insecticide", req.encode_to_vec())
                        .await
                        .is_ok()
                    {
                        actions.bug += 1;
                    }
                    tokio::time::sleep(OP_THROTTLE).await;
                }
                for land_id in &status.need_water {
                    let req = plant::WaterLandRequest {
                        land_ids: vec![*land_id],
                        host_gid: friend_gid,
                    };
                    if self
                        .net
                        .send_request(plant::SERVICE, "WaterLand", req.encode_to_vec())
                        .await
                        .is_ok()
                    {
                        actions.water += 1;
                    }
                    tokio::time::sleep(OP_THROTTLE).await;
                }
            }

            if self.cfg.enable_steal && !status.stealable.is_empty() {
                let filter = config::parse_crop_ids(&self.cfg.steal_crop_ids);
                for sl in &status.stealable {
                    if !filter.is_empty() && !filter.contains(&sl.crop_id) {
                        continue;
                    }
                    let req = plant::HarvestRequest {
                        land_ids: vec![sl.land_id],
                        host_gid: friend_gid,
                        is_all: true,
                    };
                    if self
                        .net
                        .send_request(plant::SERVICE, "Harvest", req.encode_to_vec())
                        .await
                        .is_ok()
                    {
                        actions.steal += 1;
                    }
                    tokio::time::sleep(OP_THROTTLE).await;
                }
            }
        }

        // Always leave, even when the farm had nothing for us.
        let leave = visit::LeaveRequest {
            host_gid: friend_gid,
        };
        let _ = self
            .net
            .send_request(visit::SERVICE, "Leave", leave.encode_to_vec())
            .await;

        let mut parts = Vec::new();
        if actions.weed > 0 {
            parts.push(format!("草{}", actions.weed));
        }
        if actions.bug > 0 {
            parts.push(format!("虫{}", actions.bug));
        }
        if actions.water > 0 {
            parts.push(format!("水{}", actions.water));
        }
        if actions.steal > 0 {
            parts.push(format!("偷{}", actions.steal));
        }
        if !parts.is_empty() {
            self.logger
                .info("好友", format!("{name}: {}", parts.join("/")));
        }

        actions
    }

    async fn accept_applications(&self) {
        let reply: friend::GetApplicationsReply = match self
            .net
            .call(
                friend::SERVICE,
                "GetApplications",
                &friend::GetApplicationsRequest {},
            )
            .await
        {
            Ok(r) => r,
            Err(_) => return,
        };
        if reply.applications.is_empty() {
            return;
        }

        let gids: Vec<i64> = reply.applications.iter().map(|a| a.gid).collect();
        let names: Vec<String> = reply.applications.iter().map(|a| a.name.clone()).collect();

        let req = friend::AcceptFriendsRequest {
            friend_gids: gids.clone(),
        };
        if self
            .net
            .send_request(friend::SERVICE, "AcceptFriends", req.encode_to_vec())
            .await
            .is_ok()
        {
            self.logger.info(
                "申请",
                format!("已同意 {} 人: {}", gids.len(), names.join(", ")),
            );
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StealableLand {
    land_id: i64,
    crop_id: i64,
}

#[derive(Debug, Default)]
struct FriendLandStatus {
    stealable: Vec<StealableLand>,
    need_water: Vec<i64>,
    need_weed: Vec<i64>,
    need_bug: Vec<i64>,
}

fn analyze_friend_lands(lands: &[plant::LandInfo], now_sec: i64) -> FriendLandStatus {
    let mut status = FriendLandStatus::default();
    for land in lands {
        let Some(p) = &land.plant else {
            continue;
        };
        if p.phases.is_empty() {
            continue;
        }
        let Some(phase) = current_phase(&p.phases, now_sec) else {
            continue;
        };
        match plant::PlantPhase::try_from(phase.phase) {
            Ok(plant::PlantPhase::Mature) => {
                if p.stealable {
                    status.stealable.push(StealableLand {
                        land_id: land.id,
                        crop_id: p.id,
                    });
                }
            }
            Ok(plant::PlantPhase::Dead) => {}
            _ => {
                if p.dry_num > 0 {
                    status.need_water.push(land.id);
                }
                if !p.weed_owners.is_empty() {
                    status.need_weed.push(land.id);
                }
                if !p.insect_owners.is_empty() {
                    status.need_bug.push(land.id);
                }
            }
        }
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmproto::plant::{LandInfo, PlantInfo, PlantPhase, PlantPhaseInfo};

    fn land(id: i64, phase: PlantPhase, stealable: bool) -> LandInfo {
        LandInfo {
            id,
            unlocked: true,
            plant: Some(PlantInfo {
                id: 100 + id,
                stealable,
                phases: vec![PlantPhaseInfo {
                    phase: phase as i32,
                    begin_time: 10,
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn friend_lands_split_into_steal_and_help() {
        let mut thirsty = land(3, PlantPhase::Sprout, false);
        thirsty.plant.as_mut().unwrap().dry_num = 2;
        let mut weedy = land(4, PlantPhase::BigLeaf, false);
        weedy.plant.as_mut().unwrap().weed_owners = vec![9];

        let lands = vec![
            land(1, PlantPhase::Mature, true),
            land(2, PlantPhase::Mature, false), // mature but protected
            thirsty,
            weedy,
            land(5, PlantPhase::Dead, false),
        ];
        let status = analyze_friend_lands(&lands, 100);
        assert_eq!(status.stealable.len(), 1);
        assert_eq!(status.stealable[0].land_id, 1);
        assert_eq!(status.stealable[0].crop_id, 101);
        assert_eq!(status.need_water, vec![3]);
        assert_eq!(status.need_weed, vec![4]);
        assert!(status.need_bug.is_empty());
    }
}
