use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use farmproto::plant::{self, LandInfo, PlantPhase, PlantPhaseInfo};
use farmproto::shop::{self, GoodsInfo};
use prost::Message as _;

use crate::catalog::GameCatalog;
use crate::config::BotConfig;
use crate::landcache::{LandCache, LandHarvestInfo};
use crate::logger::Logger;
use crate::model::LandStatus;
use crate::net::{Net, RpcError};

const INITIAL_DELAY: Duration = Duration::from_secs(2);
const PLANT_THROTTLE: Duration = Duration::from_millis(50);
const UNLOCK_THROTTLE: Duration = Duration::from_millis(200);

const SEED_SHOP_ID: i64 = 2;
const NORMAL_FERTILIZER_ID: i64 = 1011;
/// Below this level the no-recommendation fallback plants the cheapest
/// unlock; at or above it, the highest.
const LEVEL_FALLBACK_PIVOT: i64 = 28;

/// Polls the farm, classifies every plot and issues the batched upkeep,
/// harvest, plant and fertilize actions.
pub struct FarmWorker {
    net: Arc<Net>,
    logger: Arc<Logger>,
    cfg: Arc<BotConfig>,
    catalog: Arc<GameCatalog>,
    lands: Arc<LandCache>,
}

impl FarmWorker {
    pub fn new(
        net: Arc<Net>,
        logger: Arc<Logger>,
        cfg: Arc<BotConfig>,
        catalog: Arc<GameCatalog>,
        lands: Arc<LandCache>,
    ) -> Self {
        Self {
            net,
            logger,
            cfg,
            catalog,
            lands,
        }
    }

    pub async fn run_loop(self) {
        tokio::select! {
            _ = tokio::time::sleep(INITIAL_DELAY) => {}
            _ = self.net.done() => return,
        }
        loop {
            self.tick().await;
            tokio::select! {
                _ = tokio::time::sleep(self.cfg.farm_interval) => {}
                _ = self.net.done() => return,
            }
        }
    }

    async fn tick(&self) {
        let mut reply = match self.net.all_lands().await {
            Ok(r) => r,
            Err(e) => {
                self.logger.warn("巡田", format!("检查失败: {e}"));
                return;
            }
        };
        if reply.lands.is_empty() {
            return;
        }

        // Unlock and upgrade before analyzing; both change plot layout.
        let (unlocked_new, upgraded_new) = if self.cfg.enable_upgrade_land {
            self.auto_unlock_and_upgrade(&reply.lands).await
        } else {
            (0, 0)
        };
        if unlocked_new > 0 || upgraded_new > 0 {
            reply = match self.net.all_lands().await {
                Ok(r) => r,
                Err(e) => {
                    self.logger.warn("巡田", format!("重新获取土地失败: {e}"));
                    return;
                }
            };
        }
        let lands = &reply.lands;

        let now_sec = Utc::now().timestamp();
        let buckets = analyze_lands(lands, now_sec);
        let unlocked_count = lands.iter().filter(|l| l.unlocked).count() as i64;

        self.update_land_cache(lands, now_sec);

        let mut parts = Vec::new();
        if !buckets.harvestable.is_empty() {
            parts.push(format!("收:{}", buckets.harvestable.len()));
        }
        if !buckets.need_weed.is_empty() {
            parts.push(format!("草:{}", buckets.need_weed.len()));
        }
        if !buckets.need_bug.is_empty() {
            parts.push(format!("虫:{}", buckets.need_bug.len()));
        }
        if !buckets.need_water.is_empty() {
            parts.push(format!("水:{}", buckets.need_water.len()));
        }
        if !buckets.dead.is_empty() {
            parts.push(format!("枯:{}", buckets.dead.len()));
        }
        if !buckets.empty.is_empty() {
            parts.push(format!("空:{}", buckets.empty.len()));
        }
        parts.push(format!("长:{}", buckets.growing.len()));

        let mut has_work = !buckets.harvestable.is_empty()
            || !buckets.need_weed.is_empty()
            || !buckets.need_bug.is_empty()
            || !buckets.need_water.is_empty()
            || !buckets.dead.is_empty()
            || !buckets.empty.is_empty();

        let mut actions = Vec::new();
        if unlocked_new > 0 {
            actions.push(format!("解锁{unlocked_new}"));
        }
        if upgraded_new > 0 {
            actions.push(format!("升级{upgraded_new}"));
        }
        if unlocked_new > 0 || upgraded_new > 0 {
            has_work = true;
        }

        // Upkeep first so crops keep growing: weed, bug, water, in that order.
        if self.cfg.enable_weed && !buckets.need_weed.is_empty() {
            if self
                .batch_op("WeedOut", &buckets.need_weed)
                .await
                .is_ok()
            {
                actions.push(format!("除草{}", buckets.need_weed.len()));
            }
        }
        if self.cfg.enable_bug && !buckets.need_bug.is_empty() {
            if self
                .batch_op("Insecticide", &buckets.need_bug)
                .await
                .is_ok()
            {
                actions.push(format!("除虫{}", buckets.need_bug.len()));
            }
        }
        if self.cfg.enable_water && !buckets.need_water.is_empty() {
            if self
                .batch_op("WaterLand", &buckets.need_water)
                .await
                .is_ok()
            {
                actions.push(format!("浇水{}", buckets.need_water.len()));
            }
        }

        // Harvested plots join the replant set.
        let mut harvested: Vec<i64> = Vec::new();
        if self.cfg.enable_harvest && !buckets.harvestable.is_empty() {
            if self.harvest(&buckets.harvestable).await.is_ok() {
                actions.push(format!("收获{}", buckets.harvestable.len()));
                harvested = buckets.harvestable.clone();
            }
        }

        if self.cfg.enable_plant {
            let mut dead = Vec::new();
            if self.cfg.enable_remove_dead {
                dead = buckets.dead.clone();
            }
            dead.extend_from_slice(&harvested);
            if !dead.is_empty() || !buckets.empty.is_empty() {
                let planted_sets = dead.len() + buckets.empty.len();
                self.auto_plant(&dead, &buckets.empty, unlocked_count).await;
                actions.push(format!("种植{planted_sets}"));
            }
        }

        if has_work {
            let action_str = if actions.is_empty() {
                String::new()
            } else {
                format!(" → {}", actions.join("/"))
            };
            self.logger
                .info("农场", format!("[{}]{}", parts.join(" "), action_str));
        }
    }

    async fn auto_unlock_and_upgrade(&self, lands: &[LandInfo]) -> (i64, i64) {
        let snap = self.net.user().snapshot();
        let level = snap.level;
        let mut gold = snap.gold;
        let mut unlocked = 0;
        let mut upgraded = 0;

        for land in lands {
            if !land.unlocked && land.could_unlock {
                if let Some(cond) = &land.unlock_condition {
                    if level >= cond.need_level && gold >= cond.need_gold {
                        match self.net.unlock_land(land.id).await {
                            Err(e) => self
                                .logger
                                .warn("解锁", format!("土地#{} 失败: {e}", land.id)),
                            Ok(_) => {
                                self.logger.info(
                                    "解锁",
                                    format!("土地#{} 成功 (花费{}金币)", land.id, cond.need_gold),
                                );
                                unlocked += 1;
                                gold -= cond.need_gold;
                            }
                        }
                        tokio::time::sleep(UNLOCK_THROTTLE).await;
                    }
                }
            }

            if land.unlocked && land.could_upgrade {
                if let Some(cond) = &land.upgrade_condition {
                    if level >= cond.need_level && gold >= cond.need_gold {
                        match self.net.upgrade_land(land.id).await {
                            Err(e) => self.logger.warn(
                                "升级",
                                format!(
                                    "土地#{} Lv{}→Lv{} 失败: {e}",
                                    land.id,
                                    land.level,
                                    land.level + 1
                                ),
                            ),
                            Ok(_) => {
                                self.logger.info(
                                    "升级",
                                    format!(
                                        "土地#{} Lv{}→Lv{} (花费{}金币)",
                                        land.id,
                                        land.level,
                                        land.level + 1,
                                        cond.need_gold
                                    ),
                                );
                                upgraded += 1;
                                gold -= cond.need_gold;
                            }
                        }
                        tokio::time::sleep(UNLOCK_THROTTLE).await;
                    }
                }
            }
        }
        (unlocked, upgraded)
    }

    /// One batched upkeep RPC; weed/bug/water all share the land-ids +
    /// host-gid request shape.
    async fn batch_op(&self, method: &str, land_ids: &[i64]) -> Result<(), RpcError> {
        let host_gid = self.net.user().snapshot().gid;
        let body = match method {
            "WeedOut" => plant::WeedOutRequest {
                land_ids: land_ids.to_vec(),
                host_gid,
            }
            .encode_to_vec(),
            "Insecticide" => plant::InsecticideRequest {
                land_ids: land_ids.to_vec(),
                host_gid,
            }
            .encode_to_vec(),
            _ => plant::WaterLandRequest {
                land_ids: land_ids.to_vec(),
                host_gid,
            }
            .encode_to_vec(),
        };
        self.net.send_request(plant::SERVICE, method, body).await?;
        Ok(())
    }

    async fn harvest(&self, land_ids: &[i64]) -> Result<(), RpcError> {
        let gid = self.net.user().snapshot().gid;
        let req = plant::HarvestRequest {
            land_ids: land_ids.to_vec(),
            host_gid: gid,
            is_all: true,
        };
        self.net
            .send_request(plant::SERVICE, "Harvest", req.encode_to_vec())
            .await?;
        Ok(())
    }

    async fn remove_plant(&self, land_ids: &[i64]) -> Result<(), RpcError> {
        let req = plant::RemovePlantRequest {
            land_ids: land_ids.to_vec(),
        };
        self.net
            .send_request(plant::SERVICE, "RemovePlant", req.encode_to_vec())
            .await?;
        Ok(())
    }

    async fn fertilize(&self, land_ids: &[i64]) -> usize {
        let mut success = 0;
        for id in land_ids {
            let req = plant::FertilizeRequest {
                land_ids: vec![*id],
                fertilizer_id: NORMAL_FERTILIZER_ID,
            };
            if self
                .net
                .send_request(plant::SERVICE, "Fertilize", req.encode_to_vec())
                .await
                .is_err()
            {
                break;
            }
            success += 1;
            tokio::time::sleep(PLANT_THROTTLE).await;
        }
        success
    }

    async fn auto_plant(&self, dead_lands: &[i64], empty_lands: &[i64], unlocked_count: i64) {
        let mut to_plant: Vec<i64> = empty_lands.to_vec();

        if !dead_lands.is_empty() {
            if self.remove_plant(dead_lands).await.is_ok() {
                self.logger
                    .info("铲除", format!("已铲除 {} 块", dead_lands.len()));
            }
            to_plant.extend_from_slice(dead_lands);
        }
        if to_plant.is_empty() {
            return;
        }

        let best = match self.find_best_seed(unlocked_count).await {
            Ok(Some(goods)) => goods,
            _ => return,
        };
        let seed_name = self.catalog.plant_name_by_seed(best.item_id);
        self.logger
            .info("商店", format!("最佳种子: {seed_name} 价格={}金币", best.price));

        // Clamp to what the gold balance affords.
        let gold = self.net.user().snapshot().gold;
        let need = to_plant.len() as i64;
        if best.price * need > gold {
            let can_buy = if best.price > 0 { gold / best.price } else { 0 };
            if can_buy <= 0 {
                self.logger.warn("商店", "金币不足");
                return;
            }
            to_plant.truncate(can_buy as usize);
        }

        let buy_req = shop::BuyGoodsRequest {
            goods_id: best.id,
            num: to_plant.len() as i64,
            price: best.price,
        };
        let buy_reply: shop::BuyGoodsReply =
            match self.net.call(shop::SERVICE, "BuyGoods", &buy_req).await {
                Ok(r) => r,
                Err(e) => {
                    self.logger.warn("购买", format!("{e}"));
                    return;
                }
            };

        let mut actual_seed_id = best.item_id;
        if let Some(first) = buy_reply.get_items.first() {
            if first.id > 0 {
                actual_seed_id = first.id;
            }
        }
        self.logger.info(
            "购买",
            format!(
                "已购买 {}种子 x{}",
                self.catalog.plant_name_by_seed(actual_seed_id),
                to_plant.len()
            ),
        );

        let mut planted = 0usize;
        for land_id in &to_plant {
            let req = plant::PlantRequest {
                items: vec![plant::PlantItem {
                    seed_id: actual_seed_id,
                    land_ids: vec![*land_id],
                }],
            };
            if self
                .net
                .send_request(plant::SERVICE, "Plant", req.encode_to_vec())
                .await
                .is_ok()
            {
                planted += 1;
            }
            tokio::time::sleep(PLANT_THROTTLE).await;
        }
        self.logger.info("种植", format!("已种植 {planted} 块"));

        if planted > 0 {
            let fertilized = self.fertilize(&to_plant[..planted]).await;
            if fertilized > 0 {
                self.logger
                    .info("施肥", format!("已为 {fertilized}/{planted} 块地施肥"));
            }
        }
    }

    async fn find_best_seed(
        &self,
        lands_count: i64,
    ) -> Result<Option<GoodsInfo>, RpcError> {
        let req = shop::ShopInfoRequest {
            shop_id: SEED_SHOP_ID,
        };
        let reply: shop::ShopInfoReply = self.net.call(shop::SERVICE, "ShopInfo", &req).await?;
        if reply.goods_list.is_empty() {
            self.logger.warn("商店", "种子商店无商品");
            return Ok(None);
        }

        let level = self.net.user().snapshot().level;
        let available = available_candidates(&reply.goods_list, level);
        if available.is_empty() {
            self.logger.warn("商店", "没有可购买的种子");
            return Ok(None);
        }

        // A pinned crop takes priority over every policy when it is buyable.
        if self.cfg.plant_crop_id > 0 {
            let pinned_seed = self.catalog.seed_id_of_plant(self.cfg.plant_crop_id);
            if pinned_seed > 0 {
                if let Some(c) = available.iter().find(|c| c.goods.item_id == pinned_seed) {
                    return Ok(Some(c.goods.clone()));
                }
            }
        }

        if self.cfg.force_lowest {
            let best = available
                .iter()
                .min_by_key(|c| (c.required_level, c.goods.price))
                .unwrap();
            return Ok(Some(best.goods.clone()));
        }

        for rec in self
            .catalog
            .planting_recommendation(level, lands_count, 50)
        {
            if let Some(c) = available.iter().find(|c| c.goods.item_id == rec.seed_id) {
                return Ok(Some(c.goods.clone()));
            }
        }

        // No recommendation matched: level-based fallback.
        let best = if level <= LEVEL_FALLBACK_PIVOT {
            available.iter().min_by_key(|c| c.required_level).unwrap()
        } else {
            available.iter().max_by_key(|c| c.required_level).unwrap()
        };
        Ok(Some(best.goods.clone()))
    }

    fn update_land_cache(&self, lands: &[LandInfo], now_sec: i64) {
        let total = lands.len() as i64;
        let mut unlocked = 0i64;
        let mut statuses = Vec::with_capacity(lands.len());
        let mut harvest_infos = Vec::new();

        for land in lands {
            let mut status = LandStatus {
                id: land.id,
                level: land.level,
                max_level: land.max_level,
                unlocked: land.unlocked,
                ..Default::default()
            };
            if land.unlocked {
                unlocked += 1;
            }
            if let Some(p) = &land.plant {
                if !p.phases.is_empty() {
                    status.crop_id = p.id;
                    status.crop_name = self.catalog.plant_name(p.id);
                    let current = current_phase(&p.phases, now_sec);
                    if let Some(cur) = current {
                        status.phase = phase_name(cur.phase);
                    }

                    let mature_at = mature_time_sec(&p.phases);
                    let planted_at = plant_start_time_sec(&p.phases);
                    if mature_at > 0 && planted_at > 0 && mature_at > planted_at {
                        let mut info = LandHarvestInfo {
                            land_id: land.id,
                            crop_id: p.id,
                            season: p.season,
                            crop_exp: self.catalog.plant_exp(p.id),
                            cycle_sec: mature_at - planted_at,
                            mature_at_sec: mature_at,
                            ..Default::default()
                        };
                        if let Some(buff) = &land.buff {
                            info.exp_bonus_pct = buff.plant_exp_bonus;
                            info.time_reduce_pct = buff.planting_time_reduction;
                            info.yield_bonus_pct = buff.plant_yield_bonus;
                        }
                        if let Some(cur) = current {
                            match PlantPhase::try_from(cur.phase) {
                                Ok(PlantPhase::Mature) => info.is_mature = true,
                                Ok(PlantPhase::Dead) => {}
                                _ => info.is_growing = true,
                            }
                        }
                        if info.crop_exp > 0 && (info.is_mature || info.is_growing) {
                            harvest_infos.push(info);
                        }
                    }
                }
            }
            statuses.push(status);
        }
        self.lands.update(total, unlocked, statuses, harvest_infos);
    }
}

struct SeedCandidate {
    goods: GoodsInfo,
    required_level: i64,
}

/// Shop goods the account can actually buy: unlocked, level gate met,
/// purchase limit not exhausted.
fn available_candidates(goods_list: &[GoodsInfo], level: i64) -> Vec<SeedCandidate> {
    let mut out = Vec::new();
    for goods in goods_list {
        if !goods.unlocked {
            continue;
        }
        let mut required_level = 0;
        let mut meets = true;
        for cond in &goods.conds {
            if cond.cond_type == shop::COND_MIN_LEVEL {
                required_level = cond.param;
                if level < required_level {
                    meets = false;
                    break;
                }
            }
        }
        if !meets {
            continue;
        }
        if goods.limit_count > 0 && goods.bought_num >= goods.limit_count {
            continue;
        }
        out.push(SeedCandidate {
            goods: goods.clone(),
            required_level,
        });
    }
    out
}

#[derive(Debug, Default)]
pub(crate) struct LandBuckets {
    pub harvestable: Vec<i64>,
    pub need_water: Vec<i64>,
    pub need_weed: Vec<i64>,
    pub need_bug: Vec<i64>,
    pub growing: Vec<i64>,
    pub empty: Vec<i64>,
    pub dead: Vec<i64>,
}

pub(crate) fn analyze_lands(lands: &[LandInfo], now_sec: i64) -> LandBuckets {
    let mut buckets = LandBuckets::default();
    for land in lands {
        if !land.unlocked {
            continue;
        }
        let Some(p) = &land.plant else {
            buckets.empty.push(land.id);
            continue;
        };
        if p.phases.is_empty() {
            buckets.empty.push(land.id);
            continue;
        }
        let Some(phase) = current_phase(&p.phases, now_sec) else {
            buckets.empty.push(land.id);
            continue;
        };
        match PlantPhase::try_from(phase.phase) {
            Ok(PlantPhase::Dead) => buckets.dead.push(land.id),
            Ok(PlantPhase::Mature) => buckets.harvestable.push(land.id),
            _ => {
                if p.dry_num > 0 || (phase.dry_time > 0 && to_time_sec(phase.dry_time) <= now_sec) {
                    buckets.need_water.push(land.id);
                }
                if !p.weed_owners.is_empty()
                    || (phase.weeds_time > 0 && to_time_sec(phase.weeds_time) <= now_sec)
                {
                    buckets.need_weed.push(land.id);
                }
                if !p.insect_owners.is_empty()
                    || (phase.insect_time > 0 && to_time_sec(phase.insect_time) <= now_sec)
                {
                    buckets.need_bug.push(land.id);
                }
                buckets.growing.push(land.id);
            }
        }
    }
    buckets
}

/// The latest phase that has already begun, or the first one before the
/// crop's clock starts.
pub(crate) fn current_phase(phases: &[PlantPhaseInfo], now_sec: i64) -> Option<&PlantPhaseInfo> {
    if phases.is_empty() {
        return None;
    }
    for p in phases.iter().rev() {
        let begin = to_time_sec(p.begin_time);
        if begin > 0 && begin <= now_sec {
            return Some(p);
        }
    }
    Some(&phases[0])
}

pub(crate) fn mature_time_sec(phases: &[PlantPhaseInfo]) -> i64 {
    phases
        .iter()
        .find(|p| p.phase == PlantPhase::Mature as i32)
        .map(|p| to_time_sec(p.begin_time))
        .unwrap_or(0)
}

pub(crate) fn plant_start_time_sec(phases: &[PlantPhaseInfo]) -> i64 {
    phases.first().map(|p| to_time_sec(p.begin_time)).unwrap_or(0)
}

/// Gateway timestamps are usually unix seconds but some fields arrive in
/// milliseconds; anything past ~year 33658 is treated as millis.
pub(crate) fn to_time_sec(val: i64) -> i64 {
    if val <= 0 {
        0
    } else if val > 1_000_000_000_000 {
        val / 1000
    } else {
        val
    }
}

fn phase_name(phase: i32) -> String {
    match PlantPhase::try_from(phase) {
        Ok(PlantPhase::Unknown) => "未知".to_string(),
        Ok(PlantPhase::Seed) => "种子".to_string(),
        Ok(PlantPhase::Sprout) => "发芽".to_string(),
        Ok(PlantPhase::SmallLeaf) => "小叶".to_string(),
        Ok(PlantPhase::BigLeaf) => "大叶".to_string(),
        Ok(PlantPhase::Flower) => "开花".to_string(),
        Ok(PlantPhase::Mature) => "成熟".to_string(),
        Ok(PlantPhase::Dead) => "枯萎".to_string(),
        Err(_) => format!("阶段{phase}"),
    }
}
