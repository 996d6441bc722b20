use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Local;
use farmproto::{item, mall};

use crate::config::BotConfig;
use crate::logger::Logger;
use crate::net::Net;

const INITIAL_DELAY: Duration = Duration::from_secs(15);
const PERIOD: Duration = Duration::from_secs(60 * 60);
const THROTTLE: Duration = Duration::from_millis(300);
const BUY_COOLDOWN: Duration = Duration::from_secs(10 * 60);

const COUPON_ITEM_ID: i64 = 1002;
const FERTILIZER_PACK_ID_1: i64 = 100003;
const FERTILIZER_PACK_ID_2: i64 = 100004;
const NORMAL_CONTAINER_ID: i64 = 1011;
const ORGANIC_CONTAINER_ID: i64 = 1012;
/// Containers refuse input past this many stored hours.
const CONTAINER_LIMIT_HOURS: i64 = 990;
const MALL_FERTILIZER_GOODS_ID: i64 = 1003;
const MALL_SLOT_FERTILIZER: i32 = 1;

// (item id, hours per item), largest denominations first so surplus fills
// containers with the fewest uses.
const NORMAL_FERTILIZERS: [(i64, i64); 4] = [(80004, 12), (80003, 8), (80002, 4), (80001, 1)];
const ORGANIC_FERTILIZERS: [(i64, i64); 4] = [(80014, 12), (80013, 8), (80012, 4), (80011, 1)];

#[derive(Debug, Default)]
struct DailyState {
    date: String,
    buy_count: i64,
    open_count: i64,
    last_buy: Option<Instant>,
}

/// Buys fertilizer packs from the mall with coupons (daily limit plus
/// cooldown), opens them, and feeds surplus fertilizer items into the two
/// containers without breaching the hour cap.
pub struct FertilizerWorker {
    net: Arc<Net>,
    logger: Arc<Logger>,
    cfg: Arc<BotConfig>,
    daily: Mutex<DailyState>,
}

impl FertilizerWorker {
    pub fn new(net: Arc<Net>, logger: Arc<Logger>, cfg: Arc<BotConfig>) -> Self {
        Self {
            net,
            logger,
            cfg,
            daily: Mutex::new(DailyState::default()),
        }
    }

    pub async fn run_loop(self) {
        if !self.cfg.auto_use_fertilizer && !self.cfg.auto_buy_fertilizer {
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

    /// One pass: buy, open, then use surplus. The bag is re-fetched after
    /// each mutating step since every step changes the counts.
    async fn tick(&self) {
        self.reset_daily_counters();

        let Some(mut items) = self.bag_items().await else {
            return;
        };

        if self.cfg.auto_buy_fertilizer {
            self.buy_packs(&items).await;
            tokio::time::sleep(THROTTLE).await;
            match self.bag_items().await {
                Some(fresh) => items = fresh,
                None => return,
            }
        }

        if self.cfg.auto_use_fertilizer {
            self.open_packs(&items).await;
            tokio::time::sleep(THROTTLE).await;
            match self.bag_items().await {
                Some(fresh) => items = fresh,
                None => return,
            }
            self.use_surplus(&items).await;
        }
    }

    async fn bag_items(&self) -> Option<Vec<item::Item>> {
        let reply: item::BagReply = match self
            .net
            .call(item::SERVICE, "Bag", &item::BagRequest {})
            .await
        {
            Ok(r) => r,
            Err(e) => {
                self.logger.warn("化肥", format!("获取背包失败: {e}"));
                return None;
            }
        };
        Some(reply.item_bag.map(|bag| bag.items).unwrap_or_default())
    }

    fn reset_daily_counters(&self) {
        let today = Local::now().format("%Y-%m-%d").to_string();
        let mut daily = self.daily.lock().unwrap();
        if daily.date != today {
            daily.date = today;
            daily.buy_count = 0;
            daily.open_count = 0;
        }
    }

    async fn buy_packs(&self, items: &[item::Item]) {
        let (already_bought, last_buy) = {
            let daily = self.daily.lock().unwrap();
            (daily.buy_count, daily.last_buy)
        };
        let daily_limit = self.cfg.fertilizer_buy_daily_limit;
        if daily_limit > 0 && already_bought >= daily_limit {
            return;
        }
        if let Some(last) = last_buy {
            if last.elapsed() < BUY_COOLDOWN {
                return;
            }
        }

        let normal_hours = container_hours(items, NORMAL_CONTAINER_ID);
        if normal_hours >= CONTAINER_LIMIT_HOURS {
            self.logger.info(
                "化肥",
                format!("普通化肥容器已满 ({normal_hours}小时), 跳过购买"),
            );
            return;
        }

        let coupon_balance = item_count(items, COUPON_ITEM_ID);
        if coupon_balance <= 0 {
            return;
        }

        let price = match self.mall_fertilizer_price().await {
            Some(p) if p > 0 => i64::from(p),
            _ => return,
        };
        if coupon_balance < price {
            self.logger.info(
                "化肥",
                format!("点券不足 (余额:{coupon_balance}, 价格:{price})"),
            );
            return;
        }

        let mut to_buy = coupon_balance / price;
        if daily_limit > 0 {
            to_buy = to_buy.min(daily_limit - already_bought);
        }
        if to_buy <= 0 {
            return;
        }

        let mut bought = 0;
        for _ in 0..to_buy {
            let req = mall::PurchaseRequest {
                goods_id: MALL_FERTILIZER_GOODS_ID,
                count: 1,
            };
            match self
                .net
                .call::<_, mall::PurchaseReply>(mall::SERVICE, "Purchase", &req)
                .await
            {
                Ok(_) => bought += 1,
                Err(e) => {
                    self.logger.warn("化肥", format!("购买失败: {e}"));
                    break;
                }
            }
            tokio::time::sleep(THROTTLE).await;
        }

        let total_today = {
            let mut daily = self.daily.lock().unwrap();
            daily.buy_count += bought;
            daily.last_buy = Some(Instant::now());
            daily.buy_count
        };
        if bought > 0 {
            self.logger.info(
                "化肥",
                format!("购买化肥礼包 x{bought} (今日累计:{total_today})"),
            );
        }
    }

    async fn mall_fertilizer_price(&self) -> Option<i32> {
        let req = mall::GetMallListBySlotTypeRequest {
            slot_type: MALL_SLOT_FERTILIZER,
        };
        let reply: mall::GetMallListBySlotTypeResponse = self
            .net
            .call(mall::SERVICE, "GetMallListBySlotType", &req)
            .await
            .ok()?;

        for goods_bytes in &reply.goods_list {
            let Ok(goods) = <mall::MallGoods as prost::Message>::decode(goods_bytes.as_slice())
            else {
                continue;
            };
            if goods.goods_id == MALL_FERTILIZER_GOODS_ID {
                return Some(mall::coupon_price(&goods.price));
            }
        }
        None
    }

    async fn open_packs(&self, items: &[item::Item]) {
        let pack1 = item_count(items, FERTILIZER_PACK_ID_1);
        let pack2 = item_count(items, FERTILIZER_PACK_ID_2);
        let mut to_open = Vec::new();
        if pack1 > 0 {
            to_open.push(item::BatchUseItem {
                item_id: FERTILIZER_PACK_ID_1,
                count: pack1,
            });
        }
        if pack2 > 0 {
            to_open.push(item::BatchUseItem {
                item_id: FERTILIZER_PACK_ID_2,
                count: pack2,
            });
        }
        if to_open.is_empty() {
            return;
        }

        let req = item::BatchUseRequest { items: to_open };
        if let Err(e) = self
            .net
            .call::<_, item::BatchUseReply>(item::SERVICE, "BatchUse", &req)
            .await
        {
            self.logger.warn("化肥", format!("开启礼包失败: {e}"));
            return;
        }

        let total = pack1 + pack2;
        self.daily.lock().unwrap().open_count += total;
        self.logger.info("化肥", format!("开启化肥礼包 x{total}"));
    }

    async fn use_surplus(&self, items: &[item::Item]) {
        let target = self.cfg.fertilizer_target_count;
        let mut total_items = total_fertilizer_count(items);
        if target > 0 && total_items <= target {
            return;
        }

        let mut normal_hours = container_hours(items, NORMAL_CONTAINER_ID);
        let mut organic_hours = container_hours(items, ORGANIC_CONTAINER_ID);

        let mut to_use = Vec::new();

        for (hours, denominations) in [
            (&mut normal_hours, &NORMAL_FERTILIZERS),
            (&mut organic_hours, &ORGANIC_FERTILIZERS),
        ] {
            if *hours >= CONTAINER_LIMIT_HOURS {
                continue;
            }
            for (id, hours_per_item) in denominations.iter().copied() {
                let count = item_count(items, id);
                if count <= 0 {
                    continue;
                }
                let space_hours = CONTAINER_LIMIT_HOURS - *hours;
                let max_by_space = space_hours / hours_per_item;
                if max_by_space <= 0 {
                    continue;
                }
                let mut use_count = count.min(max_by_space);
                if target > 0 {
                    let surplus = total_items - target;
                    if surplus <= 0 {
                        break;
                    }
                    use_count = use_count.min(surplus);
                }
                if use_count > 0 {
                    to_use.push(item::BatchUseItem {
                        item_id: id,
                        count: use_count,
                    });
                    *hours += use_count * hours_per_item;
                    total_items -= use_count;
                }
            }
        }

        if to_use.is_empty() {
            return;
        }

        let req = item::BatchUseRequest { items: to_use };
        if let Err(e) = self
            .net
            .call::<_, item::BatchUseReply>(item::SERVICE, "BatchUse", &req)
            .await
        {
            self.logger.warn("化肥", format!("使用化肥失败: {e}"));
            return;
        }
        self.logger.info(
            "化肥",
            format!("使用化肥: 普通容器{normal_hours}小时 有机容器{organic_hours}小时"),
        );
    }
}

fn item_count(items: &[item::Item], id: i64) -> i64 {
    items
        .iter()
        .find(|it| it.id == id)
        .map(|it| it.count)
        .unwrap_or(0)
}

/// Containers store their content in seconds; everything else here thinks
/// in hours.
fn container_hours(items: &[item::Item], container_id: i64) -> i64 {
    item_count(items, container_id) / 3600
}

fn total_fertilizer_count(items: &[item::Item]) -> i64 {
    NORMAL_FERTILIZERS
        .iter()
        .chain(ORGANIC_FERTILIZERS.iter())
        .map(|(id, _)| item_count(items, *id))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(entries: &[(i64, i64)]) -> Vec<item::Item> {
        entries
            .iter()
            .map(|(id, count)| item::Item {
                id: *id,
                count: *count,
                uid: 1,
            })
            .collect()
    }

    #[test]
    fn container_hours_converts_seconds() {
        let items = bag(&[(NORMAL_CONTAINER_ID, 7200), (ORGANIC_CONTAINER_ID, 3599)]);
        assert_eq!(container_hours(&items, NORMAL_CONTAINER_ID), 2);
        assert_eq!(container_hours(&items, ORGANIC_CONTAINER_ID), 0);
        assert_eq!(container_hours(&items, 999), 0);
    }

    #[test]
    fn fertilizer_totals_span_both_families() {
        let items = bag(&[(80001, 3), (80004, 2), (80011, 5), (12345, 99)]);
        assert_eq!(total_fertilizer_count(&items), 10);
        assert_eq!(item_count(&items, 80004), 2);
        assert_eq!(item_count(&items, 80002), 0);
    }
}
