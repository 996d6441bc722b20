use std::sync::Arc;
use std::time::Duration;

use farmproto::item;

use crate::catalog::GameCatalog;
use crate::config::{self, BotConfig};
use crate::logger::Logger;
use crate::net::Net;

const INITIAL_DELAY: Duration = Duration::from_secs(10);
const PERIOD: Duration = Duration::from_secs(60);

const GOLD_COUNTER_IDS: [i64; 2] = [1, 1001];

/// Sells every fruit in the bag, optionally restricted to an allow-list
/// of plant ids.
pub struct WarehouseWorker {
    net: Arc<Net>,
    logger: Arc<Logger>,
    cfg: Arc<BotConfig>,
    catalog: Arc<GameCatalog>,
}

impl WarehouseWorker {
    pub fn new(
        net: Arc<Net>,
        logger: Arc<Logger>,
        cfg: Arc<BotConfig>,
        catalog: Arc<GameCatalog>,
    ) -> Self {
        Self {
            net,
            logger,
            cfg,
            catalog,
        }
    }

    pub async fn run_loop(self) {
        if !self.cfg.enable_sell {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(INITIAL_DELAY) => {}
            _ = self.net.done() => return,
        }
        loop {
            self.sell_all_fruits().await;
            tokio::select! {
                _ = tokio::time::sleep(PERIOD) => {}
                _ = self.net.done() => return,
            }
        }
    }

    async fn sell_all_fruits(&self) {
        let reply: item::BagReply = match self
            .net
            .call(item::SERVICE, "Bag", &item::BagRequest {})
            .await
        {
            Ok(r) => r,
            Err(_) => return,
        };
        let Some(bag) = reply.item_bag else {
            return;
        };
        if bag.items.is_empty() {
            return;
        }

        let filter = config::parse_crop_ids(&self.cfg.sell_crop_ids);

        let mut to_sell = Vec::new();
        let mut names = Vec::new();
        for it in &bag.items {
            if !self.catalog.is_fruit_id(it.id) || it.count <= 0 || it.uid <= 0 {
                continue;
            }
            if !filter.is_empty() {
                let plant_id = self.catalog.fruit_plant_id(it.id);
                if plant_id == 0 || !filter.contains(&plant_id) {
                    continue;
                }
            }
            to_sell.push(it.clone());
            names.push(format!("{}x{}", self.catalog.fruit_name(it.id), it.count));
        }
        if to_sell.is_empty() {
            return;
        }

        let reply: item::SellReply = match self
            .net
            .call(item::SERVICE, "Sell", &item::SellRequest { items: to_sell })
            .await
        {
            Ok(r) => r,
            Err(e) => {
                self.logger.warn("仓库", format!("出售失败: {e}"));
                return;
            }
        };

        let mut total_gold = 0;
        for it in &reply.get_items {
            if GOLD_COUNTER_IDS.contains(&it.id) {
                total_gold = it.count;
            }
        }
        self.logger.info(
            "仓库",
            format!("出售 {}，获得 {} 金币", names.join(", "), total_gold),
        );
    }
}
