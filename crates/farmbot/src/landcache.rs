use std::sync::Mutex;

use crate::model::LandStatus;

/// Harvest timing for one planted land, derived from the latest poll.
/// Feeds the level-up estimator in the instance status snapshot.
#[derive(Debug, Clone, Default)]
pub struct LandHarvestInfo {
    pub land_id: i64,
    /// Plant id for catalog lookups.
    pub crop_id: i64,
    /// Current season (1 or 2).
    pub season: i64,
    /// Unix seconds when the crop matures.
    pub mature_at_sec: i64,
    /// Base exp per harvest from the catalog.
    pub crop_exp: i64,
    /// Observed growth duration on this land, seconds.
    pub cycle_sec: i64,
    pub is_mature: bool,
    pub is_growing: bool,
    /// Land buff percentages, scaled by 100 (1000 = 10%).
    pub exp_bonus_pct: i64,
    pub time_reduce_pct: i64,
    pub yield_bonus_pct: i64,
}

#[derive(Debug, Default, Clone)]
struct Snapshot {
    total_lands: i64,
    unlocked_lands: i64,
    lands: Vec<LandStatus>,
    harvest_infos: Vec<LandHarvestInfo>,
}

/// Latest observed farm state. The whole snapshot is replaced atomically
/// after each farm poll; readers never see a partial update.
#[derive(Debug, Default)]
pub struct LandCache {
    inner: Mutex<Snapshot>,
}

impl LandCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(
        &self,
        total_lands: i64,
        unlocked_lands: i64,
        lands: Vec<LandStatus>,
        harvest_infos: Vec<LandHarvestInfo>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        *inner = Snapshot {
            total_lands,
            unlocked_lands,
            lands,
            harvest_infos,
        };
    }

    pub fn get(&self) -> (i64, i64, Vec<LandStatus>) {
        let inner = self.inner.lock().unwrap();
        (inner.total_lands, inner.unlocked_lands, inner.lands.clone())
    }

    pub fn harvest_infos(&self) -> Vec<LandHarvestInfo> {
        self.inner.lock().unwrap().harvest_infos.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_replaces_the_whole_snapshot() {
        let cache = LandCache::new();
        cache.update(
            18,
            12,
            vec![LandStatus {
                id: 1,
                unlocked: true,
                ..Default::default()
            }],
            vec![LandHarvestInfo {
                land_id: 1,
                crop_exp: 30,
                ..Default::default()
            }],
        );

        let (total, unlocked, lands) = cache.get();
        assert_eq!((total, unlocked), (18, 12));
        assert_eq!(lands.len(), 1);
        assert_eq!(cache.harvest_infos().len(), 1);

        cache.update(18, 12, Vec::new(), Vec::new());
        assert!(cache.get().2.is_empty());
        assert!(cache.harvest_infos().is_empty());
    }
}
