use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use serde::Deserialize;
use tracing::{info, warn};

/// Baseline land count for the cached yield table. A recommendation query
/// for a different land count recomputes the cache in place.
pub const YIELD_BASELINE_LANDS: i64 = 18;

// Planting throughput with the normal fertilizer flow: 12 plots per 2 s.
const FERT_PLANTS_PER_SEC: f64 = 6.0;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FruitRef {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlantConfig {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub seed_id: i64,
    #[serde(default)]
    pub exp: i64,
    /// Phase table, `"name:seconds;name:seconds;...;成熟:0;"`.
    #[serde(default)]
    pub grow_phases: String,
    #[serde(default)]
    pub seasons: i64,
    #[serde(default)]
    pub fruit: FruitRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleLevelConfig {
    pub level: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedShopEntry {
    #[serde(default)]
    pub seed_id: i64,
    #[serde(default)]
    pub goods_id: i64,
    #[serde(default)]
    pub plant_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub required_level: i64,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub exp: i64,
    #[serde(default)]
    pub grow_time_sec: i64,
    #[serde(default)]
    pub fruit_id: i64,
    #[serde(default)]
    pub fruit_count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedShopExport {
    #[serde(default)]
    pub exported_at: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub rows: Vec<SeedShopEntry>,
}

/// Parsed phase timings for one plant, used to model fertilizer skipping
/// the longest phase.
#[derive(Debug, Clone, Default)]
pub struct PlantPhaseData {
    pub phase_durations: Vec<i64>,
    pub max_phase_duration: i64,
    pub max_phase_index: usize,
    pub total_grow_time: i64,
    pub all_phases_equal: bool,
    /// Season 2 reruns the last three phases of the full table.
    pub season2_phases: Vec<i64>,
    pub season2_grow_time: i64,
    pub season2_max_phase: i64,
    pub season2_all_equal: bool,
}

/// One row of the exp-per-hour ranking under the fertilized baseline.
#[derive(Debug, Clone, Default)]
pub struct SeedYieldRow {
    pub seed_id: i64,
    pub name: String,
    pub required_level: i64,
    pub price: i64,
    pub exp_harvest: i64,
    pub seasons: i64,
    pub grow_time_sec: i64,
    pub season2_grow_time_sec: i64,
    pub fert_reduce_sec: i64,
    pub season2_fert_reduce_sec: i64,
    pub grow_time_fertilized: i64,
    pub farm_exp_per_hour: f64,
}

/// Static game-content tables: crops, level curve, seed shop export.
/// Loaded once at boot and shared by reference; no global state.
pub struct GameCatalog {
    plants: Vec<PlantConfig>,
    by_plant: HashMap<i64, usize>,
    by_seed: HashMap<i64, usize>,
    by_fruit: HashMap<i64, usize>,
    level_exp: HashMap<i64, i64>,
    seed_shop: Option<SeedShopExport>,
    phase_data: HashMap<i64, PlantPhaseData>,
    yield_cache: Mutex<(i64, Vec<SeedYieldRow>)>,
}

impl GameCatalog {
    /// Load the content tables from `dir`. Missing or malformed files leave
    /// the corresponding table empty; lookups then fall back to placeholder
    /// names and the planting policy degrades to level-based selection.
    pub fn load(dir: &Path) -> Self {
        let plants: Vec<PlantConfig> = read_json(&dir.join("Plant.json")).unwrap_or_default();
        let levels: Vec<RoleLevelConfig> = read_json(&dir.join("RoleLevel.json")).unwrap_or_default();
        let seed_shop: Option<SeedShopExport> = read_json(&dir.join("seed-shop-merged-export.json"));

        if !plants.is_empty() {
            info!(plants = plants.len(), "loaded plant table");
        }
        if !levels.is_empty() {
            info!(levels = levels.len(), "loaded level-exp table");
        }
        if let Some(export) = &seed_shop {
            info!(seeds = export.rows.len(), "loaded seed shop export");
        }

        Self::from_tables(plants, levels, seed_shop)
    }

    pub fn from_tables(
        plants: Vec<PlantConfig>,
        levels: Vec<RoleLevelConfig>,
        seed_shop: Option<SeedShopExport>,
    ) -> Self {
        let mut by_plant = HashMap::new();
        let mut by_seed = HashMap::new();
        let mut by_fruit = HashMap::new();
        let mut phase_data = HashMap::new();

        for (i, p) in plants.iter().enumerate() {
            by_plant.insert(p.id, i);
            if p.seed_id > 0 {
                by_seed.insert(p.seed_id, i);
            }
            if p.fruit.id > 0 {
                by_fruit.insert(p.fruit.id, i);
            }
            if p.seed_id > 0 && !p.grow_phases.is_empty() {
                if let Some(pd) = build_phase_data(p) {
                    phase_data.insert(p.seed_id, pd);
                }
            }
        }

        let level_exp = levels.into_iter().map(|l| (l.level, l.exp)).collect();

        let catalog = Self {
            plants,
            by_plant,
            by_seed,
            by_fruit,
            level_exp,
            seed_shop,
            phase_data,
            yield_cache: Mutex::new((0, Vec::new())),
        };
        let rows = catalog.compute_yield(YIELD_BASELINE_LANDS);
        *catalog.yield_cache.lock().unwrap() = (YIELD_BASELINE_LANDS, rows);
        catalog
    }

    pub fn empty() -> Self {
        Self::from_tables(Vec::new(), Vec::new(), None)
    }

    fn plant(&self, plant_id: i64) -> Option<&PlantConfig> {
        self.by_plant.get(&plant_id).map(|i| &self.plants[*i])
    }

    pub fn plant_name(&self, plant_id: i64) -> String {
        self.plant(plant_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("植物{plant_id}"))
    }

    pub fn plant_name_by_seed(&self, seed_id: i64) -> String {
        self.by_seed
            .get(&seed_id)
            .map(|i| self.plants[*i].name.clone())
            .unwrap_or_else(|| format!("种子{seed_id}"))
    }

    pub fn plant_exp(&self, plant_id: i64) -> i64 {
        self.plant(plant_id).map(|p| p.exp).unwrap_or(0)
    }

    pub fn seed_id_of_plant(&self, plant_id: i64) -> i64 {
        self.plant(plant_id).map(|p| p.seed_id).unwrap_or(0)
    }

    pub fn fruit_name(&self, fruit_id: i64) -> String {
        self.by_fruit
            .get(&fruit_id)
            .map(|i| self.plants[*i].name.clone())
            .unwrap_or_else(|| format!("果实{fruit_id}"))
    }

    pub fn is_fruit_id(&self, id: i64) -> bool {
        self.by_fruit.contains_key(&id)
    }

    pub fn fruit_plant_id(&self, fruit_id: i64) -> i64 {
        self.by_fruit
            .get(&fruit_id)
            .map(|i| self.plants[*i].id)
            .unwrap_or(0)
    }

    pub fn plant_seasons(&self, plant_id: i64) -> i64 {
        match self.plant(plant_id) {
            Some(p) if p.seasons >= 2 => p.seasons,
            _ => 1,
        }
    }

    pub fn phase_data(&self, plant_id: i64) -> Option<PlantPhaseData> {
        let p = self.plant(plant_id)?;
        self.phase_data.get(&p.seed_id).cloned()
    }

    pub fn phase_data_by_seed(&self, seed_id: i64) -> Option<PlantPhaseData> {
        self.phase_data.get(&seed_id).cloned()
    }

    /// Cumulative exp required for `current_level + 1`, or `None` at cap.
    pub fn next_level_exp(&self, current_level: i64) -> Option<i64> {
        self.level_exp.get(&(current_level + 1)).copied()
    }

    /// Top seeds by exp-per-hour among those the level allows. The cache is
    /// keyed to one land count at a time; a query for a different count
    /// recomputes it. Concurrent readers may briefly see rows for the other
    /// count, which is fine: callers intersect against live shop data.
    pub fn planting_recommendation(&self, level: i64, lands: i64, top_n: usize) -> Vec<SeedYieldRow> {
        {
            let cache = self.yield_cache.lock().unwrap();
            if cache.1.is_empty() {
                return Vec::new();
            }
            if lands <= 0 || lands == cache.0 {
                return top_rows(&cache.1, level, top_n);
            }
        }
        let rows = self.compute_yield(lands);
        let mut cache = self.yield_cache.lock().unwrap();
        *cache = (lands, rows);
        top_rows(&cache.1, level, top_n)
    }

    fn compute_yield(&self, lands: i64) -> Vec<SeedYieldRow> {
        let Some(export) = &self.seed_shop else {
            return Vec::new();
        };
        let plant_seconds = lands as f64 / FERT_PLANTS_PER_SEC;
        let mut rows = Vec::new();

        for s in &export.rows {
            if s.seed_id <= 0 || s.grow_time_sec <= 0 {
                continue;
            }
            let pd = self.phase_data.get(&s.seed_id);
            let seasons = self
                .by_seed
                .get(&s.seed_id)
                .map(|i| self.plants[*i].seasons)
                .filter(|n| *n >= 2)
                .unwrap_or(1);

            let (fert_reduce, s2_grow, s2_fert_reduce) = match pd {
                Some(pd) => (
                    pd.max_phase_duration,
                    if seasons >= 2 { pd.season2_grow_time } else { 0 },
                    if seasons >= 2 { pd.season2_max_phase } else { 0 },
                ),
                None => (0, 0, 0),
            };

            let s1_fertilized = (s.grow_time_sec - fert_reduce).max(1);
            let mut total_grow = s1_fertilized;
            let mut total_exp = s.exp;
            if seasons >= 2 && s2_grow > 0 {
                total_grow += (s2_grow - s2_fert_reduce).max(1);
                total_exp += s.exp;
            }

            let cycle_sec = total_grow as f64 + plant_seconds;
            let exp_per_hour = (lands * total_exp) as f64 / cycle_sec * 3600.0;

            rows.push(SeedYieldRow {
                seed_id: s.seed_id,
                name: s.name.clone(),
                required_level: s.required_level,
                price: s.price,
                exp_harvest: s.exp,
                seasons,
                grow_time_sec: s.grow_time_sec,
                season2_grow_time_sec: s2_grow,
                fert_reduce_sec: fert_reduce,
                season2_fert_reduce_sec: s2_fert_reduce,
                grow_time_fertilized: total_grow,
                farm_exp_per_hour: exp_per_hour,
            });
        }

        rows.sort_by(|a, b| {
            b.farm_exp_per_hour
                .partial_cmp(&a.farm_exp_per_hour)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rows
    }
}

fn top_rows(rows: &[SeedYieldRow], level: i64, top_n: usize) -> Vec<SeedYieldRow> {
    rows.iter()
        .filter(|r| r.required_level <= level)
        .take(top_n)
        .cloned()
        .collect()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let data = std::fs::read(path).ok()?;
    match serde_json::from_slice(&data) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(path = %path.display(), err = %e, "skipping malformed content table");
            None
        }
    }
}

/// Parse `"name:seconds;..."` keeping only entries with a positive duration.
fn parse_grow_phases(grow_phases: &str) -> Vec<i64> {
    parse_all_phase_durations(grow_phases)
        .into_iter()
        .filter(|d| *d > 0)
        .collect()
}

/// Parse every phase duration including the trailing zero-length mature
/// phase; season 2 takes the last three entries of this full list.
fn parse_all_phase_durations(grow_phases: &str) -> Vec<i64> {
    grow_phases
        .split(';')
        .filter_map(|phase| {
            let phase = phase.trim();
            let (_, secs) = phase.split_once(':')?;
            secs.trim().parse::<i64>().ok()
        })
        .collect()
}

fn build_phase_data(p: &PlantConfig) -> Option<PlantPhaseData> {
    let durations = parse_grow_phases(&p.grow_phases);
    if durations.is_empty() {
        return None;
    }

    let mut pd = PlantPhaseData {
        phase_durations: durations.clone(),
        ..Default::default()
    };
    for (i, d) in durations.iter().enumerate() {
        pd.total_grow_time += d;
        if *d > pd.max_phase_duration {
            pd.max_phase_duration = *d;
            pd.max_phase_index = i;
        }
    }
    pd.all_phases_equal = durations.iter().all(|d| *d == durations[0]);

    if p.seasons >= 2 {
        let all = parse_all_phase_durations(&p.grow_phases);
        if all.len() >= 3 {
            let s2: Vec<i64> = all[all.len() - 3..].iter().copied().filter(|d| *d > 0).collect();
            if !s2.is_empty() {
                pd.season2_grow_time = s2.iter().sum();
                pd.season2_max_phase = *s2.iter().max().unwrap();
                pd.season2_all_equal = s2.iter().all(|d| *d == s2[0]);
                pd.season2_phases = s2;
            }
        }
    }

    Some(pd)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plant(id: i64, seed: i64, exp: i64, phases: &str, seasons: i64, fruit: i64) -> PlantConfig {
        PlantConfig {
            id,
            name: format!("crop{id}"),
            seed_id: seed,
            exp,
            grow_phases: phases.to_string(),
            seasons,
            fruit: FruitRef { id: fruit, count: 1 },
            ..Default::default()
        }
    }

    fn shop_row(seed: i64, level: i64, exp: i64, grow: i64) -> SeedShopEntry {
        SeedShopEntry {
            seed_id: seed,
            name: format!("seed{seed}"),
            required_level: level,
            price: 10,
            exp,
            grow_time_sec: grow,
            ..Default::default()
        }
    }

    #[test]
    fn phase_parsing_keeps_positive_durations() {
        assert_eq!(parse_grow_phases("种子:60;发芽:120;成熟:0;"), vec![60, 120]);
        assert_eq!(parse_all_phase_durations("种子:60;发芽:120;成熟:0;"), vec![60, 120, 0]);
        assert!(parse_grow_phases("").is_empty());
        assert!(parse_grow_phases("garbage").is_empty());
    }

    #[test]
    fn phase_data_finds_longest_phase_and_season2() {
        let p = plant(1, 101, 30, "a:60;b:300;c:120;d:120;成熟:0;", 2, 0);
        let pd = build_phase_data(&p).unwrap();
        assert_eq!(pd.max_phase_duration, 300);
        assert_eq!(pd.max_phase_index, 1);
        assert_eq!(pd.total_grow_time, 600);
        assert!(!pd.all_phases_equal);
        // Last three entries of the full list are c, d, mature(0).
        assert_eq!(pd.season2_phases, vec![120, 120]);
        assert_eq!(pd.season2_grow_time, 240);
        assert_eq!(pd.season2_max_phase, 120);
        assert!(pd.season2_all_equal);
    }

    #[test]
    fn recommendation_ranks_by_exp_per_hour_and_filters_level() {
        let catalog = GameCatalog::from_tables(
            vec![
                plant(1, 101, 10, "a:100;b:100;成熟:0;", 1, 0),
                plant(2, 102, 100, "a:1000;b:1000;成熟:0;", 1, 0),
            ],
            vec![RoleLevelConfig { level: 2, exp: 100 }],
            Some(SeedShopExport {
                rows: vec![shop_row(101, 1, 10, 200), shop_row(102, 20, 100, 2000)],
                ..Default::default()
            }),
        );

        let rec = catalog.planting_recommendation(30, YIELD_BASELINE_LANDS, 10);
        assert_eq!(rec.len(), 2);
        assert!(rec[0].farm_exp_per_hour >= rec[1].farm_exp_per_hour);

        // Below the second seed's level gate only the first qualifies.
        let rec = catalog.planting_recommendation(5, YIELD_BASELINE_LANDS, 10);
        assert_eq!(rec.len(), 1);
        assert_eq!(rec[0].seed_id, 101);
    }

    #[test]
    fn recommendation_recomputes_for_other_land_counts() {
        let catalog = GameCatalog::from_tables(
            vec![plant(1, 101, 10, "a:100;成熟:0;", 1, 0)],
            Vec::new(),
            Some(SeedShopExport {
                rows: vec![shop_row(101, 1, 10, 100)],
                ..Default::default()
            }),
        );
        let base = catalog.planting_recommendation(10, YIELD_BASELINE_LANDS, 1);
        let wider = catalog.planting_recommendation(10, 24, 1);
        assert!(wider[0].farm_exp_per_hour > base[0].farm_exp_per_hour);
    }

    #[test]
    fn lookups_fall_back_to_placeholders() {
        let catalog = GameCatalog::empty();
        assert_eq!(catalog.plant_name(7), "植物7");
        assert_eq!(catalog.fruit_name(8), "果实8");
        assert_eq!(catalog.plant_name_by_seed(9), "种子9");
        assert!(!catalog.is_fruit_id(8));
        assert_eq!(catalog.next_level_exp(1), None);
        assert!(catalog.planting_recommendation(10, 18, 5).is_empty());
    }

    #[test]
    fn fruit_mapping_resolves_plant() {
        let catalog = GameCatalog::from_tables(
            vec![plant(1, 101, 10, "a:100;成熟:0;", 1, 5001)],
            Vec::new(),
            None,
        );
        assert!(catalog.is_fruit_id(5001));
        assert_eq!(catalog.fruit_plant_id(5001), 1);
        assert_eq!(catalog.fruit_name(5001), "crop1");
        assert_eq!(catalog.seed_id_of_plant(1), 101);
    }
}
