pub const SERVICE: &str = "gamepb.plantpb.PlantService";

/// Growth stage of a planted crop. `begin_time` on the matching
/// [`PlantPhaseInfo`] says when the stage started.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum PlantPhase {
    Unknown = 0,
    Seed = 1,
    Sprout = 2,
    SmallLeaf = 3,
    BigLeaf = 4,
    Flower = 5,
    Mature = 6,
    Dead = 7,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PlantPhaseInfo {
    #[prost(enumeration = "PlantPhase", tag = "1")]
    pub phase: i32,
    /// Stage start, unix seconds (older gateways send milliseconds).
    #[prost(int64, tag = "2")]
    pub begin_time: i64,
    #[prost(int64, tag = "3")]
    pub dry_time: i64,
    #[prost(int64, tag = "4")]
    pub weeds_time: i64,
    #[prost(int64, tag = "5")]
    pub insect_time: i64,
}

/// Land-level buffs; percentages scaled by 100 (1000 = 10%).
#[derive(Clone, PartialEq, prost::Message)]
pub struct LandBuff {
    #[prost(int64, tag = "1")]
    pub plant_exp_bonus: i64,
    #[prost(int64, tag = "2")]
    pub planting_time_reduction: i64,
    #[prost(int64, tag = "3")]
    pub plant_yield_bonus: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PlantInfo {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(message, repeated, tag = "2")]
    pub phases: Vec<PlantPhaseInfo>,
    #[prost(int64, tag = "3")]
    pub dry_num: i64,
    #[prost(int64, repeated, tag = "4")]
    pub weed_owners: Vec<i64>,
    #[prost(int64, repeated, tag = "5")]
    pub insect_owners: Vec<i64>,
    #[prost(bool, tag = "6")]
    pub stealable: bool,
    #[prost(int64, tag = "7")]
    pub season: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LandCondition {
    #[prost(int64, tag = "1")]
    pub need_level: i64,
    #[prost(int64, tag = "2")]
    pub need_gold: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LandInfo {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(int64, tag = "2")]
    pub level: i64,
    #[prost(int64, tag = "3")]
    pub max_level: i64,
    #[prost(bool, tag = "4")]
    pub unlocked: bool,
    #[prost(bool, tag = "5")]
    pub could_unlock: bool,
    #[prost(bool, tag = "6")]
    pub could_upgrade: bool,
    #[prost(message, optional, tag = "7")]
    pub unlock_condition: Option<LandCondition>,
    #[prost(message, optional, tag = "8")]
    pub upgrade_condition: Option<LandCondition>,
    #[prost(message, optional, tag = "9")]
    pub plant: Option<PlantInfo>,
    #[prost(message, optional, tag = "10")]
    pub buff: Option<LandBuff>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AllLandsRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AllLandsReply {
    #[prost(message, repeated, tag = "1")]
    pub lands: Vec<LandInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HarvestRequest {
    #[prost(int64, repeated, tag = "1")]
    pub land_ids: Vec<i64>,
    /// Farm owner; differs from the caller when stealing on a visit.
    #[prost(int64, tag = "2")]
    pub host_gid: i64,
    #[prost(bool, tag = "3")]
    pub is_all: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HarvestReply {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WaterLandRequest {
    #[prost(int64, repeated, tag = "1")]
    pub land_ids: Vec<i64>,
    #[prost(int64, tag = "2")]
    pub host_gid: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WaterLandReply {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WeedOutRequest {
    #[prost(int64, repeated, tag = "1")]
    pub land_ids: Vec<i64>,
    #[prost(int64, tag = "2")]
    pub host_gid: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WeedOutReply {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct InsecticideRequest {
    #[prost(int64, repeated, tag = "1")]
    pub land_ids: Vec<i64>,
    #[prost(int64, tag = "2")]
    pub host_gid: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct InsecticideReply {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RemovePlantRequest {
    #[prost(int64, repeated, tag = "1")]
    pub land_ids: Vec<i64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RemovePlantReply {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PlantItem {
    #[prost(int64, tag = "1")]
    pub seed_id: i64,
    #[prost(int64, repeated, tag = "2")]
    pub land_ids: Vec<i64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PlantRequest {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<PlantItem>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PlantReply {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FertilizeRequest {
    #[prost(int64, repeated, tag = "1")]
    pub land_ids: Vec<i64>,
    #[prost(int64, tag = "2")]
    pub fertilizer_id: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FertilizeReply {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UnlockLandRequest {
    #[prost(int64, tag = "1")]
    pub land_id: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UnlockLandReply {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpgradeLandRequest {
    #[prost(int64, tag = "1")]
    pub land_id: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpgradeLandReply {}
