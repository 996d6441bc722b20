pub const SERVICE: &str = "gamepb.friendpb.FriendService";

/// Aggregate counters for a friend's farm, enough to decide whether a
/// visit is worth the round-trips.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FriendPlantCounters {
    #[prost(int64, tag = "1")]
    pub steal_plant_num: i64,
    #[prost(int64, tag = "2")]
    pub dry_num: i64,
    #[prost(int64, tag = "3")]
    pub weed_num: i64,
    #[prost(int64, tag = "4")]
    pub insect_num: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GameFriend {
    #[prost(int64, tag = "1")]
    pub gid: i64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub remark: String,
    #[prost(message, optional, tag = "4")]
    pub plant: Option<FriendPlantCounters>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetAllRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetAllReply {
    #[prost(message, repeated, tag = "1")]
    pub game_friends: Vec<GameFriend>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FriendApplication {
    #[prost(int64, tag = "1")]
    pub gid: i64,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetApplicationsRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetApplicationsReply {
    #[prost(message, repeated, tag = "1")]
    pub applications: Vec<FriendApplication>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AcceptFriendsRequest {
    #[prost(int64, repeated, tag = "1")]
    pub friend_gids: Vec<i64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AcceptFriendsReply {}
