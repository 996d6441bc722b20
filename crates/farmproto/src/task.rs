pub const SERVICE: &str = "gamepb.taskpb.TaskService";

#[derive(Clone, PartialEq, prost::Message)]
pub struct Task {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub desc: String,
    #[prost(bool, tag = "3")]
    pub is_unlocked: bool,
    #[prost(bool, tag = "4")]
    pub is_claimed: bool,
    #[prost(int64, tag = "5")]
    pub progress: i64,
    #[prost(int64, tag = "6")]
    pub total_progress: i64,
    /// Reward multiplier unlocked by sharing; 0 or 1 means no bonus.
    #[prost(int64, tag = "7")]
    pub share_multiple: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TaskInfo {
    #[prost(message, repeated, tag = "1")]
    pub growth_tasks: Vec<Task>,
    #[prost(message, repeated, tag = "2")]
    pub daily_tasks: Vec<Task>,
    #[prost(message, repeated, tag = "3")]
    pub tasks: Vec<Task>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TaskInfoRequest {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct TaskInfoReply {
    #[prost(message, optional, tag = "1")]
    pub task_info: Option<TaskInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ClaimTaskRewardRequest {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(bool, tag = "2")]
    pub do_shared: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ClaimTaskRewardReply {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<super::item::Item>,
}
