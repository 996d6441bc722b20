pub const SERVICE: &str = "gamepb.visitpb.VisitService";

/// `reason` 2 marks a friend-list visit; other values are client UI paths.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EnterRequest {
    #[prost(int64, tag = "1")]
    pub host_gid: i64,
    #[prost(int32, tag = "2")]
    pub reason: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EnterReply {
    #[prost(message, repeated, tag = "1")]
    pub lands: Vec<super::plant::LandInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LeaveRequest {
    #[prost(int64, tag = "1")]
    pub host_gid: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LeaveReply {}
