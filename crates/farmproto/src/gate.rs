/// Envelope message type: client-originated request.
pub const MESSAGE_TYPE_REQUEST: i32 = 1;
/// Envelope message type: response matched to a request by `client_seq`.
pub const MESSAGE_TYPE_RESPONSE: i32 = 2;
/// Envelope message type: server-originated push.
pub const MESSAGE_TYPE_NOTIFY: i32 = 3;

/// Routing metadata carried by every envelope.
///
/// `client_seq` pairs responses with requests; `server_seq` is echoed back
/// by the client so the gateway can detect lost pushes. A non-zero
/// `error_code` on a response turns the call into a business error.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Meta {
    #[prost(string, tag = "1")]
    pub service_name: String,
    #[prost(string, tag = "2")]
    pub method_name: String,
    #[prost(int32, tag = "3")]
    pub message_type: i32,
    #[prost(int64, tag = "4")]
    pub client_seq: i64,
    #[prost(int64, tag = "5")]
    pub server_seq: i64,
    #[prost(int64, tag = "6")]
    pub error_code: i64,
    #[prost(string, tag = "7")]
    pub error_message: String,
}

/// The envelope: one per WebSocket binary frame, in both directions.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Message {
    #[prost(message, optional, tag = "1")]
    pub meta: Option<Meta>,
    #[prost(bytes = "vec", tag = "2")]
    pub body: Vec<u8>,
}

/// Outer wrapper for notify bodies. The inner `message_type` is a freeform
/// string the dispatcher pattern-matches (`"Kickout"`, `"BasicNotify"`, ...).
#[derive(Clone, PartialEq, prost::Message)]
pub struct EventMessage {
    #[prost(string, tag = "1")]
    pub message_type: String,
    #[prost(bytes = "vec", tag = "2")]
    pub body: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct KickoutNotify {
    #[prost(int32, tag = "1")]
    pub reason: i32,
    #[prost(string, tag = "2")]
    pub reason_message: String,
}
