//! `farmproto`: protobuf wire types for the farm gateway.
//!
//! Every WebSocket binary frame carries exactly one serialized
//! [`gate::Message`] envelope; `Message.body` is the service-specific
//! payload, itself protobuf. Message structs are hand-written prost
//! derives so the crate builds without a protoc toolchain, but the
//! encoding is plain proto3 wire format and must stay that way: the
//! gateway rejects anything else.
//!
//! Service and method names travel as verbatim strings inside
//! [`gate::Meta`] (e.g. `"gamepb.plantpb.PlantService"` / `"AllLands"`).
//! Each payload module exports its `SERVICE` constant.

pub mod friend;
pub mod gate;
pub mod item;
pub mod mall;
pub mod plant;
pub mod shop;
pub mod task;
pub mod user;
pub mod visit;
