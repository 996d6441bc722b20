//! `farmbot`: the per-account protocol engine.
//!
//! One [`instance::Instance`] per managed account owns one gateway session
//! at a time: a WebSocket transport with an RPC multiplexer ([`net::Net`]),
//! a heartbeat, and a set of independent workers that poll and mutate farm
//! state on their own schedules. A watchdog reconnects with exponential
//! backoff when the disconnect reason allows it. [`manager::Manager`] is the
//! account-id keyed registry the daemon drives.

pub mod catalog;
pub mod config;
pub mod instance;
pub mod landcache;
pub mod logger;
pub mod manager;
pub mod model;
pub mod net;
pub mod store;
pub mod workers;
