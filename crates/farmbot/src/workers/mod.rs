//! Cooperative per-session workers. Each one waits out an initial delay,
//! then alternates its unit of work with a sleep on its own period, and
//! exits as soon as the session is cancelled. Workers run in parallel and
//! never coordinate; the transport linearizes their writes.

pub mod farm;
pub mod fertilizer;
pub mod friend;
pub mod task;
pub mod warehouse;

use std::sync::atomic::AtomicI64;

/// Lifetime counters for one instance, shared between the friend worker
/// and the status snapshot.
#[derive(Debug, Default)]
pub struct BotStats {
    pub total_steal: AtomicI64,
    pub total_help: AtomicI64,
    pub friends_count: AtomicI64,
}
