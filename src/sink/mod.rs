// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

/// Bounded queue sink
pub mod channel;
/// In-memory sink for tests and embedding callers
pub mod debug;
/// Sink logging every update
pub mod log;
/// UDP sink writing JSON lines
#[cfg(feature = "socket")]
pub mod socket;

use crate::window::WindowCount;
use serde::Deserialize;

/// Observer of every successful increment
///
/// Notification is best-effort. Implementations must return quickly and never
/// fail; a slow or broken consumer drops updates rather than stalling the
/// caller. The store stays authoritative either way.
pub trait EmissionSink: Send + Sync {
    fn on_update(&self, update: &WindowCount);
}

/// A sink that discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EmissionSink for NoopSink {
    #[inline]
    fn on_update(&self, _: &WindowCount) {}
}

/// Sink the engine installs when none is given explicitly
#[derive(Deserialize, Clone, Copy, PartialEq, Debug)]
pub enum SinkType {
    /// Logs each update through the engine logger
    Log,
    /// Drops each update
    Noop,
    /// Queues each update in a bounded channel of `emission_queue_capacity`
    /// that the engine hands out through `Engine::take_updates`
    Channel,
}

impl Default for SinkType {
    fn default() -> Self {
        SinkType::Log
    }
}
