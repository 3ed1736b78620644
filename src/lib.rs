// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

//! Tally is an in-memory engine that counts keyed events per tumbling time window.
//!
//! Events are assigned to fixed-length windows, counted per (key, window) in a
//! lock-striped store, and can be range queried while the windows are retained.

// Public Interface

/// Tally Configuration
pub mod conf;
/// Assembles store, ingestion, querying and eviction
pub mod engine;
/// Tally error types
pub mod error;
/// Event ingestion
pub mod ingest;
/// Read-only range queries
pub mod query;
/// Receivers of window updates
pub mod sink;
/// Windowed aggregation state
pub mod store;
/// Timestamps and clocks
pub mod time;
/// Tumbling windows
pub mod window;

/// Test module containing some more complex unit tests
#[cfg(test)]
mod test;

/// Helper module that imports everything related to tally into scope
pub mod prelude {
    #[cfg(feature = "socket")]
    pub use crate::{ingest::socket::LineSource, sink::socket::SocketSink};
    pub use crate::{
        conf::{
            logger::{LoggerType, TallyLogger},
            TallyConf,
        },
        engine::{Engine, EngineBuilder},
        error::{Error, TallyResult},
        ingest::{Event, IngestReport, IngestionPipeline},
        query::{QueryService, RangeCounts},
        sink::{
            channel::ChannelSink, debug::DebugSink, log::LogSink, EmissionSink, NoopSink,
            SinkType,
        },
        store::{AggregationStore, Evictor, StoreStats},
        time::{Clock, ManualClock, SystemClock, TallyTime, Timestamp},
        window::{Window, WindowAssigner, WindowCount},
    };
}
