// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

/// TCP line ingress
#[cfg(feature = "socket")]
pub mod socket;

use crate::{
    error::{Error, InvalidEvent, TallyResult},
    store::AggregationStore,
    time::{Clock, TallyTime, Timestamp},
    window::WindowCount,
};
use slog::{debug, o, Logger};
use snafu::ensure;
use std::{str, sync::Arc};

/// A keyed event as delivered by an ingress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub key: String,
    /// Event time in epoch milliseconds, if the producer set one
    pub timestamp: Option<Timestamp>,
}

impl Event {
    pub fn new(key: impl Into<String>, timestamp: Timestamp) -> Self {
        Event {
            key: key.into(),
            timestamp: Some(timestamp),
        }
    }

    /// An event that will be counted at ingestion time
    pub fn untimed(key: impl Into<String>) -> Self {
        Event {
            key: key.into(),
            timestamp: None,
        }
    }
}

/// Outcome of [IngestionPipeline::submit_batch]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: usize,
}

/// Validates events and feeds them into the store
///
/// Delivery is at-least-once: submitting the same event twice counts it
/// twice.
#[derive(Clone)]
pub struct IngestionPipeline {
    store: Arc<AggregationStore>,
    clock: Arc<dyn Clock>,
    time: TallyTime,
    logger: Logger,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<AggregationStore>,
        clock: Arc<dyn Clock>,
        time: TallyTime,
        logger: &Logger,
    ) -> Self {
        IngestionPipeline {
            store,
            clock,
            time,
            logger: logger.new(o!("component" => "ingestion")),
        }
    }

    /// Timestamp the event is counted under
    #[inline]
    fn event_time(&self, event: &Event) -> Timestamp {
        match (self.time, event.timestamp) {
            (TallyTime::Event, Some(ts)) => ts,
            _ => self.clock.now(),
        }
    }

    /// Counts `event` in the window its timestamp falls into
    pub fn submit(&self, event: Event) -> TallyResult<WindowCount> {
        ensure!(
            !event.key.trim().is_empty(),
            InvalidEvent {
                msg: "event key is empty"
            }
        );

        let ts = self.event_time(&event);
        let window = self.store.assigner().assign(ts);
        self.store.increment(&event.key, window)
    }

    /// Submits every event, isolating failures per event
    pub fn submit_batch<I>(&self, events: I) -> IngestReport
    where
        I: IntoIterator<Item = Event>,
    {
        let mut report = IngestReport::default();
        for event in events {
            match self.submit(event) {
                Ok(_) => report.accepted += 1,
                Err(err) => {
                    debug!(self.logger, "Rejected event"; "error" => %err);
                    report.rejected += 1;
                }
            }
        }
        report
    }

    /// Counts a raw payload as a key at ingestion time
    ///
    /// The payload has to be UTF-8; surrounding whitespace is not part of the
    /// key.
    pub fn submit_payload(&self, payload: &[u8]) -> TallyResult<WindowCount> {
        let key = str::from_utf8(payload).map_err(|e| Error::InvalidEvent {
            msg: format!("payload is not UTF-8: {}", e),
        })?;
        self.submit(Event::untimed(key.trim()))
    }
}
