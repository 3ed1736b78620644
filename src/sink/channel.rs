// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

use super::EmissionSink;
use crate::window::WindowCount;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

/// Forwards updates into a bounded queue
///
/// When the queue is full, or the receiver is gone, the update is dropped and
/// counted. The sending side never waits.
pub struct ChannelSink {
    tx: Sender<WindowCount>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Creates a sink together with the receiving end of its queue
    pub fn bounded(capacity: usize) -> (ChannelSink, Receiver<WindowCount>) {
        assert!(capacity > 0, "ChannelSink capacity must be positive");
        let (tx, rx) = mpsc::channel(capacity);
        let sink = ChannelSink {
            tx,
            dropped: AtomicU64::new(0),
        };
        (sink, rx)
    }

    /// Amount of updates that did not fit in the queue
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EmissionSink for ChannelSink {
    fn on_update(&self, update: &WindowCount) {
        match self.tx.try_send(update.clone()) {
            Ok(()) => (),
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::WindowAssigner;

    fn update(count: u64) -> WindowCount {
        let window = WindowAssigner::tumbling(10).unwrap().assign(0);
        WindowCount::new("k", window, count)
    }

    #[test]
    fn full_queue_drops() {
        let (sink, mut rx) = ChannelSink::bounded(2);
        for i in 1..=5 {
            sink.on_update(&update(i));
        }
        assert_eq!(sink.dropped(), 3);

        assert_eq!(rx.try_recv().unwrap().count, 1);
        assert_eq!(rx.try_recv().unwrap().count, 2);
        assert!(rx.try_recv().is_err());

        // room again after draining
        sink.on_update(&update(6));
        assert_eq!(rx.try_recv().unwrap().count, 6);
        assert_eq!(sink.dropped(), 3);
    }

    #[test]
    fn closed_receiver_drops() {
        let (sink, rx) = ChannelSink::bounded(4);
        drop(rx);
        sink.on_update(&update(1));
        assert_eq!(sink.dropped(), 1);
    }
}
