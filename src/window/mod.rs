// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

pub mod assigner;

pub use assigner::{assign, WindowAssigner};

use crate::time::Timestamp;
use serde::Serialize;

/// A half-open tumbling window `[start, end)`
///
/// Windows are identified by their start.
#[derive(Serialize, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug)]
pub struct Window {
    #[serde(rename = "window_start")]
    start: Timestamp,
    #[serde(rename = "window_end")]
    end: Timestamp,
}

impl Window {
    #[inline]
    pub(crate) fn new(start: Timestamp, length: u64) -> Self {
        Window {
            start,
            end: start.saturating_add(length),
        }
    }

    #[inline]
    pub fn start(&self) -> Timestamp {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// Length of the window in milliseconds
    #[inline]
    pub fn length(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// The count of one key within one window
#[derive(Serialize, PartialEq, Eq, Clone, Debug)]
pub struct WindowCount {
    pub key: String,
    pub count: u64,
    #[serde(flatten)]
    pub window: Window,
}

impl WindowCount {
    pub fn new(key: impl Into<String>, window: Window, count: u64) -> Self {
        WindowCount {
            key: key.into(),
            count,
            window,
        }
    }
}
