// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

use super::Window;
use crate::{
    error::{InvalidConf, TallyResult},
    time::Timestamp,
};
use snafu::OptionExt;
use std::num::NonZeroU64;

/// Maps a timestamp to the tumbling window of `window_size` it falls into
///
/// A timestamp exactly on a boundary opens the window starting at it.
#[inline]
pub fn assign(timestamp: Timestamp, window_size: NonZeroU64) -> Window {
    let length = window_size.get();
    Window::new(timestamp - (timestamp % length), length)
}

/// Window Assigner for tumbling windows
///
/// The length is fixed for the lifetime of the assigner. Stores built on top
/// of an assigner reject windows produced by a differently sized one.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct WindowAssigner {
    length: NonZeroU64,
}

impl WindowAssigner {
    /// Create a WindowAssigner for tumbling windows of `length` milliseconds
    pub fn tumbling(length: u64) -> TallyResult<Self> {
        let length = NonZeroU64::new(length).context(InvalidConf {
            msg: "window length must be positive",
        })?;
        Ok(WindowAssigner { length })
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.length.get()
    }

    #[inline]
    pub fn assign(&self, timestamp: Timestamp) -> Window {
        assign(timestamp, self.length)
    }

    /// The window identified by `start`, aligned down to a window boundary
    #[inline]
    pub fn window_at(&self, start: Timestamp) -> Window {
        self.assign(start)
    }

    /// True if `window` could have been produced by this assigner
    #[inline]
    pub fn owns(&self, window: &Window) -> bool {
        self.assign(window.start()) == *window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn ten_seconds() -> WindowAssigner {
        WindowAssigner::tumbling(10_000).unwrap()
    }

    #[test]
    fn zero_length_is_rejected() {
        assert!(WindowAssigner::tumbling(0).is_err());
    }

    #[test]
    fn boundary_opens_window() {
        let assigner = ten_seconds();
        assert_eq!(assigner.assign(10_000).start(), 10_000);
        assert_eq!(assigner.assign(9_999).start(), 0);
        assert_eq!(assigner.assign(0).start(), 0);
        assert_eq!(assigner.assign(10_000).end(), 20_000);
    }

    #[test]
    fn same_floor_same_window() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let w: u64 = rng.gen_range(1, 100_000);
            let t1: u64 = rng.gen_range(0, 1_000_000_000);
            let t2 = (t1 / w) * w + rng.gen_range(0, w);
            let size = NonZeroU64::new(w).unwrap();
            assert_eq!(assign(t1, size).start(), assign(t2, size).start());
            assert!(assign(t1, size).contains(t1));
        }
    }

    #[test]
    fn window_at_aligns() {
        let assigner = ten_seconds();
        assert_eq!(assigner.window_at(12_345), assigner.assign(10_000));
        assert!(assigner.owns(&assigner.window_at(30_000)));
        let other = WindowAssigner::tumbling(5_000).unwrap();
        assert!(!assigner.owns(&other.assign(5_000)));
        assert!(!assigner.owns(&other.assign(0)));
    }

    #[test]
    fn last_window_saturates() {
        let assigner = ten_seconds();
        let w = assigner.assign(u64::MAX);
        assert!(w.contains(u64::MAX - 1));
        assert_eq!(w.end(), u64::MAX);
        assert!(assigner.owns(&w));
    }
}
