// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

use super::EmissionSink;
use crate::window::WindowCount;
use slog::{info, o, Logger};

/// Logs `key`, `count` and window bounds of every update
///
/// The engine logger sits behind an async drain, so a backed up log output
/// drops records instead of blocking increments.
pub struct LogSink {
    logger: Logger,
}

impl LogSink {
    pub fn new(logger: &Logger) -> Self {
        LogSink {
            logger: logger.new(o!("component" => "emission")),
        }
    }
}

impl EmissionSink for LogSink {
    fn on_update(&self, update: &WindowCount) {
        info!(
            self.logger,
            "Window updated";
            "key" => &update.key,
            "count" => update.count,
            "window_start" => update.window.start(),
            "window_end" => update.window.end()
        );
    }
}
