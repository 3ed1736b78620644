// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

use super::EmissionSink;
use crate::window::WindowCount;
use std::sync::Mutex;

/// A DebugSink keeps every update it receives in memory
///
/// Useful for tests and for callers that want to inspect what was emitted.
#[derive(Debug, Default)]
pub struct DebugSink {
    updates: Mutex<Vec<WindowCount>>,
}

impl DebugSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all received updates in arrival order
    pub fn updates(&self) -> Vec<WindowCount> {
        match self.updates.lock() {
            Ok(updates) => updates.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.updates.lock() {
            Ok(updates) => updates.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EmissionSink for DebugSink {
    fn on_update(&self, update: &WindowCount) {
        let mut updates = match self.updates.lock() {
            Ok(updates) => updates,
            Err(poisoned) => poisoned.into_inner(),
        };
        updates.push(update.clone());
    }
}
