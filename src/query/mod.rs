// Copyright (c) 2021, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

use crate::{
    error::{Error, TallyResult},
    store::AggregationStore,
    time::Timestamp,
};
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};

/// Response body for a range query
///
/// `counts_by_window_start` is keyed by window start in epoch milliseconds and
/// iterates in ascending order.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RangeCounts {
    pub key: String,
    pub from: Timestamp,
    pub to: Timestamp,
    pub counts_by_window_start: BTreeMap<Timestamp, u64>,
}

impl RangeCounts {
    pub fn to_json(&self) -> TallyResult<String> {
        serde_json::to_string(self).map_err(|e| Error::Io { error: e.into() })
    }
}

/// Read-only view over an [AggregationStore]
///
/// Queries never mutate state; abandoning one has no side effects.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<AggregationStore>,
}

impl QueryService {
    pub fn new(store: Arc<AggregationStore>) -> Self {
        QueryService { store }
    }

    /// `(window_start, count)` pairs of `key` with `from <= window_start < to`
    ///
    /// A key or range without data yields an empty sequence. `from > to` is an
    /// [InvalidRange](crate::error::Error::InvalidRange) error.
    pub fn counts_in_range(
        &self,
        key: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> TallyResult<Vec<(Timestamp, u64)>> {
        let counts = self
            .store
            .range_fetch(key, from, to)?
            .into_iter()
            .map(|wc| (wc.window.start(), wc.count))
            .collect();
        Ok(counts)
    }

    /// Same as [QueryService::counts_in_range] with the request echoed back
    pub fn query(&self, key: &str, from: Timestamp, to: Timestamp) -> TallyResult<RangeCounts> {
        let counts_by_window_start = self.counts_in_range(key, from, to)?.into_iter().collect();
        Ok(RangeCounts {
            key: key.to_owned(),
            from,
            to,
            counts_by_window_start,
        })
    }

    /// Count of `key` in the window containing `timestamp`, 0 if none
    pub fn count_at(&self, key: &str, timestamp: Timestamp) -> u64 {
        self.store
            .get(key, timestamp)
            .map(|wc| wc.count)
            .unwrap_or(0)
    }
}
