// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

mod concurrency;

use crate::prelude::*;
use std::sync::Arc;

pub(crate) fn test_logger() -> TallyLogger {
    crate::conf::logger::discard_logger()
}

pub(crate) fn test_store(window_size: u64, shards: usize) -> Arc<AggregationStore> {
    Arc::new(AggregationStore::new(
        WindowAssigner::tumbling(window_size).unwrap(),
        shards,
        Arc::new(NoopSink),
    ))
}
