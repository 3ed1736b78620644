// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

use super::AggregationStore;
use crate::{
    error::{Error, InvalidConf, TallyResult},
    time::Clock,
};
use slog::{debug, info, o, Logger};
use snafu::ensure;
use std::{
    io,
    sync::Arc,
    thread::{Builder, JoinHandle},
    time::Duration,
};
use tokio::{runtime, sync::oneshot};

/// Periodically sweeps expired windows out of an [AggregationStore]
///
/// The sweep runs on its own thread and is stopped by [Evictor::shutdown] or
/// by dropping the Evictor.
pub struct Evictor {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Evictor {
    /// Starts sweeping every `interval` with windows retained for `retention` ms
    pub fn start(
        store: Arc<AggregationStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        retention: u64,
        logger: &Logger,
    ) -> TallyResult<Evictor> {
        ensure!(
            interval > Duration::from_millis(0),
            InvalidConf {
                msg: "eviction interval must be positive"
            }
        );
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let logger = logger.new(o!("component" => "evictor"));

        let runtime = runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let handle = Builder::new()
            .name(String::from("EvictionThread"))
            .spawn(move || {
                runtime.block_on(async move {
                    let mut ticker = tokio::time::interval(interval);
                    debug!(logger, "Eviction started"; "interval_ms" => interval.as_millis() as u64, "retention_ms" => retention);
                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {
                                let now = clock.now();
                                let removed = store.evict_expired(now, retention);
                                if removed > 0 {
                                    let stats = store.stats();
                                    info!(logger, "Evicted expired windows";
                                        "removed" => removed,
                                        "now" => now,
                                        "live_keys" => stats.keys,
                                        "live_windows" => stats.windows);
                                }
                            }
                            _ = &mut shutdown_rx => break,
                        }
                    }
                    debug!(logger, "Eviction stopped");
                });
            })?;

        Ok(Evictor {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Stops the sweep and waits for the eviction thread to exit
    pub fn shutdown(&mut self) -> TallyResult<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| Error::Io {
                error: io::Error::new(io::ErrorKind::Other, "EvictionThread panicked"),
            })?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for Evictor {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
