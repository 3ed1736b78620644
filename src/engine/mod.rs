// Copyright (c) 2021, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

use crate::{
    conf::{logger::TallyLogger, TallyConf},
    error::TallyResult,
    ingest::IngestionPipeline,
    query::QueryService,
    sink::{channel::ChannelSink, log::LogSink, EmissionSink, NoopSink, SinkType},
    store::{AggregationStore, Evictor},
    time::{Clock, SystemClock},
    window::{WindowAssigner, WindowCount},
};
use slog::{info, o};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;

/// Builder for an [Engine]
///
/// Collaborators that are not set explicitly are derived from the [TallyConf].
pub struct EngineBuilder {
    conf: TallyConf,
    sink: Option<Arc<dyn EmissionSink>>,
    clock: Option<Arc<dyn Clock>>,
    logger: Option<TallyLogger>,
}

impl EngineBuilder {
    pub fn new(conf: TallyConf) -> Self {
        EngineBuilder {
            conf,
            sink: None,
            clock: None,
            logger: None,
        }
    }

    pub fn sink(mut self, sink: Arc<dyn EmissionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn logger(mut self, logger: TallyLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> TallyResult<Engine> {
        self.conf.validate()?;
        let logger = match self.logger {
            Some(logger) => logger,
            None => self.conf.tally_logger()?,
        };
        let mut updates = None;
        let sink = match self.sink {
            Some(sink) => sink,
            None => match self.conf.sink_type {
                SinkType::Log => Arc::new(LogSink::new(&logger)) as Arc<dyn EmissionSink>,
                SinkType::Noop => Arc::new(NoopSink),
                SinkType::Channel => {
                    let (sink, rx) = ChannelSink::bounded(self.conf.emission_queue_capacity);
                    updates = Some(rx);
                    Arc::new(sink)
                }
            },
        };
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let assigner = WindowAssigner::tumbling(self.conf.window_size)?;
        let store = Arc::new(AggregationStore::new(
            assigner,
            self.conf.shard_count,
            sink,
        ));
        let pipeline =
            IngestionPipeline::new(store.clone(), clock.clone(), self.conf.time, &logger);
        let query = QueryService::new(store.clone());

        info!(logger, "Engine created";
            "window_size_ms" => self.conf.window_size,
            "retention_period_ms" => self.conf.retention_period,
            "shards" => self.conf.shard_count);

        Ok(Engine {
            conf: self.conf,
            logger,
            clock,
            store,
            pipeline,
            query,
            updates,
            evictor: None,
        })
    }
}

/// The assembled engine
///
/// Owns the single store instance; every component receives it by handle.
/// Eviction runs only between [Engine::start] and [Engine::shutdown].
pub struct Engine {
    conf: TallyConf,
    logger: TallyLogger,
    clock: Arc<dyn Clock>,
    store: Arc<AggregationStore>,
    pipeline: IngestionPipeline,
    query: QueryService,
    updates: Option<Receiver<WindowCount>>,
    evictor: Option<Evictor>,
}

impl Engine {
    /// Builds an engine with collaborators derived from `conf`
    pub fn new(conf: TallyConf) -> TallyResult<Engine> {
        EngineBuilder::new(conf).build()
    }

    /// Starts the background eviction job; a no-op if already running
    pub fn start(&mut self) -> TallyResult<()> {
        if self.evictor.is_some() {
            return Ok(());
        }
        let evictor = Evictor::start(
            self.store.clone(),
            self.clock.clone(),
            self.conf.eviction_interval(),
            self.conf.retention_period,
            &self.logger,
        )?;
        self.evictor = Some(evictor);
        info!(self.logger, "Engine started");
        Ok(())
    }

    /// Stops the background eviction job and waits for it
    pub fn shutdown(&mut self) -> TallyResult<()> {
        if let Some(mut evictor) = self.evictor.take() {
            evictor.shutdown()?;
            info!(self.logger, "Engine stopped"; "stats" => format!("{:?}", self.store.stats()));
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.evictor.is_some()
    }

    /// Runs one eviction sweep against the engine clock
    pub fn evict_now(&self) -> usize {
        self.store
            .evict_expired(self.clock.now(), self.conf.retention_period)
    }

    /// Receiving end of the [SinkType::Channel] queue
    ///
    /// `None` for other sinks, or once it has been taken.
    pub fn take_updates(&mut self) -> Option<Receiver<WindowCount>> {
        self.updates.take()
    }

    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.pipeline
    }

    pub fn query(&self) -> &QueryService {
        &self.query
    }

    pub fn store(&self) -> &Arc<AggregationStore> {
        &self.store
    }

    pub fn conf(&self) -> &TallyConf {
        &self.conf
    }

    pub fn logger(&self) -> &TallyLogger {
        &self.logger
    }

    /// Handle to a logger scoped to `component`, for transports built around the engine
    pub fn component_logger(&self, component: &'static str) -> TallyLogger {
        self.logger.new(o!("component" => component))
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
