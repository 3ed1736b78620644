// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

pub mod logger;

use crate::{
    error::{Error, InvalidConf, TallyResult},
    sink::SinkType,
    time::TallyTime,
};
use hocon::HoconLoader;
use logger::{file_logger, term_logger, LoggerType, TallyLogger};
use serde::Deserialize;
use snafu::ensure;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Configuration for a tally Engine
#[derive(Deserialize, Clone, Debug)]
pub struct TallyConf {
    /// Length in milliseconds of every tumbling window
    #[serde(default = "window_size_default")]
    pub window_size: u64,
    /// Milliseconds a window stays queryable after it ends
    #[serde(default = "retention_period_default")]
    pub retention_period: u64,
    /// Interval in milliseconds between eviction sweeps
    #[serde(default = "eviction_interval_default")]
    pub eviction_interval: u64,
    /// Amount of lock stripes in the store
    #[serde(default = "shard_count_default")]
    pub shard_count: usize,
    /// Capacity of bounded emission queues
    #[serde(default = "emission_queue_capacity_default")]
    pub emission_queue_capacity: usize,
    /// Which timestamp events are counted under
    #[serde(default)]
    pub time: TallyTime,
    /// Sink used when the engine is built without one
    #[serde(default)]
    pub sink_type: SinkType,
    /// [LoggerType] for tally related logging
    #[serde(default)]
    pub logger_type: LoggerType,
    /// Base directory, holds the log file for [LoggerType::File]
    #[serde(default = "base_dir_default")]
    pub base_dir: PathBuf,
}

impl Default for TallyConf {
    fn default() -> Self {
        TallyConf {
            window_size: window_size_default(),
            retention_period: retention_period_default(),
            eviction_interval: eviction_interval_default(),
            shard_count: shard_count_default(),
            emission_queue_capacity: emission_queue_capacity_default(),
            time: Default::default(),
            sink_type: Default::default(),
            logger_type: Default::default(),
            base_dir: base_dir_default(),
        }
    }
}

impl TallyConf {
    /// Loads TallyConf from a file
    pub fn from_file(path: impl AsRef<Path>) -> TallyResult<TallyConf> {
        let data = std::fs::read_to_string(path)?;
        TallyConf::from_str(&data)
    }

    /// Loads TallyConf from a HOCON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(data: &str) -> TallyResult<TallyConf> {
        let loader: HoconLoader = HoconLoader::new().load_str(data).map_err(|e| Error::InvalidConf {
            msg: format!("Failed to load Hocon Loader with err {}", e),
        })?;

        let conf: TallyConf = loader.resolve().map_err(|e| Error::InvalidConf {
            msg: format!("Failed to resolve TallyConf with err {}", e),
        })?;
        conf.validate()?;
        Ok(conf)
    }

    /// Rejects settings the engine cannot run with
    pub fn validate(&self) -> TallyResult<()> {
        ensure!(
            self.window_size > 0,
            InvalidConf {
                msg: "window_size must be positive"
            }
        );
        ensure!(
            self.eviction_interval > 0,
            InvalidConf {
                msg: "eviction_interval must be positive"
            }
        );
        ensure!(
            self.shard_count > 0,
            InvalidConf {
                msg: "shard_count must be positive"
            }
        );
        ensure!(
            self.emission_queue_capacity > 0,
            InvalidConf {
                msg: "emission_queue_capacity must be positive"
            }
        );
        Ok(())
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval)
    }

    pub fn log_path(&self) -> PathBuf {
        let mut buf = self.base_dir.clone();
        buf.push(logger::TALLY_LOG_NAME);
        buf
    }

    pub fn tally_logger(&self) -> TallyResult<TallyLogger> {
        match self.logger_type {
            LoggerType::File => {
                std::fs::create_dir_all(&self.base_dir)?;
                file_logger(self.log_path())
            }
            LoggerType::Terminal => Ok(term_logger()),
        }
    }
}

// Default values

fn window_size_default() -> u64 {
    // in milliseconds
    10_000
}

fn retention_period_default() -> u64 {
    // one day in milliseconds
    86_400_000
}

fn eviction_interval_default() -> u64 {
    // in milliseconds
    1000
}

fn shard_count_default() -> usize {
    std::cmp::max(1, num_cpus::get()) * 4
}

fn emission_queue_capacity_default() -> usize {
    1024
}

fn base_dir_default() -> PathBuf {
    let mut res = std::env::temp_dir();
    res.push("tally");
    res
}
