// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

use super::EmissionSink;
use crate::{
    error::{Error, InvalidConf, TallyResult},
    window::WindowCount,
};
use bytes::Bytes;
use slog::{o, warn, Logger};
use snafu::ensure;
use std::{
    io,
    net::SocketAddr,
    sync::atomic::{AtomicU64, Ordering},
    thread::{Builder, JoinHandle},
};
use tokio::{
    net::UdpSocket,
    runtime,
    sync::mpsc::{self, error::TrySendError, Sender},
};

/// Sends every update as a JSON line in its own UDP datagram
///
/// Datagrams are written from a dedicated IO thread. Updates that do not fit
/// in the bounded queue in front of it are dropped.
pub struct SocketSink {
    tx_channel: Sender<Bytes>,
    dropped: AtomicU64,
    _handle: JoinHandle<()>,
}

impl SocketSink {
    pub fn udp(target: SocketAddr, capacity: usize, logger: &Logger) -> TallyResult<Self> {
        ensure!(
            capacity > 0,
            InvalidConf {
                msg: "SocketSink capacity must be positive"
            }
        );
        let (tx, mut rx) = mpsc::channel::<Bytes>(capacity);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<io::Result<()>>();
        let logger = logger.new(o!("component" => "udp_sink", "target" => target.to_string()));

        let th = Builder::new()
            .name(String::from("UdpSinkThread"))
            .spawn(move || {
                let runtime = match runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                runtime.block_on(async move {
                    // Let OS handle port alloc
                    let self_addr: SocketAddr = if target.is_ipv4() {
                        SocketAddr::from(([0, 0, 0, 0], 0))
                    } else {
                        SocketAddr::from(([0u16; 8], 0))
                    };
                    let socket = match UdpSocket::bind(self_addr).await {
                        Ok(socket) => {
                            let _ = ready_tx.send(Ok(()));
                            socket
                        }
                        Err(err) => {
                            let _ = ready_tx.send(Err(err));
                            return;
                        }
                    };

                    while let Some(bytes) = rx.recv().await {
                        if let Err(err) = socket.send_to(&bytes, target).await {
                            warn!(logger, "Failed to send window update"; "error" => %err);
                        }
                    }
                });
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(SocketSink {
                tx_channel: tx,
                dropped: AtomicU64::new(0),
                _handle: th,
            }),
            Ok(Err(error)) => Err(Error::Io { error }),
            Err(_) => Err(Error::Io {
                error: io::Error::new(io::ErrorKind::Other, "UdpSinkThread exited early"),
            }),
        }
    }

    /// Amount of updates dropped before reaching the socket
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EmissionSink for SocketSink {
    fn on_update(&self, update: &WindowCount) {
        let mut line = match serde_json::to_vec(update) {
            Ok(json) => json,
            Err(_) => format!("{:?}", update).into_bytes(),
        };
        line.push(b'\n');

        match self.tx_channel.try_send(Bytes::from(line)) {
            Ok(()) => (),
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
