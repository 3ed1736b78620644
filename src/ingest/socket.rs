// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

use super::IngestionPipeline;
use crate::error::{Error, TallyResult};
use futures::StreamExt;
use slog::{debug, error, info, o, warn, Logger};
use std::{
    io,
    net::SocketAddr,
    thread::{Builder, JoinHandle},
};
use tokio::{net::TcpListener, runtime, sync::oneshot};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

/// Longest accepted line in bytes, excluding the newline
///
/// Longer lines are skipped up to the next newline.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Accepts newline delimited keys over TCP
///
/// Every line is one event counted at ingestion time. Lines that are not valid
/// events are logged and skipped; the connection stays open.
pub struct LineSource {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl LineSource {
    pub fn tcp(
        sock_addr: SocketAddr,
        pipeline: IngestionPipeline,
        logger: &Logger,
    ) -> TallyResult<LineSource> {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<io::Result<SocketAddr>>();
        let logger = logger.new(o!("component" => "tcp_source"));

        let runtime = runtime::Builder::new_current_thread().enable_all().build()?;

        let th = Builder::new()
            .name(String::from("IOThread"))
            .spawn(move || {
                let handle = runtime.handle().clone();
                runtime.block_on(async move {
                    let listener = match TcpListener::bind(sock_addr).await {
                        Ok(listener) => listener,
                        Err(err) => {
                            let _ = ready_tx.send(Err(err));
                            return;
                        }
                    };
                    let _ = ready_tx.send(listener.local_addr());

                    loop {
                        tokio::select! {
                            accepted = listener.accept() => {
                                let (socket, peer) = match accepted {
                                    Ok(conn) => conn,
                                    Err(err) => {
                                        error!(logger, "Failed to accept connection"; "error" => %err);
                                        continue;
                                    }
                                };
                                debug!(logger, "Connection opened"; "peer" => %peer);
                                let pipeline = pipeline.clone();
                                let logger = logger.clone();
                                handle.spawn(async move {
                                    let mut lines = FramedRead::new(
                                        socket,
                                        LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
                                    );
                                    while let Some(line) = lines.next().await {
                                        match line {
                                            Ok(line) => {
                                                if let Err(err) = pipeline.submit_payload(line.as_bytes()) {
                                                    debug!(logger, "Skipped line"; "error" => %err);
                                                }
                                            }
                                            Err(LinesCodecError::MaxLineLengthExceeded) => {
                                                warn!(logger, "Skipped overlong line"; "peer" => %peer, "max_length" => MAX_LINE_LENGTH);
                                            }
                                            Err(err) => {
                                                error!(logger, "Sock IO Error"; "error" => %err);
                                                break;
                                            }
                                        }
                                    }
                                    debug!(logger, "Sock connection closed"; "peer" => %peer);
                                });
                            }
                            _ = &mut shutdown_rx => break,
                        }
                    }
                    info!(logger, "Stopped listening");
                });
            })?;

        let local_addr = match ready_rx.recv() {
            Ok(Ok(addr)) => addr,
            Ok(Err(error)) => return Err(Error::Io { error }),
            Err(_) => {
                return Err(Error::Io {
                    error: io::Error::new(io::ErrorKind::Other, "IOThread exited early"),
                })
            }
        };

        Ok(LineSource {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(th),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for the IO thread
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LineSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}
