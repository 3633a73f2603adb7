// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP server and connection handling.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use kl_core::{IdGen, LockRegistry, UuidIdGen};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Instrument};

use crate::connection::{Connection, Flow};

/// Shared state handed to every connection
#[derive(Clone)]
pub struct Server<G: IdGen = UuidIdGen> {
    registry: Arc<LockRegistry>,
    ids: G,
    default_expire_ms: i64,
}

impl<G: IdGen + 'static> Server<G> {
    pub fn new(registry: Arc<LockRegistry>, ids: G, default_expire_ms: i64) -> Self {
        Self {
            registry,
            ids,
            default_expire_ms,
        }
    }

    pub fn registry(&self) -> &Arc<LockRegistry> {
        &self.registry
    }

    /// Accept clients until `shutdown` resolves
    pub async fn serve(&self, listener: &TcpListener, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.spawn_connection(stream, peer),
                        Err(e) => error!("Error accepting connection: {}", e),
                    }
                }
                _ = &mut shutdown => {
                    info!("Stopped accepting connections");
                    break;
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let server = self.clone();
        let span = tracing::info_span!("conn", %peer);
        tokio::spawn(
            async move {
                debug!("client connected");
                if let Err(e) = server.handle_connection(stream).await {
                    warn!("Error handling connection: {}", e);
                }
                debug!("client gone");
            }
            .instrument(span),
        );
    }

    /// Serve one client until it quits or disconnects
    pub async fn handle_connection(&self, stream: TcpStream) -> Result<(), ServerError> {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();
        let (sink, mut events) = mpsc::unbounded_channel();
        let mut conn = Connection::new(
            Arc::clone(&self.registry),
            self.ids.clone(),
            self.default_expire_ms,
            sink,
        );

        let result = async {
            loop {
                tokio::select! {
                    line = lines.next_line() => {
                        let Some(line) = line? else {
                            break;
                        };
                        match conn.handle_line(&line) {
                            Flow::Reply(reply) => {
                                writer.write_all(conn.render(&reply).as_bytes()).await?;
                            }
                            Flow::Pending => {}
                            Flow::Close => break,
                        }
                    }
                    Some(event) = events.recv() => {
                        if let Some(reply) = conn.on_event(event) {
                            writer.write_all(conn.render(&reply).as_bytes()).await?;
                        }
                    }
                }
            }
            Ok::<(), ServerError>(())
        }
        .await;

        // Runs on every exit path, including I/O errors
        conn.release_all();
        result
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
