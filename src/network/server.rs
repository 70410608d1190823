//! TCP Server
//!
//! Accepts connections and dispatches to worker threads.
//!
//! ```text
//!  accept loop ──(TcpStream)──▶ crossbeam channel ──▶ worker 0..N
//!      │                                                 │
//!  shutdown flag                                   Connection::handle
//! ```

use std::io::{BufWriter, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver};

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::protocol::{write_response, Response};
use crate::raw_api::RawApi;
use crate::storage::Storage;

use super::Connection;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Flag that stops a running server
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Ask the server to stop accepting and drain its workers
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// TCP server exposing the Raw API
pub struct Server<S: Storage + 'static> {
    config: Config,
    api: RawApi<S>,
    listener: TcpListener,
    shutdown: ShutdownHandle,
    /// Connections accepted and not yet finished
    active: Arc<AtomicUsize>,
}

impl<S: Storage + 'static> Server<S> {
    /// Bind `config.listen_addr`
    ///
    /// The storage must already be started; the server never starts or stops it.
    pub fn bind(config: Config, storage: Arc<S>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            KvError::Network(format!("failed to bind {}: {}", config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            api: RawApi::new(storage),
            listener,
            shutdown: ShutdownHandle::default(),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Serve until shutdown is signalled (blocking)
    ///
    /// Returns after every worker has finished its current connection.
    pub fn run(&self) -> Result<()> {
        let addr = self.local_addr()?;
        tracing::info!(
            %addr,
            workers = self.config.worker_threads,
            max_connections = self.config.max_connections,
            "server listening"
        );

        let (tx, rx) = channel::unbounded::<TcpStream>();
        let workers = (0..self.config.worker_threads)
            .map(|id| self.spawn_worker(id, rx.clone()))
            .collect::<Result<Vec<_>>>()?;
        drop(rx);

        while !self.shutdown.is_shutdown() {
            let stream = match self.listener.accept() {
                Ok((stream, peer)) => {
                    tracing::trace!(%peer, "accepted connection");
                    stream
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("accept failed: {}", e);
                    continue;
                }
            };

            if let Err(e) = stream.set_nonblocking(false) {
                tracing::warn!("failed to configure connection: {}", e);
                continue;
            }

            if self.active.load(Ordering::SeqCst) >= self.config.max_connections {
                tracing::warn!(
                    max = self.config.max_connections,
                    "connection limit reached, rejecting client"
                );
                reject(stream);
                continue;
            }

            self.active.fetch_add(1, Ordering::SeqCst);
            if tx.send(stream).is_err() {
                self.active.fetch_sub(1, Ordering::SeqCst);
                tracing::error!("all workers exited, stopping server");
                break;
            }
        }

        tracing::info!("server shutting down");
        drop(tx);
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
        tracing::info!("server stopped");
        Ok(())
    }

    fn spawn_worker(&self, id: usize, rx: Receiver<TcpStream>) -> Result<JoinHandle<()>> {
        let api = self.api.clone();
        let active = Arc::clone(&self.active);
        let read_ms = self.config.read_timeout_ms;
        let write_ms = self.config.write_timeout_ms;

        thread::Builder::new()
            .name(format!("cfkv-worker-{}", id))
            .spawn(move || {
                for stream in rx.iter() {
                    serve(stream, api.clone(), read_ms, write_ms);
                    active.fetch_sub(1, Ordering::SeqCst);
                }
                tracing::trace!(worker = id, "worker exiting");
            })
            .map_err(KvError::from)
    }
}

fn serve<S: Storage>(stream: TcpStream, api: RawApi<S>, read_ms: u64, write_ms: u64) {
    let mut conn = match Connection::new(stream, api) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!("failed to set up connection: {}", e);
            return;
        }
    };

    if let Err(e) = conn.set_timeouts(read_ms, write_ms) {
        tracing::warn!(peer = conn.peer_addr(), "failed to set timeouts: {}", e);
        return;
    }

    if let Err(e) = conn.handle() {
        tracing::debug!(peer = conn.peer_addr(), "connection closed with error: {}", e);
    }
}

fn reject(stream: TcpStream) {
    let mut writer = BufWriter::new(stream);
    let _ = write_response(&mut writer, &Response::error("too many connections"));
}
