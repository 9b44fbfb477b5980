// ── UDP server ──
//
// Owns the listening sockets and the background tasks. Each datagram is
// handled in its own tracked task, so a slow store lookup never blocks the
// receive loop and a panicking handler never takes the listener down.
// Shutdown drains those tasks before returning.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use radvlan_proto::MAX_PACKET_LEN;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::audit::AuditLogger;
use crate::clients::ClientRegistry;
use crate::config::ServerConfig;
use crate::dedup::ReplayCache;
use crate::error::CoreError;
use crate::handler::{AcctHandler, AuthHandler, DatagramHandler};
use crate::resolve::Resolver;
use crate::store::{AuditSink, PolicyStore};
use crate::transmit::Transmitter;

/// Floor for the replay-cache sweep period.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Store lookups one request can make: exact, prefix, default.
const LOOKUPS_PER_REQUEST: u32 = 3;

/// A bound, not-yet-running server.
///
/// Cheaply cloneable via `Arc<ServerInner>`. [`start`](Self::start)
/// spawns the receive loops; [`shutdown`](Self::shutdown) cancels them,
/// waits for them to exit, then drains requests still in flight.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    config: ServerConfig,
    auth_socket: Arc<UdpSocket>,
    acct_socket: Option<Arc<UdpSocket>>,
    auth_handler: Arc<AuthHandler>,
    acct_handler: Option<Arc<AcctHandler>>,
    replay: Arc<ReplayCache>,
    cancel: CancellationToken,
    started: AtomicBool,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    in_flight: TaskTracker,
}

impl Server {
    /// Bind the listeners and wire the pipeline. Does NOT start receiving.
    pub async fn bind(
        config: ServerConfig,
        registry: ClientRegistry,
        store: Arc<dyn PolicyStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, CoreError> {
        let registry = Arc::new(registry);
        let auth_socket = Arc::new(bind_udp(config.auth_addr()).await?);
        let acct_socket = match config.acct_addr() {
            Some(addr) => Some(Arc::new(bind_udp(addr).await?)),
            None => None,
        };

        let replay = Arc::new(ReplayCache::new(config.dedup_window));
        let auth_handler = Arc::new(AuthHandler::new(
            Arc::clone(&registry),
            Resolver::new(store, config.lookup_timeout),
            AuditLogger::new(audit, config.audit_timeout),
            Arc::clone(&replay),
            Transmitter::new(auth_socket.clone()),
        ));
        let acct_handler = acct_socket.as_ref().map(|socket| {
            Arc::new(AcctHandler::new(
                Arc::clone(&registry),
                Transmitter::new(socket.clone()),
            ))
        });

        Ok(Self {
            inner: Arc::new(ServerInner {
                config,
                auth_socket,
                acct_socket,
                auth_handler,
                acct_handler,
                replay,
                cancel: CancellationToken::new(),
                started: AtomicBool::new(false),
                task_handles: Mutex::new(Vec::new()),
                in_flight: TaskTracker::new(),
            }),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Actual authentication address (resolves port 0).
    pub fn auth_addr(&self) -> Result<SocketAddr, CoreError> {
        local_addr(&self.inner.auth_socket)
    }

    pub fn acct_addr(&self) -> Result<Option<SocketAddr>, CoreError> {
        self.inner
            .acct_socket
            .as_ref()
            .map(|s| local_addr(s))
            .transpose()
    }

    /// Token that stops the server when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the receive loops and the replay-cache sweeper.
    ///
    /// Only the first call does anything; later calls are ignored.
    pub async fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            warn!("server already started");
            return;
        }
        let mut handles = self.inner.task_handles.lock().await;
        let cancel = self.inner.cancel.clone();

        let auth: Arc<dyn DatagramHandler> = self.inner.auth_handler.clone();
        handles.push(tokio::spawn(receive_loop(
            "auth",
            Arc::clone(&self.inner.auth_socket),
            auth,
            self.inner.in_flight.clone(),
            cancel.clone(),
        )));

        if let (Some(socket), Some(handler)) = (&self.inner.acct_socket, &self.inner.acct_handler) {
            let acct: Arc<dyn DatagramHandler> = handler.clone();
            handles.push(tokio::spawn(receive_loop(
                "acct",
                Arc::clone(socket),
                acct,
                self.inner.in_flight.clone(),
                cancel.clone(),
            )));
        }

        if self.inner.replay.is_enabled() {
            handles.push(tokio::spawn(sweep_task(
                Arc::clone(&self.inner.replay),
                cancel,
            )));
        }

        info!(
            auth = %self.inner.config.auth_addr(),
            acct = ?self.inner.config.acct_addr(),
            "radius listeners running"
        );
    }

    /// Start, then run until the cancel token fires.
    pub async fn run(&self) {
        self.start().await;
        self.inner.cancel.cancelled().await;
        self.shutdown().await;
    }

    /// Cancel background tasks, then wait for in-flight requests to finish
    /// their reply and audit write.
    ///
    /// The drain is bounded by the worst case for one request; anything
    /// still running after that is abandoned.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        let tracker = &self.inner.in_flight;
        tracker.close();
        let pending = tracker.len();
        if pending > 0 {
            debug!(pending, "draining in-flight requests");
        }
        if tokio::time::timeout(self.drain_timeout(), tracker.wait())
            .await
            .is_err()
        {
            warn!(
                abandoned = tracker.len(),
                "in-flight requests did not finish before shutdown"
            );
        }
        debug!("server stopped");
    }

    fn drain_timeout(&self) -> Duration {
        let config = &self.inner.config;
        config
            .lookup_timeout
            .saturating_mul(LOOKUPS_PER_REQUEST)
            .saturating_add(config.audit_timeout)
    }
}

async fn bind_udp(addr: SocketAddr) -> Result<UdpSocket, CoreError> {
    UdpSocket::bind(addr)
        .await
        .map_err(|source| CoreError::Bind { addr, source })
}

fn local_addr(socket: &UdpSocket) -> Result<SocketAddr, CoreError> {
    socket.local_addr().map_err(|e| CoreError::Config {
        message: format!("socket has no local address: {e}"),
    })
}

// ── Background tasks ─────────────────────────────────────────────────

async fn receive_loop(
    listener: &'static str,
    socket: Arc<UdpSocket>,
    handler: Arc<dyn DatagramHandler>,
    in_flight: TaskTracker,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; MAX_PACKET_LEN];
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, source)) => {
                    let datagram = buf[..len].to_vec();
                    let handler = Arc::clone(&handler);
                    in_flight.spawn(async move {
                        let disposition = handler.handle(&datagram, source).await;
                        trace!(listener, %source, ?disposition, "datagram handled");
                    });
                }
                Err(e) => warn!(listener, error = %e, "receive failed"),
            },
        }
    }
    debug!(listener, "receive loop exiting");
}

async fn sweep_task(replay: Arc<ReplayCache>, cancel: CancellationToken) {
    let period = replay.window().max(MIN_SWEEP_INTERVAL);
    let mut interval = tokio::time::interval(period);
    interval.tick().await;
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let removed = replay.sweep(Instant::now());
                if removed > 0 {
                    trace!(removed, remaining = replay.len(), "replay cache swept");
                }
            }
        }
    }
}
