use std::{
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU8, Ordering},
    },
    time::Duration,
};

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::{config::ServerConfig, storage::Store};

use super::{
    connection::serve_client,
    registry::{self, ClientRegistry},
    thread::WorkerSet,
};

const NOT_STARTED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server already started")]
    AlreadyStarted,
    #[error("server not started")]
    NotStarted,
    #[error("server already stopping or stopped")]
    AlreadyStopped,
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

/// State every connection worker reads.
pub(crate) struct Shared {
    pub(crate) store: Arc<Store>,
    pub(crate) registry: ClientRegistry,
    pub(crate) config: ServerConfig,
}

/// Key-value server bound to one listener.
///
/// [`start`](Self::start) runs the accept loop on the calling thread until
/// [`stop`](Self::stop) is called from another one. Each may succeed once.
pub struct Server {
    address: SocketAddr,
    state: AtomicU8,
    listener: Mutex<Option<TcpListener>>,
    listener_closed: (Mutex<bool>, Condvar),
    shared: Arc<Shared>,
}

impl Server {
    pub fn new(listener: TcpListener, config: ServerConfig) -> io::Result<Self> {
        Self::with_store(listener, Arc::new(Store::new()), config)
    }

    pub fn bind<A: ToSocketAddrs>(address: A, config: ServerConfig) -> io::Result<Self> {
        Self::new(TcpListener::bind(address)?, config)
    }

    /// Serves an existing store, e.g. one shared with the embedding process.
    pub fn with_store(
        listener: TcpListener,
        store: Arc<Store>,
        config: ServerConfig,
    ) -> io::Result<Self> {
        Ok(Self {
            address: listener.local_addr()?,
            state: AtomicU8::new(NOT_STARTED),
            listener: Mutex::new(Some(listener)),
            listener_closed: (Mutex::new(false), Condvar::new()),
            shared: Arc::new(Shared {
                store,
                registry: ClientRegistry::new(),
                config,
            }),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.shared.store
    }

    /// Number of clients currently tracked.
    pub fn clients(&self) -> usize {
        self.shared.registry.len()
    }

    /// Accepts clients until stopped.
    ///
    /// Returns `Ok(())` after a [`stop`](Self::stop) and once every worker has exited, or
    /// [`ServerError::Accept`] if the listener fails on its own.
    pub fn start(&self) -> Result<(), ServerError> {
        self.state
            .compare_exchange(NOT_STARTED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ServerError::AlreadyStarted)?;

        let listener = lock(&self.listener)
            .take()
            .ok_or(ServerError::AlreadyStarted)?;
        info!("listening at {}", self.address);

        let mut workers = WorkerSet::new();
        let res = self.accept_loop(&listener, &mut workers);

        drop(listener);
        let (closed, signal) = &self.listener_closed;
        *lock(closed) = true;
        signal.notify_all();

        match &res {
            Ok(()) => {
                workers.join_all();
                info!("server stopped");
            }
            Err(e) => error!("accept loop failed err={e}"),
        }
        res
    }

    fn accept_loop(
        &self,
        listener: &TcpListener,
        workers: &mut WorkerSet,
    ) -> Result<(), ServerError> {
        let registry = &self.shared.registry;

        loop {
            let (stream, peer) = match listener.accept() {
                Ok(conn) => conn,
                Err(_) if registry.is_shutting_down() => return Ok(()),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    warn!("broken connection: {e}");
                    continue;
                }
                Err(e) => return Err(ServerError::Accept(e)),
            };

            let id = match registry.register(&stream) {
                Ok(Some(id)) => id,
                Ok(None) => {
                    debug!("shutting down, dropping connection peer={peer}");
                    return Ok(());
                }
                Err(e) => {
                    warn!("failed to track connection peer={peer} err={e}");
                    continue;
                }
            };

            let shared = Arc::clone(&self.shared);
            if let Err(e) = workers.spawn(id, move || serve_client(id, stream, peer, &shared)) {
                error!("failed to spawn worker id={id} err={e}");
                if let Some(handle) = registry.deregister(id) {
                    if let Err(e) = registry::close(&handle) {
                        warn!("failed to close client id={id} err={e}");
                    }
                }
            }
        }
    }

    /// Closes every client and the listener.
    ///
    /// Only the first call after [`start`](Self::start) does anything; once the sweep has
    /// run it reports success even if the listener could not be closed cleanly.
    ///
    /// The blocked `accept` is woken by a loopback connection to the bound address. If
    /// that connection cannot be made (a firewall dropping loopback traffic, or a bind
    /// address unreachable from this host) the listener stays open until the next client
    /// arrives, which is then dropped. `stop` gives up waiting after the configured
    /// shutdown timeout and logs an error.
    pub fn stop(&self) -> Result<(), ServerError> {
        self.state
            .compare_exchange(RUNNING, STOPPED, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|current| match current {
                NOT_STARTED => ServerError::NotStarted,
                _ => ServerError::AlreadyStopped,
            })?;

        let closed = self.shared.registry.shutdown_sweep();
        info!("closed clients count={closed}");

        self.close_listener();
        Ok(())
    }

    /// Wakes the accept loop, which sees the shutdown flag and drops the listener, then
    /// waits for it to report back.
    fn close_listener(&self) {
        if let Err(e) = TcpStream::connect_timeout(&wake_address(self.address), WAKE_TIMEOUT) {
            debug!("wake-up connection failed err={e}");
        }

        let (closed, signal) = &self.listener_closed;
        let guard = lock(closed);
        let (_guard, timeout) = signal
            .wait_timeout_while(guard, self.shared.config.shutdown_timeout, |closed| !*closed)
            .unwrap_or_else(PoisonError::into_inner);
        if timeout.timed_out() {
            error!("listener did not close address={}", self.address);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// A wildcard bind is reachable through loopback of the same family.
fn wake_address(address: SocketAddr) -> SocketAddr {
    match address.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(Ipv4Addr::LOCALHOST.into(), address.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(Ipv6Addr::LOCALHOST.into(), address.port())
        }
        _ => address,
    }
}
