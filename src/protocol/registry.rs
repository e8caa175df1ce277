use std::{
    collections::HashMap,
    io,
    net::{Shutdown, TcpStream},
    sync::{Mutex, MutexGuard, PoisonError},
};

use log::{debug, warn};

pub type ClientId = u64;

#[derive(Debug, Default)]
struct RegistryState {
    next_id: ClientId,
    clients: HashMap<ClientId, TcpStream>,
    shutting_down: bool,
}

/// Authoritative record of open client connections.
///
/// Every mutation happens under one mutex. A handle leaves the map exactly once, either
/// through [`deregister`](Self::deregister) or [`shutdown_sweep`](Self::shutdown_sweep),
/// and whoever removes it is the one that closes it.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    state: Mutex<RegistryState>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks `stream` under a fresh id.
    ///
    /// Returns `Ok(None)` once shutdown has begun; the caller must close the stream itself.
    pub fn register(&self, stream: &TcpStream) -> io::Result<Option<ClientId>> {
        let handle = stream.try_clone()?;
        let mut state = self.lock();
        if state.shutting_down {
            return Ok(None);
        }

        state.next_id += 1;
        let id = state.next_id;
        state.clients.insert(id, handle);
        Ok(Some(id))
    }

    /// Removes `id` if it is still tracked. `Some` hands the close over to the caller.
    pub fn deregister(&self, id: ClientId) -> Option<TcpStream> {
        self.lock().clients.remove(&id)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    /// Refuses further registrations, then closes and forgets every tracked client.
    ///
    /// Returns the number of connections closed. Close failures are logged and skipped.
    pub fn shutdown_sweep(&self) -> usize {
        let mut state = self.lock();
        state.shutting_down = true;

        let mut closed = 0;
        for (id, stream) in state.clients.drain() {
            match close(&stream) {
                Ok(()) => debug!("closed client id={id}"),
                Err(e) => warn!("failed to close client id={id} err={e}"),
            }
            closed += 1;
        }
        closed
    }

    pub fn len(&self) -> usize {
        self.lock().clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shuts both directions down, waking any thread blocked on the socket.
pub(crate) fn close(stream: &TcpStream) -> io::Result<()> {
    match stream.shutdown(Shutdown::Both) {
        // The peer may already have torn the socket down.
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
        res => res,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Read,
        net::{TcpListener, TcpStream},
    };

    use super::*;

    fn pair(listener: &TcpListener) -> (TcpStream, TcpStream) {
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn ids_increase_monotonically() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let registry = ClientRegistry::new();
        let (_c1, s1) = pair(&listener);
        let (_c2, s2) = pair(&listener);

        let first = registry.register(&s1).unwrap().unwrap();
        let second = registry.register(&s2).unwrap().unwrap();

        assert!(second > first);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn deregister_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let registry = ClientRegistry::new();
        let (_client, server) = pair(&listener);

        let id = registry.register(&server).unwrap().unwrap();

        assert!(registry.deregister(id).is_some());
        assert!(registry.deregister(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn sweep_closes_clients_and_blocks_registration() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let registry = ClientRegistry::new();
        let (mut client, server) = pair(&listener);
        let id = registry.register(&server).unwrap().unwrap();

        assert_eq!(registry.shutdown_sweep(), 1);
        assert!(registry.is_shutting_down());
        assert!(registry.deregister(id).is_none());

        let mut buf = [0u8; 8];
        assert_eq!(client.read(&mut buf).unwrap(), 0);

        let (_late_client, late) = pair(&listener);
        assert!(registry.register(&late).unwrap().is_none());
        assert!(registry.is_empty());
    }
}
