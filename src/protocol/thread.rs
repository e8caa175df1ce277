use std::{io, thread};

use log::{debug, error};

use super::ClientId;

/// One OS thread per connected client.
///
/// Owned by the accept loop. Finished threads are reaped on every spawn so the set only
/// grows with the number of live clients.
#[derive(Debug, Default)]
pub struct WorkerSet {
    workers: Vec<Worker>,
}

impl WorkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, id: ClientId, f: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.reap();

        let thread = thread::Builder::new()
            .name(format!("frost-client-{id}"))
            .spawn(f)?;
        self.workers.push(Worker { id, thread });
        Ok(())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.workers.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Waits for every worker to exit.
    pub fn join_all(&mut self) {
        for worker in self.workers.drain(..) {
            worker.join();
        }
    }

    fn reap(&mut self) {
        let (finished, running) = self
            .workers
            .drain(..)
            .partition::<Vec<_>, _>(|w| w.thread.is_finished());
        self.workers = running;

        for worker in finished {
            worker.join();
        }
    }
}

#[derive(Debug)]
struct Worker {
    id: ClientId,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn join(self) {
        match self.thread.join() {
            Ok(()) => debug!("worker for client id={} finished", self.id),
            Err(_) => error!("worker for client id={} panicked", self.id),
        }
    }
}
