//! Server tunables.
//!
//! [`ServerConfig`] gathers the limits and deadlines applied to every client connection.
//! The defaults are safe for a public listener; the `frost_server` binary exposes each of
//! them as a command line flag.
use std::time::Duration;

pub const DEFAULT_MAX_ELEMENTS: usize = 1024;
pub const DEFAULT_MAX_BULK_LEN: usize = 8 * 1024 * 1024;
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bounds enforced while decoding a single request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Largest array count accepted in a `*<count>` header.
    pub max_elements: usize,
    /// Largest length accepted in a `$<len>` header.
    pub max_bulk_len: usize,
    /// Largest sum of bulk payload bytes in one request.
    pub max_request_bytes: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_elements: DEFAULT_MAX_ELEMENTS,
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub limits: FrameLimits,
    /// Idle deadline for reading the next frame; `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Deadline for flushing one reply; `None` waits forever.
    pub write_timeout: Option<Duration>,
    /// How long `stop` waits for the accept loop to release the listener.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            limits: FrameLimits::default(),
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn with_limits(mut self, limits: FrameLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = non_zero(timeout);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = non_zero(timeout);
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// Sockets reject a zero timeout, treat it as "no deadline".
fn non_zero(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|t| !t.is_zero())
}
