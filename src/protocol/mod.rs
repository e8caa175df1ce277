//! Client-server networking.
//!
//! This module carries everything between a TCP socket and the [`Store`](crate::storage::Store):
//! the wire codec, the per-connection worker, the client registry and the server lifecycle.
//!
//! # Wire Format
//!
//! Requests are arrays of length-prefixed, binary-safe strings:
//!
//! ```text
//! *<count>\r\n
//! $<len>\r\n<len bytes>\r\n      (repeated count times)
//! ```
//!
//! Integer elements (`:<n>\r\n`) are accepted as well. Replies take one of four shapes:
//!
//! - `+OK\r\n` for success
//! - `$<len>\r\n<bytes>\r\n` for a value
//! - `_\r\n` for a missing value
//! - `-ERR <message>\r\n` for an error
//!
//! Counts and lengths are bounded by [`FrameLimits`](crate::config::FrameLimits); a frame that
//! breaks a bound, or ends early, only closes the offending connection.
//!
//! # Key Components
//!
//! - [`Server`]: Owns the listener; `start` runs the accept loop, `stop` tears everything down.
//! - [`ClientRegistry`]: Tracks open connections so shutdown can close each exactly once.
//! - [`ProtocolTransport`]: Decodes requests from, and encodes replies onto, a byte stream.
//! - [`serve`]: The read, dispatch, write loop run for every client.
//!
//! # See Also
//!
//! - [`command`](crate::command): Maps decoded requests onto store operations.
mod connection;
mod registry;
mod request;
mod response;
mod server;
mod thread;
mod transport;

pub use connection::{ConnectionError, serve};
pub use registry::{ClientId, ClientRegistry};
pub use request::{Element, Request};
pub use response::Response;
pub use server::{Server, ServerError};
pub use transport::{MAX_LINE_LEN, ProtocolTransport, TransportError};
