pub mod cli;
pub mod command;
pub mod config;
pub mod protocol;
pub mod storage;

pub use cli::{Input, prompt};
pub use command::{Command, Dispatch, dispatch};
pub use config::{FrameLimits, ServerConfig};
pub use protocol::{Server, ServerError};
pub use storage::Store;
