//! Command dispatch.
//!
//! This module maps a decoded [`Request`] onto a [`Store`] operation and a typed
//! [`Response`]. It is the only place that knows which commands exist: adding one means a
//! new [`Command`] variant, a parse arm and an execute arm. The decoder, the encoder and the
//! connection lifecycle are untouched.
//!
//! # Overview
//!
//! | Command | Arguments  | Reply                                  |
//! |---------|------------|----------------------------------------|
//! | `GET`   | key        | bulk value, or null when the key is absent |
//! | `SET`   | key value  | `OK`                                   |
//!
//! Names match case-insensitively. Keys and values are binary-safe; integer elements are
//! taken as their decimal text. Arity problems are reported to the client as error replies
//! ([`ArgumentError`]); an empty request or a command name that is not a bulk string is a
//! [`CommandError`] and ends the connection.
//!
//! # Example
//! ```rust
//! use frost::command::{Dispatch, dispatch};
//! use frost::protocol::{Request, Response};
//! use frost::storage::Store;
//!
//! let store = Store::new();
//! let set = dispatch(&Request::from_args(["set", "foo", "bar"]), &store).unwrap();
//! assert_eq!(set, Dispatch::Reply(Response::Ok));
//!
//! let get = dispatch(&Request::from_args(["GET", "foo"]), &store).unwrap();
//! assert_eq!(get, Dispatch::Reply(Response::Bulk(b"bar".to_vec())));
//! ```
use thiserror::Error;

use crate::{
    protocol::{Element, Request, Response},
    storage::Store,
};

/// Requests that cannot be dispatched at all; the connection is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty request")]
    Empty,

    #[error("command name is not a bulk string")]
    InvalidName,
}

/// Problems with a recognised command's arguments; reported back to the client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get { key: Vec<u8> },
    Set { key: Vec<u8>, value: Vec<u8> },
}

/// What the dispatcher decided for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Reply(Response),
    /// No command by that name; the caller picks the reply.
    Unrecognized(String),
}

impl Command {
    /// Parses the arguments of command `name`. `None` means the name is not a known command.
    pub fn parse(name: &[u8], args: &[Element]) -> Option<Result<Command, ArgumentError>> {
        let command = match name.to_ascii_lowercase().as_slice() {
            b"get" => parse_args::<1>("get", args).map(|[key]| Command::Get { key }),
            b"set" => parse_args::<2>("set", args).map(|[key, value]| Command::Set { key, value }),
            _ => return None,
        };
        Some(command)
    }

    pub fn execute(self, store: &Store) -> Response {
        match self {
            Command::Get { key } => match store.get(&key) {
                Some(value) => Response::Bulk(value),
                None => Response::Null,
            },
            Command::Set { key, value } => {
                store.set(key, value);
                Response::Ok
            }
        }
    }
}

pub fn dispatch(request: &Request, store: &Store) -> Result<Dispatch, CommandError> {
    let (name, args) = request
        .elements()
        .split_first()
        .ok_or(CommandError::Empty)?;
    let name = name.as_bulk().ok_or(CommandError::InvalidName)?;

    let reply = match Command::parse(name, args) {
        None => {
            let name = String::from_utf8_lossy(name).into_owned();
            return Ok(Dispatch::Unrecognized(name));
        }
        Some(Ok(command)) => command.execute(store),
        Some(Err(e)) => Response::error(e.to_string()),
    };
    Ok(Dispatch::Reply(reply))
}

/// Takes exactly `N` arguments as owned byte strings.
fn parse_args<const N: usize>(
    command: &'static str,
    args: &[Element],
) -> Result<[Vec<u8>; N], ArgumentError> {
    let args: &[Element; N] = args
        .try_into()
        .map_err(|_| ArgumentError::WrongArity(command))?;

    Ok(std::array::from_fn(|i| args[i].to_bytes().into_owned()))
}
