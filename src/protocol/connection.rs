use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpStream},
};

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::{
    command::{CommandError, Dispatch, dispatch},
    storage::Store,
};

use super::{
    ClientId, ProtocolTransport, Response,
    registry::{self, ClientRegistry},
    server::Shared,
    transport::TransportError,
};

/// Why a connection loop ended early.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Reads, dispatches and answers requests until the peer leaves or misbehaves.
///
/// A clean end of stream returns `Ok(())`. Argument errors are answered on the wire and
/// the loop continues; anything else ends it.
pub fn serve<T: Read + Write>(
    transport: &mut ProtocolTransport<T>,
    store: &Store,
) -> Result<(), ConnectionError> {
    while let Some(request) = transport.read_request()? {
        debug!("received request: {request:?}");

        let reply = match dispatch(&request, store)? {
            Dispatch::Reply(reply) => reply,
            Dispatch::Unrecognized(name) => {
                debug!("unknown command name={name}");
                Response::error(format!("unknown command '{name}'"))
            }
        };

        transport.write_response(&reply)?;
    }
    Ok(())
}

/// Runs one client to completion, then takes it out of the registry.
pub(crate) fn serve_client(id: ClientId, stream: TcpStream, peer: SocketAddr, shared: &Shared) {
    info!("client connected id={id} peer={peer}");

    if let Err(e) = stream
        .set_read_timeout(shared.config.read_timeout)
        .and_then(|_| stream.set_write_timeout(shared.config.write_timeout))
    {
        warn!("failed to set deadlines id={id} err={e}");
    }

    let mut transport = ProtocolTransport::with_limits(stream, shared.config.limits);
    match serve(&mut transport, &shared.store) {
        Ok(()) => debug!("client closed the stream id={id}"),
        Err(ConnectionError::Transport(e)) if e.is_framing() => {
            error!("framing error id={id} err={e}")
        }
        Err(e) => debug!("connection ended id={id} err={e}"),
    }

    disconnect(id, &shared.registry);
}

/// Check-and-remove under the registry lock; only the side that removes the handle closes it.
fn disconnect(id: ClientId, registry: &ClientRegistry) {
    match registry.deregister(id) {
        Some(handle) => {
            if let Err(e) = registry::close(&handle) {
                warn!("failed to close client id={id} err={e}");
            }
            info!("client disconnected id={id}");
        }
        None => debug!("client already closed by shutdown id={id}"),
    }
}
