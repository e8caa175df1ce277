use std::io::{self, BufRead, BufReader, Read, Write};

use thiserror::Error;

use crate::config::FrameLimits;

use super::{Element, Request, Response};

/// Longest header line (`*<count>`, `$<len>`, `:<n>`, reply status) accepted, without CRLF.
pub const MAX_LINE_LEN: usize = 64 * 1024;

// Caps the up-front allocation for a request array; the claimed count is not trusted.
const PREALLOC_ELEMENTS: usize = 16;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport io error: {0}")]
    Io(#[from] io::Error),
    #[error("stream ended in the middle of a frame")]
    Truncated,
    #[error("unknown element marker 0x{0:02x}")]
    UnknownMarker(u8),
    #[error("expected '{expected}' header, found 0x{found:02x}")]
    UnexpectedMarker { expected: char, found: u8 },
    #[error("malformed length '{0}'")]
    InvalidLength(String),
    #[error("array of {count} elements exceeds the limit of {max}")]
    TooManyElements { count: usize, max: usize },
    #[error("bulk string of {len} bytes exceeds the limit of {max}")]
    BulkTooLarge { len: usize, max: usize },
    #[error("request exceeds the limit of {max} bytes")]
    RequestTooLarge { max: usize },
    #[error("header line exceeds {0} bytes")]
    LineTooLong(usize),
    #[error("missing CRLF terminator")]
    MissingTerminator,
    #[error("malformed reply: {0}")]
    InvalidReply(String),
}

impl TransportError {
    /// True when the peer sent bytes that do not form a valid frame, as opposed to the
    /// transport itself failing.
    pub fn is_framing(&self) -> bool {
        !matches!(self, TransportError::Io(_))
    }

    fn from_read(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => TransportError::Truncated,
            _ => TransportError::Io(err),
        }
    }
}

/// Frames requests and replies over a byte stream.
///
/// The server side decodes with [`read_request`](Self::read_request) and answers with
/// [`write_response`](Self::write_response); a client uses the mirror pair
/// [`write_request`](Self::write_request) / [`read_response`](Self::read_response).
pub struct ProtocolTransport<T: Read + Write> {
    stream: BufReader<T>,
    limits: FrameLimits,
    out: Vec<u8>,
}

impl<T: Read + Write> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        Self::with_limits(stream, FrameLimits::default())
    }

    pub fn with_limits(stream: T, limits: FrameLimits) -> Self {
        Self {
            stream: BufReader::new(stream),
            limits,
            out: Vec::new(),
        }
    }

    pub fn get_ref(&self) -> &T {
        self.stream.get_ref()
    }

    /// Decodes the next request frame.
    ///
    /// Returns `Ok(None)` when the peer closed the stream before sending any byte of a new
    /// frame. A stream ending anywhere inside a frame is [`TransportError::Truncated`].
    pub fn read_request(&mut self) -> Result<Option<Request>, TransportError> {
        if self.stream.fill_buf()?.is_empty() {
            return Ok(None);
        }

        let line = self.read_line()?;
        let count = parse_length(&line, '*')?;
        if count > self.limits.max_elements {
            return Err(TransportError::TooManyElements {
                count,
                max: self.limits.max_elements,
            });
        }

        let mut elements = Vec::with_capacity(count.min(PREALLOC_ELEMENTS));
        let mut payload = 0usize;
        for _ in 0..count {
            let line = self.read_line()?;
            let element = match line.first() {
                Some(b'$') => {
                    let len = parse_length(&line, '$')?;
                    if len > self.limits.max_bulk_len {
                        return Err(TransportError::BulkTooLarge {
                            len,
                            max: self.limits.max_bulk_len,
                        });
                    }
                    payload = payload.saturating_add(len);
                    if payload > self.limits.max_request_bytes {
                        return Err(TransportError::RequestTooLarge {
                            max: self.limits.max_request_bytes,
                        });
                    }
                    Element::Bulk(self.read_payload(len)?)
                }
                Some(b':') => Element::Integer(parse_integer(&line[1..])?),
                Some(&marker) => return Err(TransportError::UnknownMarker(marker)),
                None => return Err(TransportError::InvalidLength(String::new())),
            };
            elements.push(element);
        }

        Ok(Some(Request::new(elements)))
    }

    /// Encodes `resp` in full before handing it to the stream in one write.
    pub fn write_response(&mut self, resp: &Response) -> Result<(), TransportError> {
        self.out.clear();
        resp.encode(&mut self.out);
        self.flush_out()
    }

    pub fn write_request(&mut self, req: &Request) -> Result<(), TransportError> {
        self.out.clear();
        req.encode(&mut self.out);
        self.flush_out()
    }

    pub fn read_response(&mut self) -> Result<Response, TransportError> {
        if self.stream.fill_buf()?.is_empty() {
            return Err(TransportError::Io(io::ErrorKind::UnexpectedEof.into()));
        }

        let line = self.read_line()?;
        match line.split_first() {
            Some((b'+', b"OK")) => Ok(Response::Ok),
            Some((b'_', [])) => Ok(Response::Null),
            Some((b'-', message)) => {
                let message = String::from_utf8_lossy(message);
                let message = message.strip_prefix("ERR ").unwrap_or(&message);
                Ok(Response::Err(message.to_string()))
            }
            Some((b'$', b"-1")) => Ok(Response::Null),
            Some((b'$', _)) => {
                let len = parse_length(&line, '$')?;
                if len > self.limits.max_bulk_len {
                    return Err(TransportError::BulkTooLarge {
                        len,
                        max: self.limits.max_bulk_len,
                    });
                }
                Ok(Response::Bulk(self.read_payload(len)?))
            }
            _ => Err(TransportError::InvalidReply(
                String::from_utf8_lossy(&line).into_owned(),
            )),
        }
    }

    fn flush_out(&mut self) -> Result<(), TransportError> {
        let stream = self.stream.get_mut();
        stream.write_all(&self.out)?;
        stream.flush()?;
        Ok(())
    }

    /// Reads one CRLF terminated line and strips the terminator.
    fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut line = Vec::new();
        let limit = (MAX_LINE_LEN + 2) as u64;
        (&mut self.stream)
            .take(limit)
            .read_until(b'\n', &mut line)
            .map_err(TransportError::from_read)?;

        if !line.ends_with(b"\n") {
            if line.len() as u64 >= limit {
                return Err(TransportError::LineTooLong(MAX_LINE_LEN));
            }
            return Err(TransportError::Truncated);
        }
        if !line.ends_with(b"\r\n") {
            return Err(TransportError::MissingTerminator);
        }
        line.truncate(line.len() - 2);
        Ok(line)
    }

    /// Reads exactly `len` payload bytes plus the trailing CRLF; short reads are retried.
    fn read_payload(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        let mut payload = vec![0; len + 2];
        self.stream
            .read_exact(&mut payload)
            .map_err(TransportError::from_read)?;

        if !payload.ends_with(b"\r\n") {
            return Err(TransportError::MissingTerminator);
        }
        payload.truncate(len);
        Ok(payload)
    }
}

/// Parses a `<marker><non-negative decimal>` header line.
fn parse_length(line: &[u8], marker: char) -> Result<usize, TransportError> {
    match line.split_first() {
        Some((&found, digits)) if found == marker as u8 => {
            let n = parse_integer(digits)?;
            usize::try_from(n).map_err(|_| lossy_length(digits))
        }
        Some((&found, _)) => Err(TransportError::UnexpectedMarker {
            expected: marker,
            found,
        }),
        None => Err(TransportError::InvalidLength(String::new())),
    }
}

fn parse_integer(digits: &[u8]) -> Result<i64, TransportError> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| lossy_length(digits))
}

fn lossy_length(digits: &[u8]) -> TransportError {
    TransportError::InvalidLength(String::from_utf8_lossy(digits).into_owned())
}
