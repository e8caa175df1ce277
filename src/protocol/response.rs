use std::fmt;

/// Typed reply produced by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `+OK\r\n`
    Ok,
    /// `$<len>\r\n<bytes>\r\n`
    Bulk(Vec<u8>),
    /// `_\r\n`
    Null,
    /// `-ERR <message>\r\n`
    Err(String),
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Err(message.into())
    }

    /// Appends the wire form of this reply to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Ok => buf.extend_from_slice(b"+OK\r\n"),
            Response::Bulk(bytes) => {
                buf.extend_from_slice(format!("${}\r\n", bytes.len()).as_bytes());
                buf.extend_from_slice(bytes);
                buf.extend_from_slice(b"\r\n");
            }
            Response::Null => buf.extend_from_slice(b"_\r\n"),
            Response::Err(message) => {
                buf.extend_from_slice(b"-ERR ");
                // Error replies are a single line.
                buf.extend(
                    message
                        .bytes()
                        .map(|b| if b == b'\r' || b == b'\n' { b' ' } else { b }),
                );
                buf.extend_from_slice(b"\r\n");
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok => write!(f, "OK"),
            Response::Bulk(bytes) => write!(f, "\"{}\"", String::from_utf8_lossy(bytes)),
            Response::Null => write!(f, "(nil)"),
            Response::Err(message) => write!(f, "(error) {message}"),
        }
    }
}
