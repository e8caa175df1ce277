use std::borrow::Cow;

/// A single entry of a request array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// `$<len>\r\n<bytes>\r\n`
    Bulk(Vec<u8>),
    /// `:<n>\r\n`
    Integer(i64),
}

impl Element {
    /// The element as text, if it is a UTF-8 bulk string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Element::Bulk(bytes) => std::str::from_utf8(bytes).ok(),
            Element::Integer(_) => None,
        }
    }

    /// The raw bytes of a bulk string.
    pub fn as_bulk(&self) -> Option<&[u8]> {
        match self {
            Element::Bulk(bytes) => Some(bytes),
            Element::Integer(_) => None,
        }
    }

    /// The element as an argument value; integers are rendered in decimal.
    pub fn to_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Element::Bulk(bytes) => Cow::Borrowed(bytes),
            Element::Integer(n) => Cow::Owned(n.to_string().into_bytes()),
        }
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Element::Bulk(bytes) => {
                buf.extend_from_slice(format!("${}\r\n", bytes.len()).as_bytes());
                buf.extend_from_slice(bytes);
                buf.extend_from_slice(b"\r\n");
            }
            Element::Integer(n) => buf.extend_from_slice(format!(":{n}\r\n").as_bytes()),
        }
    }
}

/// One decoded frame: the command name followed by its arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    elements: Vec<Element>,
}

impl Request {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    /// Builds a request made only of bulk strings, e.g. `["SET", "foo", "bar"]`.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let elements = args
            .into_iter()
            .map(|arg| Element::Bulk(arg.as_ref().to_vec()))
            .collect();
        Self { elements }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Appends the wire form, `*<count>\r\n` followed by every element.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(format!("*{}\r\n", self.elements.len()).as_bytes());
        for element in &self.elements {
            element.encode(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_set_request() {
        let mut buf = Vec::new();
        Request::from_args(["SET", "foo", "bar"]).encode(&mut buf);

        assert_eq!(buf, b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
    }

    #[test]
    fn encode_mixed_elements() {
        let mut buf = Vec::new();
        Request::new(vec![Element::Bulk(b"SET".to_vec()), Element::Integer(-7)]).encode(&mut buf);

        assert_eq!(buf, b"*2\r\n$3\r\nSET\r\n:-7\r\n");
    }

    #[test]
    fn element_text() {
        assert_eq!(Element::Bulk(b"get".to_vec()).as_str(), Some("get"));
        assert_eq!(Element::Integer(12).as_str(), None);
        assert_eq!(Element::Integer(12).to_bytes().into_owned(), b"12".to_vec());
        assert_eq!(Element::Bulk(vec![0xff, 0xfe]).as_str(), None);
        assert_eq!(
            Element::Bulk(vec![0xff, 0xfe]).to_bytes().into_owned(),
            vec![0xff, 0xfe]
        );
        assert_eq!(Element::Integer(3).as_bulk(), None);
    }
}
