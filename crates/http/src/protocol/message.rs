use bytes::{Buf, Bytes};

/// A unit of the HTTP message stream: either a header block or a piece of
/// payload.
///
/// The request decoder produces one `Header` per request followed by zero or
/// more `Payload` items; the response encoder consumes messages in the same
/// order. `T` is the header type, `D` the payload data type.
pub enum Message<T, D: Buf = Bytes> {
    Header(T),
    Payload(PayloadItem<D>),
}

/// One item of a message payload: a chunk of data or the end-of-body marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<D: Buf = Bytes> {
    Chunk(D),
    /// End of the body. For chunked bodies this is produced only after the
    /// `0\r\n\r\n` terminator has been consumed (decode side) or causes it to
    /// be written (encode side).
    Eof,
}

/// How a message body is framed on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Fixed length, always non-zero; zero-length bodies are normalized to
    /// [`PayloadSize::Empty`] when the headers are parsed.
    Length(u64),
    /// Chunked transfer-coding.
    Chunked,
    /// No body at all.
    Empty,
}

impl PayloadSize {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }
}

impl<T> Message<T> {
    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }

    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    /// Returns the payload item, or `None` for a header message.
    pub fn into_payload_item(self) -> Option<PayloadItem> {
        match self {
            Message::Header(_) => None,
            Message::Payload(item) => Some(item),
        }
    }
}

impl<D: Buf> PayloadItem<D> {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}
