use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use tokio::io::AsyncWrite;

use crate::protocol::body::body_channel::{body_channel, BodyReceiver, BodySender};
use crate::protocol::{Message, ParseError, PayloadSize, RequestHeader};

/// The request body handed to a handler.
///
/// Implements [`http_body::Body`]; polling it pulls decoded payload items
/// from the connection one at a time. Requests without a body read as an
/// immediate end-of-stream.
pub struct ReqBody {
    repr: Repr,
}

enum Repr {
    NoBody,
    Receiver(BodyReceiver),
}

impl ReqBody {
    /// Builds the body handle for one request, plus the connection-side
    /// sender when the request actually carries a body.
    ///
    /// `continue_writer` is `Some` when the request sent
    /// `Expect: 100-continue`; the sender emits the interim response before
    /// the first pulled item.
    pub(crate) fn channel<'conn, S, W>(
        payload_stream: &'conn mut S,
        continue_writer: Option<&'conn mut W>,
        payload_size: PayloadSize,
    ) -> (ReqBody, Option<BodySender<'conn, S, W>>)
    where
        S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
        W: AsyncWrite + Unpin,
    {
        match payload_size {
            PayloadSize::Empty => (ReqBody { repr: Repr::NoBody }, None),
            _ => {
                let (sender, receiver) = body_channel(payload_stream, continue_writer, payload_size);
                (ReqBody { repr: Repr::Receiver(receiver) }, Some(sender))
            }
        }
    }

    /// A body that is already at end-of-stream.
    pub fn empty() -> Self {
        Self { repr: Repr::NoBody }
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().repr {
            Repr::NoBody => Poll::Ready(None),
            Repr::Receiver(receiver) => Pin::new(receiver).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.repr {
            Repr::NoBody => true,
            Repr::Receiver(receiver) => receiver.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.repr {
            Repr::NoBody => SizeHint::with_exact(0),
            Repr::Receiver(receiver) => receiver.size_hint(),
        }
    }
}
