use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{Sink, Stream, StreamExt};
use http_body::{Body, Frame, SizeHint};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{error, trace};

use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

const CHANNEL_DEPTH: usize = 8;
const CONTINUE_LINE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

pub(crate) fn body_channel<'conn, S, W>(
    payload_stream: &'conn mut S,
    continue_writer: Option<&'conn mut W>,
    payload_size: PayloadSize,
) -> (BodySender<'conn, S, W>, BodyReceiver)
where
    S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
    W: AsyncWrite + Unpin,
{
    let (signal_sender, signal_receiver) = mpsc::channel(CHANNEL_DEPTH);
    let (data_sender, data_receiver) = mpsc::channel(CHANNEL_DEPTH);

    let sender = BodySender {
        payload_stream,
        signal_receiver,
        data_sender,
        continue_writer: continue_writer.map(|writer| ContinueState { writer, wrote: false }),
        state: SenderState::Active,
    };

    (sender, BodyReceiver::new(signal_sender, data_receiver, payload_size))
}

/// One pull request from the receiving half.
pub(crate) struct BodySignal;

#[derive(PartialEq, Eq)]
enum SenderState {
    Active,
    Eof,
    Failed,
}

struct ContinueState<'conn, W> {
    writer: &'conn mut W,
    wrote: bool,
}

/// Connection-side half of the body channel.
///
/// Holds the framed reader borrow for one request cycle and feeds payload
/// items to the matching [`BodyReceiver`] one pull signal at a time.
pub(crate) struct BodySender<'conn, S, W> {
    payload_stream: &'conn mut S,
    signal_receiver: mpsc::Receiver<BodySignal>,
    data_sender: mpsc::Sender<Result<PayloadItem, ParseError>>,
    continue_writer: Option<ContinueState<'conn, W>>,
    state: SenderState,
}

impl<S, W> BodySender<'_, S, W>
where
    S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Services pull signals until the body ends, the handler drops its body
    /// handle, or a decode error occurs. Runs concurrently with the handler.
    pub(crate) async fn send_body(&mut self) {
        while let Some(BodySignal) = self.signal_receiver.next().await {
            if let Err(e) = self.write_continue().await {
                error!("failed to write 100 continue: {}", e);
                let _ = self.data_sender.try_send(Err(ParseError::io(e)));
                self.state = SenderState::Failed;
                return;
            }

            match self.read_item().await {
                Ok(item) => {
                    let eof = item.is_eof();
                    if self.data_sender.try_send(Ok(item)).is_err() {
                        // handler dropped the body handle; stop serving pulls
                        return;
                    }
                    if eof {
                        self.state = SenderState::Eof;
                        return;
                    }
                }
                Err(e) => {
                    let _ = self.data_sender.try_send(Err(e));
                    self.state = SenderState::Failed;
                    return;
                }
            }
        }
    }

    /// Reads and discards payload items through `Eof` so the framed reader is
    /// positioned at the start of the next request.
    pub(crate) async fn skip_body(&mut self) -> Result<(), ParseError> {
        match self.state {
            SenderState::Eof => return Ok(()),
            SenderState::Failed => {
                return Err(ParseError::invalid_body("body stream failed before it was drained"));
            }
            SenderState::Active => {}
        }

        loop {
            match self.read_item().await {
                Ok(item) if item.is_eof() => {
                    self.state = SenderState::Eof;
                    return Ok(());
                }
                Ok(item) => {
                    trace!(discarded = item.as_bytes().map(|b| b.len()).unwrap_or(0), "skipped unread body bytes");
                }
                Err(e) => {
                    self.state = SenderState::Failed;
                    return Err(e);
                }
            }
        }
    }

    /// Emits `HTTP/1.1 100 Continue` once, before the first body byte is
    /// pulled. No-op without an `Expect: 100-continue` request.
    async fn write_continue(&mut self) -> std::io::Result<()> {
        if let Some(state) = &mut self.continue_writer {
            if !state.wrote {
                state.writer.write_all(CONTINUE_LINE).await?;
                state.writer.flush().await?;
                state.wrote = true;
                trace!("sent 100 continue interim response");
            }
        }
        Ok(())
    }

    async fn read_item(&mut self) -> Result<PayloadItem, ParseError> {
        match self.payload_stream.next().await {
            Some(Ok(Message::Payload(item))) => Ok(item),
            Some(Ok(Message::Header(_))) => {
                error!("received a header frame while reading a request body");
                Err(ParseError::invalid_body("expected body payload, found request header"))
            }
            Some(Err(e)) => Err(e),
            None => Err(ParseError::invalid_body("connection closed while reading request body")),
        }
    }
}

/// Handler-side half of the body channel.
///
/// Each `poll_frame` sends one pull signal and waits for the matching item;
/// the sender never decodes ahead of the handler.
#[derive(Debug)]
pub(crate) struct BodyReceiver {
    signal_sender: mpsc::Sender<BodySignal>,
    data_receiver: mpsc::Receiver<Result<PayloadItem, ParseError>>,
    payload_size: PayloadSize,
    in_flight: bool,
    finished: bool,
}

impl BodyReceiver {
    fn new(
        signal_sender: mpsc::Sender<BodySignal>,
        data_receiver: mpsc::Receiver<Result<PayloadItem, ParseError>>,
        payload_size: PayloadSize,
    ) -> Self {
        Self { signal_sender, data_receiver, payload_size, in_flight: false, finished: false }
    }
}

impl Body for BodyReceiver {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if this.finished {
            return Poll::Ready(None);
        }

        if !this.in_flight {
            match Pin::new(&mut this.signal_sender).poll_ready(cx) {
                Poll::Ready(Ok(())) => {
                    if Pin::new(&mut this.signal_sender).start_send(BodySignal).is_err() {
                        return Poll::Ready(Some(Err(ParseError::invalid_body("body pull channel closed"))));
                    }
                    this.in_flight = true;
                }
                Poll::Ready(Err(_)) => {
                    return Poll::Ready(Some(Err(ParseError::invalid_body("body pull channel closed"))));
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        match this.data_receiver.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(PayloadItem::Chunk(bytes)))) => {
                this.in_flight = false;
                Poll::Ready(Some(Ok(Frame::data(bytes))))
            }
            Poll::Ready(Some(Ok(PayloadItem::Eof))) => {
                this.in_flight = false;
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                this.in_flight = false;
                this.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.in_flight = false;
                this.finished = true;
                Poll::Ready(Some(Err(ParseError::invalid_body("body stream ended before eof"))))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.finished
    }

    fn size_hint(&self) -> SizeHint {
        match self.payload_size {
            PayloadSize::Length(length) => SizeHint::with_exact(length),
            PayloadSize::Chunked => SizeHint::new(),
            PayloadSize::Empty => SizeHint::with_exact(0),
        }
    }
}
