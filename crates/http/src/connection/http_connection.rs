use std::error::Error;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{FutureExt, SinkExt, StreamExt};
use http::header::{CONTENT_TYPE, TRANSFER_ENCODING};
use http::{HeaderValue, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Empty};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{error, info, trace};

use crate::codec::header::is_chunked_coding;
use crate::codec::sniff::detect_content_type;
use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::handler::Handler;
use crate::protocol::body::ReqBody;
use crate::protocol::{
    HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError,
};

/// Initial capacity of the framed read buffer.
const READ_BUFFER_SIZE: usize = 4 * 1024;

/// Response bytes staged before the framing decision: a body that finishes
/// within this budget is sent with `Content-Length`, anything longer is
/// chunked.
const RESPONSE_STAGE_SIZE: usize = 4 * 1024;

type ResponseMessage = Message<(ResponseHead, PayloadSize)>;

/// One HTTP/1.1 connection: a framed reader and writer plus the keep-alive
/// loop over them.
///
/// Requests on a connection are served strictly in sequence. Within one
/// request cycle the handler runs concurrently with a body pump so that a
/// handler which never reads its body cannot deadlock against a client that
/// is still sending it; whatever the handler leaves unread is drained before
/// the next request line is parsed.
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), READ_BUFFER_SIZE),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
        }
    }

    /// Serves requests until the peer closes, an error occurs, or a request
    /// asks for the connection to be closed. The socket is released when the
    /// connection is dropped on return.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    let keep_alive = header.should_keep_alive();
                    self.serve_one(header, payload_size, &handler).await?;

                    if !keep_alive {
                        info!("connection close requested, shutting down after response");
                        return Ok(());
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    // the body pump consumes every payload item through Eof,
                    // so a payload here means the framing is out of sync
                    error!("unexpected payload frame between requests");
                    let _ = self.send_error(StatusCode::BAD_REQUEST).await;
                    return Err(ParseError::invalid_body("expected request header, found body payload").into());
                }

                Some(Err(e)) => {
                    error!("failed to decode request: {}", e);
                    let _ = self.send_error(StatusCode::BAD_REQUEST).await;
                    return Err(e.into());
                }

                None => {
                    info!("client closed the connection");
                    return Ok(());
                }
            }
        }
    }

    /// Runs one request/response cycle: handler + body pump, drain, respond.
    async fn serve_one<H>(
        &mut self,
        header: RequestHeader,
        payload_size: PayloadSize,
        handler: &Arc<H>,
    ) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        let continue_writer = if header.expects_continue() {
            trace!("request expects 100-continue");
            Some(self.framed_write.get_mut())
        } else {
            None
        };

        let (req_body, body_sender) = ReqBody::channel(&mut self.framed_read, continue_writer, payload_size);
        let request = header.body(req_body);

        let handler_output = match body_sender {
            Some(mut sender) => {
                let output = {
                    let handler_fut = AssertUnwindSafe(handler.call(request)).catch_unwind();
                    tokio::pin!(handler_fut);
                    let pump_fut = sender.send_body();
                    tokio::pin!(pump_fut);
                    let mut pump_done = false;

                    loop {
                        tokio::select! {
                            // prefer finishing the handler once it is ready
                            biased;
                            output = &mut handler_fut => break output,
                            _ = &mut pump_fut, if !pump_done => {
                                pump_done = true;
                            }
                        }
                    }
                };

                // position the stream at the next request line
                sender.skip_body().await?;
                output
            }
            None => AssertUnwindSafe(handler.call(request)).catch_unwind().await,
        };

        match handler_output {
            Ok(response_result) => self.send_response(response_result).await,
            Err(_panic) => {
                error!("handler panicked, closing connection");
                Err(HttpError::HandlerPanic)
            }
        }
    }

    async fn send_response<T, E>(&mut self, response_result: Result<Response<T>, E>) -> Result<(), HttpError>
    where
        T: Body<Data = Bytes> + Unpin,
        T::Error: Display,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        match response_result {
            Ok(response) => self.do_send_response(response).await,
            Err(e) => {
                error!("handler failed: {}", e.into());
                self.send_error(StatusCode::INTERNAL_SERVER_ERROR).await
            }
        }
    }

    async fn send_error(&mut self, status: StatusCode) -> Result<(), HttpError> {
        let response = Response::builder()
            .status(status)
            .body(Empty::<Bytes>::new())
            .expect("error response is valid");
        self.do_send_response(response).await
    }

    /// Serializes one response, deciding the body framing from the body
    /// itself.
    ///
    /// Frames are staged up to [`RESPONSE_STAGE_SIZE`]. A body that ends
    /// within the budget is sent with `Content-Length` equal to the bytes
    /// actually staged; a longer body without an exact size hint streams as
    /// chunked. The staged prefix also feeds Content-Type detection when the
    /// handler set none.
    async fn do_send_response<T>(&mut self, response: Response<T>) -> Result<(), HttpError>
    where
        T: Body<Data = Bytes> + Unpin,
        T::Error: Display,
    {
        let (mut parts, mut body) = response.into_parts();

        let explicit_chunked = is_chunked_coding(parts.headers.get(TRANSFER_ENCODING));
        let exact_size = body.size_hint().exact();

        let mut staged = BytesMut::new();
        let mut body_done = false;
        while staged.len() <= RESPONSE_STAGE_SIZE {
            match body.frame().await {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        staged.extend_from_slice(&data);
                    }
                }
                Some(Err(e)) => {
                    return Err(SendError::invalid_body(format!("response body failed: {e}")).into());
                }
                None => {
                    body_done = true;
                    break;
                }
            }
        }

        let payload_size = if explicit_chunked {
            PayloadSize::Chunked
        } else if body_done {
            if staged.is_empty() {
                PayloadSize::Empty
            } else {
                PayloadSize::Length(staged.len() as u64)
            }
        } else if let Some(size) = exact_size {
            PayloadSize::Length(size)
        } else {
            PayloadSize::Chunked
        };

        if !payload_size.is_empty() && !parts.headers.contains_key(CONTENT_TYPE) {
            let content_type = detect_content_type(&staged);
            parts.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }

        let head = ResponseHead::from_parts(parts, ());
        self.framed_write.feed(ResponseMessage::Header((head, payload_size))).await?;

        if !staged.is_empty() {
            // an oversized staged buffer is re-split by the chunked encoder
            self.framed_write.feed(ResponseMessage::Payload(PayloadItem::Chunk(staged.freeze()))).await?;
        }

        if !body_done {
            loop {
                match body.frame().await {
                    Some(Ok(frame)) => {
                        if let Ok(data) = frame.into_data() {
                            if !data.is_empty() {
                                // send (not feed): flush so large responses
                                // stream instead of accumulating in memory
                                self.framed_write.send(ResponseMessage::Payload(PayloadItem::Chunk(data))).await?;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Err(SendError::invalid_body(format!("response body failed: {e}")).into());
                    }
                    None => break,
                }
            }
        }

        self.framed_write.feed(ResponseMessage::Payload(PayloadItem::Eof)).await?;
        SinkExt::<ResponseMessage>::flush(&mut self.framed_write).await?;
        Ok(())
    }
}
