//! Connection handler.
//!
//! Each accepted connection runs a strictly sequential request/response
//! loop against the shared [`Catalog`]:
//!
//! ```text
//! AwaitingRequest -> Processing -> Responding -> AwaitingRequest (keep-alive)
//!                                            \-> Closed          (no keep-alive)
//! ```
//!
//! A clean end of stream while awaiting a request is the normal way for a
//! client to leave. Any other failure closes this connection only.

use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::catalog::Catalog;
use crate::codec::{self, Request, Response, WireError};

/// Read buffer size. Requests are tiny, this only absorbs pipelined bursts.
const BUFFER_SIZE: usize = 1024;

/// Current state of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnState {
    /// Waiting for the next request.
    AwaitingRequest,
    /// A request was decoded and is being resolved.
    Processing(Request),
    /// A response is ready to be written.
    Responding {
        response: Response,
        /// Whether to wait for another request once the response is flushed.
        keep_alive: bool,
    },
    /// The connection is finished.
    Closed,
}

/// Resolve a message index against the catalog.
///
/// Index 0 picks a random message. Indices outside `[0, size]` produce an
/// error response naming the valid range; they are not a connection fault.
pub fn resolve(catalog: &Catalog, index: i32) -> Response {
    if index == 0 {
        return Response::ok(catalog.pick_random());
    }

    match catalog.get(index) {
        Some(message) => Response::ok(message),
        None => Response::error(format!(
            "invalid message number {index}, use a value in [0, {}] (0 = random)",
            catalog.len()
        )),
    }
}

/// A single client connection.
pub struct Connection<S> {
    stream: S,
    peer: SocketAddr,
    catalog: Arc<Catalog>,
    read_buf: BytesMut,
    write_buf: BytesMut,
    state: ConnState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new connection in the initial awaiting state.
    pub fn new(stream: S, peer: SocketAddr, catalog: Arc<Catalog>) -> Self {
        Self {
            stream,
            peer,
            catalog,
            read_buf: BytesMut::with_capacity(BUFFER_SIZE),
            write_buf: BytesMut::with_capacity(codec::RESPONSE_WIDTH * 4),
            state: ConnState::AwaitingRequest,
        }
    }

    #[cfg(test)]
    fn state(&self) -> &ConnState {
        &self.state
    }

    /// Serve requests until the client leaves or the stream fails.
    ///
    /// The stream is shut down and dropped on every exit path.
    pub async fn run(mut self) -> Result<(), WireError> {
        let result = self.drive().await;
        self.state = ConnState::Closed;

        if let Err(e) = self.stream.shutdown().await {
            trace!(peer = %self.peer, error = %e, "Shutdown after close failed");
        }

        result
    }

    async fn drive(&mut self) -> Result<(), WireError> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnState::Closed);
            self.state = match state {
                ConnState::AwaitingRequest => self.await_request().await?,
                ConnState::Processing(request) => ConnState::Responding {
                    response: resolve(&self.catalog, request.index),
                    keep_alive: request.keep_alive,
                },
                ConnState::Responding {
                    response,
                    keep_alive,
                } => {
                    self.respond(&response).await?;
                    if keep_alive {
                        ConnState::AwaitingRequest
                    } else {
                        debug!(peer = %self.peer, "Closing connection, keep-alive not requested");
                        ConnState::Closed
                    }
                }
                ConnState::Closed => return Ok(()),
            };
        }
    }

    async fn await_request(&mut self) -> Result<ConnState, WireError> {
        let frame =
            codec::read_frame(&mut self.stream, &mut self.read_buf, codec::decode_request).await?;

        Ok(match frame {
            Some(request) => {
                debug!(
                    peer = %self.peer,
                    index = request.index,
                    keep_alive = request.keep_alive,
                    "Request"
                );
                ConnState::Processing(request)
            }
            None => {
                debug!(peer = %self.peer, "Client disconnected");
                ConnState::Closed
            }
        })
    }

    async fn respond(&mut self, response: &Response) -> Result<(), WireError> {
        self.write_buf.clear();
        codec::encode_response(response.status, &response.payload, &mut self.write_buf);

        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;

        trace!(peer = %self.peer, status = response.status.as_str(), "Response sent");
        Ok(())
    }
}
