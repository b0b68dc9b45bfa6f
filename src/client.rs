//! Async client for the message catalog protocol.

use bytes::BytesMut;
use std::io;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::trace;

use crate::codec::{self, Request, Response, WireError};

/// Client-side failures.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect: {0}")]
    Connect(#[source] io::Error),
    #[error("server closed the connection")]
    Closed,
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// A connection to a message catalog server.
pub struct Client {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl Client {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(ClientError::Connect)?;

        Ok(Self {
            stream,
            read_buf: BytesMut::with_capacity(codec::RESPONSE_WIDTH * 4),
            write_buf: BytesMut::with_capacity(codec::REQUEST_LEN),
        })
    }

    /// Send one request and wait for its response.
    ///
    /// With `keep_alive` false the server closes the connection after
    /// responding, so further requests fail with [`ClientError::Closed`]
    /// or a transport error.
    pub async fn request(&mut self, index: i32, keep_alive: bool) -> Result<Response, ClientError> {
        self.write_buf.clear();
        codec::encode_request(Request::new(index, keep_alive), &mut self.write_buf);

        self.stream
            .write_all(&self.write_buf)
            .await
            .map_err(WireError::from)?;
        self.stream.flush().await.map_err(WireError::from)?;

        let response =
            codec::read_frame(&mut self.stream, &mut self.read_buf, codec::decode_response)
                .await?
                .ok_or(ClientError::Closed)?;

        trace!(index, status = response.status.as_str(), "Response received");
        Ok(response)
    }

    /// Request a message and keep the connection open.
    pub async fn fetch(&mut self, index: i32) -> Result<Response, ClientError> {
        self.request(index, true).await
    }

    /// Close the connection without sending another request.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await.map_err(WireError::from)?;
        Ok(())
    }
}
