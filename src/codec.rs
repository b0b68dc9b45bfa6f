//! Wire codec shared by the server and the client.
//!
//! Request layout (5 bytes):
//!
//! ```text
//! +----------------------+-----------+
//! | index: i32 BE (4)    | keep (1)  |
//! +----------------------+-----------+
//! ```
//!
//! Response layout:
//!
//! ```text
//! +-------------------+-------------------------------------------+
//! | byte length: u16  | "<STATUS>|<payload>" padded to 150 chars  |
//! +-------------------+-------------------------------------------+
//! ```
//!
//! The response line is right-padded with spaces, or truncated, to exactly
//! [`RESPONSE_WIDTH`] characters. The decoder trims trailing whitespace, so
//! a payload that really ends in spaces loses them. That is a property of
//! the protocol and is kept for compatibility with existing clients.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use std::str;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Width of every response line, in characters.
pub const RESPONSE_WIDTH: usize = 150;

/// Encoded size of a request.
pub const REQUEST_LEN: usize = 5;

/// Separates the status from the payload.
pub const STATUS_DELIMITER: char = '|';

/// Size of the response length prefix.
const LENGTH_PREFIX_LEN: usize = 2;

/// Status spelling used by older servers, accepted on decode only.
const LEGACY_ERROR_STATUS: &str = "ERRO";

/// A single client request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// 1-based message index, 0 for a random message.
    pub index: i32,
    /// Keep the connection open after the response.
    pub keep_alive: bool,
}

impl Request {
    pub fn new(index: i32, keep_alive: bool) -> Self {
        Self { index, keep_alive }
    }
}

/// Outcome carried in the first field of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Error => "ERROR",
        }
    }

    fn parse(s: &str) -> Result<Self, ProtocolError> {
        match s {
            "OK" => Ok(Status::Ok),
            "ERROR" | LEGACY_ERROR_STATUS => Ok(Status::Error),
            other => Err(ProtocolError::UnknownStatus(other.to_string())),
        }
    }
}

/// A decoded server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub payload: String,
}

impl Response {
    pub fn ok(payload: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            payload: payload.into(),
        }
    }

    pub fn error(payload: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            payload: payload.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

/// Result of decoding from a partially filled buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded<T> {
    /// A full frame and the number of bytes it occupied.
    Complete(T, usize),
    /// Need more data.
    Incomplete,
}

/// Malformed or prematurely terminated frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("stream closed mid-frame after {buffered} bytes")]
    Truncated { buffered: usize },
    #[error("response is not valid UTF-8")]
    InvalidUtf8,
    #[error("response has no status delimiter")]
    MissingDelimiter,
    #[error("unknown response status {0:?}")]
    UnknownStatus(String),
}

/// Errors raised while moving frames over a stream.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

/// Append an encoded request to `buf`.
pub fn encode_request(request: Request, buf: &mut BytesMut) {
    buf.reserve(REQUEST_LEN);
    buf.put_i32(request.index);
    buf.put_u8(u8::from(request.keep_alive));
}

/// Decode a request from the front of `input`.
///
/// Any non-zero keep-alive byte reads as `true`.
pub fn decode_request(input: &[u8]) -> Result<Decoded<Request>, ProtocolError> {
    if input.len() < REQUEST_LEN {
        return Ok(Decoded::Incomplete);
    }

    let mut cursor = &input[..REQUEST_LEN];
    let index = cursor.get_i32();
    let keep_alive = cursor.get_u8() != 0;

    Ok(Decoded::Complete(Request { index, keep_alive }, REQUEST_LEN))
}

/// Build the fixed-width `STATUS|payload` line.
pub fn format_response(status: Status, payload: &str) -> String {
    let mut line = String::with_capacity(RESPONSE_WIDTH);
    line.push_str(status.as_str());
    line.push(STATUS_DELIMITER);
    line.push_str(payload);

    match line.char_indices().nth(RESPONSE_WIDTH) {
        Some((cut, _)) => line.truncate(cut),
        None => {
            let width = line.chars().count();
            line.extend(std::iter::repeat(' ').take(RESPONSE_WIDTH - width));
        }
    }

    line
}

/// Append an encoded response to `buf`.
pub fn encode_response(status: Status, payload: &str, buf: &mut BytesMut) {
    let line = format_response(status, payload);

    // RESPONSE_WIDTH chars of at most 4 bytes each always fit in a u16.
    buf.reserve(LENGTH_PREFIX_LEN + line.len());
    buf.put_u16(line.len() as u16);
    buf.put_slice(line.as_bytes());
}

/// Decode a response from the front of `input`.
pub fn decode_response(input: &[u8]) -> Result<Decoded<Response>, ProtocolError> {
    if input.len() < LENGTH_PREFIX_LEN {
        return Ok(Decoded::Incomplete);
    }

    let length = u16::from_be_bytes([input[0], input[1]]) as usize;
    let total = LENGTH_PREFIX_LEN + length;
    if input.len() < total {
        return Ok(Decoded::Incomplete);
    }

    let line = str::from_utf8(&input[LENGTH_PREFIX_LEN..total])
        .map_err(|_| ProtocolError::InvalidUtf8)?
        .trim_end();

    let (status, payload) = line
        .split_once(STATUS_DELIMITER)
        .ok_or(ProtocolError::MissingDelimiter)?;

    let response = Response {
        status: Status::parse(status)?,
        payload: payload.to_string(),
    };

    Ok(Decoded::Complete(response, total))
}

/// Read one frame from `reader`, buffering through `buffer`.
///
/// Returns `Ok(None)` when the peer closes the stream on a frame boundary.
/// A close with a partial frame buffered is a [`ProtocolError::Truncated`].
pub async fn read_frame<R, T>(
    reader: &mut R,
    buffer: &mut BytesMut,
    decode: fn(&[u8]) -> Result<Decoded<T>, ProtocolError>,
) -> Result<Option<T>, WireError>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Decoded::Complete(frame, consumed) = decode(&buffer[..])? {
            buffer.advance(consumed);
            return Ok(Some(frame));
        }

        let n = reader.read_buf(buffer).await?;
        if n == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            return Err(ProtocolError::Truncated {
                buffered: buffer.len(),
            }
            .into());
        }
    }
}
