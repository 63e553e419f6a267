//! Length-Prefixed Frame Codec
//!
//! Every request and response on the wire is one frame:
//!
//! ```text
//! ┌──────────────────────────────┬───────────────────────────┐
//! │ header: 11 ASCII bytes       │ payload: <length> bytes   │
//! │ decimal length, right-aligned│ opaque, binary-safe       │
//! └──────────────────────────────┴───────────────────────────┘
//! ```
//!
//! The codec works on any blocking `Read`/`Write`, which keeps it testable
//! with in-memory cursors and lets the worker use a plain `TcpStream`.
//!
//! ## Header Decoding
//!
//! Padding around the digits may be spaces, tabs, newlines or NUL bytes. That
//! accepts both space-padded headers and the `"%10d\0"` style some clients
//! send. Anything other than decimal digits between the padding is rejected,
//! as is any length above the codec's limit.

use bytes::{BufMut, Bytes, BytesMut};
use std::io::{self, ErrorKind, Read, Write};
use thiserror::Error;
use tracing::trace;

/// Exact width of the length header, in bytes.
pub const HEADER_LEN: usize = 11;

/// Default upper bound for a frame payload (16 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Largest length that still fits in the header.
pub const MAX_ENCODABLE_LEN: u64 = 99_999_999_999;

/// Errors that can occur while reading or writing frames.
///
/// All of them are fatal for the connection that produced them, and only for
/// that connection.
#[derive(Debug, Error)]
pub enum FrameError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Peer closed the stream part-way through a header
    #[error("stream closed after {read} of {HEADER_LEN} header bytes")]
    TruncatedHeader { read: usize },

    /// Peer closed the stream before the full payload arrived
    #[error("stream closed before {expected} payload bytes were read")]
    TruncatedPayload { expected: usize },

    /// Header is not a non-negative decimal integer
    #[error("invalid frame header: {0:?}")]
    InvalidHeader(String),

    /// Declared or actual payload length exceeds the limit
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: u64, max: usize },
}

/// Result type for codec operations.
pub type FrameResult<T> = Result<T, FrameError>;

/// Reads and writes length-prefixed frames with a payload size limit.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameCodec {
    /// Creates a codec that accepts payloads up to `max_frame_len` bytes.
    ///
    /// The limit is clamped to what the header can express.
    pub fn new(max_frame_len: usize) -> Self {
        let ceiling = usize::try_from(MAX_ENCODABLE_LEN).unwrap_or(usize::MAX);
        Self {
            max_frame_len: max_frame_len.min(ceiling),
        }
    }

    /// Returns the payload size limit.
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Reads one frame.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(payload))` - A complete frame was read
    /// - `Ok(None)` - The peer closed the stream cleanly before a new header
    /// - `Err(e)` - Partial header, partial payload, bad header or I/O failure
    pub fn read_frame<R: Read>(&self, reader: &mut R) -> FrameResult<Option<Bytes>> {
        let header = match read_header(reader)? {
            Some(header) => header,
            None => return Ok(None),
        };

        let len = decode_header(&header, self.max_frame_len)?;

        let mut payload = BytesMut::zeroed(len);
        reader.read_exact(&mut payload).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                FrameError::TruncatedPayload { expected: len }
            } else {
                FrameError::Io(e)
            }
        })?;

        trace!(len, "Read frame");
        Ok(Some(payload.freeze()))
    }

    /// Writes one frame and flushes the writer.
    ///
    /// Header and payload go out in a single `write_all`, which retries
    /// partial writes until everything is sent or the stream fails.
    pub fn write_frame<W: Write>(&self, writer: &mut W, payload: &[u8]) -> FrameResult<()> {
        if payload.len() > self.max_frame_len {
            return Err(FrameError::FrameTooLarge {
                size: payload.len() as u64,
                max: self.max_frame_len,
            });
        }

        let frame = encode_frame(payload);
        writer.write_all(&frame)?;
        writer.flush()?;

        trace!(len = payload.len(), "Wrote frame");
        Ok(())
    }
}

/// Reads exactly [`HEADER_LEN`] bytes, or `None` on a clean close.
fn read_header<R: Read>(reader: &mut R) -> FrameResult<Option<[u8; HEADER_LEN]>> {
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;

    while filled < HEADER_LEN {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(FrameError::TruncatedHeader { read: filled }),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Some(header))
}

#[inline]
fn is_padding(b: u8) -> bool {
    b == 0 || b.is_ascii_whitespace()
}

/// Decodes a header into a payload length.
pub fn decode_header(header: &[u8; HEADER_LEN], max_frame_len: usize) -> FrameResult<usize> {
    let start = header.iter().position(|b| !is_padding(*b));
    let end = header.iter().rposition(|b| !is_padding(*b));

    let digits = match (start, end) {
        (Some(start), Some(end)) => &header[start..=end],
        _ => return Err(invalid_header(header)),
    };

    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(invalid_header(header));
    }

    let len = digits
        .iter()
        .fold(0u64, |acc, d| acc * 10 + u64::from(d - b'0'));

    if len > max_frame_len as u64 {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: max_frame_len,
        });
    }

    Ok(len as usize)
}

fn invalid_header(header: &[u8]) -> FrameError {
    FrameError::InvalidHeader(String::from_utf8_lossy(header).into_owned())
}

/// Encodes a length as a right-justified, space-padded header.
pub fn encode_header(len: usize) -> [u8; HEADER_LEN] {
    let mut header = [b' '; HEADER_LEN];
    let digits = len.to_string();
    let digits = digits.as_bytes();
    let take = digits.len().min(HEADER_LEN);
    header[HEADER_LEN - take..].copy_from_slice(&digits[digits.len() - take..]);
    header
}

/// Builds a complete frame (header followed by payload).
pub fn encode_frame(payload: &[u8]) -> BytesMut {
    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.put_slice(&encode_header(payload.len()));
    frame.put_slice(payload);
    frame
}

/// Reads one frame with the default size limit.
pub fn read_frame<R: Read>(reader: &mut R) -> FrameResult<Option<Bytes>> {
    FrameCodec::default().read_frame(reader)
}

/// Writes one frame with the default size limit.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> FrameResult<()> {
    FrameCodec::default().write_frame(writer, payload)
}
