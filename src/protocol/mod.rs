//! Wire Protocol Implementation
//!
//! This module implements the small protocol spoken between clients and workers.
//!
//! ## Overview
//!
//! Each request and each response is a frame: an 11-byte ASCII decimal length
//! header followed by that many payload bytes. A request payload is a single
//! command line such as `create 5 3 abc`; a response payload is either the
//! stored value or a short status line (`Ok`, `Error no such entry`, ...).
//!
//! ## Modules
//!
//! - `frame`: Reads and writes length-prefixed frames
//! - `tokenizer`: Splits a command line into at most four tokens
//! - `command`: Turns tokens into a typed [`Command`]
//!
//! ## Example
//!
//! ```
//! use poolkv::protocol::{read_frame, write_frame, Command};
//! use bytes::Bytes;
//! use std::io::Cursor;
//!
//! let mut wire = Vec::new();
//! write_frame(&mut wire, b"create 5 3 abc").unwrap();
//!
//! let payload = read_frame(&mut Cursor::new(wire)).unwrap().unwrap();
//! let command = Command::parse(&payload).unwrap();
//! assert_eq!(command, Command::Create { key: 5, value: Bytes::from("abc") });
//! ```

pub mod command;
pub mod frame;
pub mod tokenizer;

// Re-export commonly used types for convenience
pub use command::{Command, CommandError, EXIT_SENTINEL};
pub use frame::{
    encode_frame, read_frame, write_frame, FrameCodec, FrameError, FrameResult, DEFAULT_MAX_FRAME_LEN,
    HEADER_LEN,
};
pub use tokenizer::{tokenize, MAX_TOKENS};
