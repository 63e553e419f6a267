//! Command Handler Module
//!
//! This module executes parsed commands against the storage engine and decides
//! what, if anything, goes back to the client.
//!
//! ## Dispatch Table
//!
//! | Command          | Success             | Store precondition fails  |
//! |------------------|---------------------|---------------------------|
//! | `create k _ v`   | `Ok`                | `Error entry exists`      |
//! | `read k`         | the stored value    | `Error no such entry`     |
//! | `update k _ v`   | `Ok`                | `Error no such entry`     |
//! | `delete k`       | `Ok`                | `Error no such entry`     |
//! | `exit00`         | session closes      |                           |
//! | anything else    | session closes      |                           |
//!
//! Status lines end with a newline. A `read` response is the stored value,
//! byte for byte.
//!
//! Unknown or malformed commands do not get an error frame: the session is
//! closed instead, which is what existing clients expect.

use crate::protocol::{Command, CommandError};
use crate::storage::{StorageEngine, StoreError, StoreResult};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace};

/// Response to a successful mutation.
pub const RESPONSE_OK: &[u8] = b"Ok\n";

/// Response to `create` on a key that already holds a value.
pub const RESPONSE_ENTRY_EXISTS: &[u8] = b"Error entry exists\n";

/// Response to `read`, `update` or `delete` on a key without a value.
pub const RESPONSE_NO_SUCH_ENTRY: &[u8] = b"Error no such entry\n";

/// Why a session should end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent the end-of-session sentinel
    Exit,
    /// Payload was not a command we understand
    Rejected(CommandError),
}

/// Outcome of executing one request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Send this payload back and keep the session going
    Respond(Bytes),
    /// Send nothing and close the connection
    Close(CloseReason),
}

/// Executes commands against the shared storage engine.
///
/// Cheap to clone; every worker owns one.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Returns the storage engine this handler executes against.
    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Parses and executes one request payload.
    pub fn execute(&self, payload: &Bytes) -> Reply {
        match Command::parse(payload) {
            Ok(command) => self.dispatch(command),
            Err(e) => {
                debug!(error = %e, "Rejected command");
                Reply::Close(CloseReason::Rejected(e))
            }
        }
    }

    /// Executes an already-parsed command.
    pub fn dispatch(&self, command: Command) -> Reply {
        trace!(command = command.name(), "Dispatching");

        match command {
            Command::Create { key, value } => status(self.storage.create(key, value)),
            Command::Read { key } => match self.storage.read(key) {
                Ok(value) => Reply::Respond(value),
                Err(e) => Reply::Respond(error_response(e)),
            },
            Command::Update { key, value } => status(self.storage.update(key, value)),
            Command::Delete { key } => status(self.storage.delete(key)),
            Command::Exit => Reply::Close(CloseReason::Exit),
        }
    }
}

fn status(result: StoreResult<()>) -> Reply {
    match result {
        Ok(()) => Reply::Respond(Bytes::from_static(RESPONSE_OK)),
        Err(e) => Reply::Respond(error_response(e)),
    }
}

fn error_response(err: StoreError) -> Bytes {
    match err {
        StoreError::EntryExists => Bytes::from_static(RESPONSE_ENTRY_EXISTS),
        StoreError::NoSuchEntry => Bytes::from_static(RESPONSE_NO_SUCH_ENTRY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FrameCodec, FrameError};
    use std::io::Cursor;
    use std::thread;

    fn create_handler() -> CommandHandler {
        let storage = Arc::new(StorageEngine::new());
        CommandHandler::new(storage)
    }

    fn run(handler: &CommandHandler, line: &str) -> Reply {
        handler.execute(&Bytes::copy_from_slice(line.as_bytes()))
    }

    fn respond(bytes: &[u8]) -> Reply {
        Reply::Respond(Bytes::copy_from_slice(bytes))
    }

    #[test]
    fn test_session_scenario() {
        let handler = create_handler();

        assert_eq!(run(&handler, "create 5 3 abc"), respond(RESPONSE_OK));
        assert_eq!(run(&handler, "read 5"), respond(b"abc"));
        assert_eq!(run(&handler, "update 5 3 xyz"), respond(RESPONSE_OK));
        assert_eq!(run(&handler, "read 5"), respond(b"xyz"));
        assert_eq!(run(&handler, "delete 5"), respond(RESPONSE_OK));
        assert_eq!(run(&handler, "read 5"), respond(RESPONSE_NO_SUCH_ENTRY));
        assert_eq!(run(&handler, "exit00"), Reply::Close(CloseReason::Exit));
    }

    #[test]
    fn test_create_existing() {
        let handler = create_handler();

        run(&handler, "create 1 5 first");
        assert_eq!(
            run(&handler, "create 1 6 second"),
            respond(RESPONSE_ENTRY_EXISTS)
        );
        assert_eq!(run(&handler, "read 1"), respond(b"first"));
    }

    #[test]
    fn test_value_with_spaces() {
        let handler = create_handler();

        run(&handler, "create 2 11 hello world");
        assert_eq!(run(&handler, "read 2"), respond(b"hello world"));
    }

    #[test]
    fn test_value_with_control_bytes() {
        let handler = create_handler();
        let mut line = b"create 3 4 ".to_vec();
        line.extend_from_slice(b"\x00\x01 \xfe");

        handler.execute(&Bytes::from(line));
        assert_eq!(run(&handler, "read 3"), respond(b"\x00\x01 \xfe"));
    }

    #[test]
    fn test_missing_key_operations() {
        let handler = create_handler();

        assert_eq!(run(&handler, "read 8"), respond(RESPONSE_NO_SUCH_ENTRY));
        assert_eq!(
            run(&handler, "update 8 1 z"),
            respond(RESPONSE_NO_SUCH_ENTRY)
        );
        assert_eq!(run(&handler, "delete 8"), respond(RESPONSE_NO_SUCH_ENTRY));
        assert!(handler.storage().is_empty());
    }

    #[test]
    fn test_unknown_command_closes() {
        let handler = create_handler();

        let reply = run(&handler, "UNKNOWN 1");
        assert!(matches!(
            reply,
            Reply::Close(CloseReason::Rejected(CommandError::UnknownVerb(_)))
        ));
    }

    #[test]
    fn test_malformed_command_closes() {
        let handler = create_handler();

        assert!(matches!(
            run(&handler, "read"),
            Reply::Close(CloseReason::Rejected(_))
        ));
        assert!(matches!(
            run(&handler, "create x 1 a"),
            Reply::Close(CloseReason::Rejected(_))
        ));
        assert!(handler.storage().is_empty());
    }

    #[test]
    fn test_value_at_frame_limit() {
        let handler = create_handler();
        let codec = FrameCodec::new(64);

        // "create 1 1 " plus a value filling the frame exactly
        let mut line = b"create 1 1 ".to_vec();
        line.resize(codec.max_frame_len(), b'v');
        line[20] = b' ';

        let mut wire = Vec::new();
        codec.write_frame(&mut wire, &line).unwrap();
        let payload = codec.read_frame(&mut Cursor::new(wire)).unwrap().unwrap();
        assert_eq!(payload.len(), 64);
        assert_eq!(handler.execute(&payload), respond(RESPONSE_OK));

        let Reply::Respond(value) = run(&handler, "read 1") else {
            panic!("read closed the session");
        };
        assert_eq!(value.len(), 53);
        assert_eq!(&value[..], &line[11..]);

        let mut out = Vec::new();
        codec.write_frame(&mut out, &value).unwrap();
        let echoed = codec.read_frame(&mut Cursor::new(out)).unwrap().unwrap();
        assert_eq!(echoed, value);

        // One byte past the limit is refused before anything is written
        line.push(b'v');
        let mut out = Vec::new();
        assert!(matches!(
            codec.write_frame(&mut out, &line),
            Err(FrameError::FrameTooLarge { size: 65, max: 64 })
        ));
    }

    #[test]
    fn test_concurrent_updates_settle_on_one_value() {
        let handler = create_handler();
        run(&handler, "create 0 4 seed");

        let mut handles = vec![];
        for i in 0..8 {
            let handler = handler.clone();
            handles.push(thread::spawn(move || {
                let line = format!("update 0 9 value-{i:03}");
                for _ in 0..100 {
                    assert_eq!(run(&handler, &line), respond(RESPONSE_OK));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let Reply::Respond(value) = run(&handler, "read 0") else {
            panic!("read closed the session");
        };
        let expected: Vec<String> = (0..8).map(|i| format!("value-{i:03}")).collect();
        assert!(expected.iter().any(|v| v.as_bytes() == &value[..]));
    }
}
