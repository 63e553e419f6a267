//! Parsed Commands
//!
//! Turns a tokenized request payload into a typed [`Command`].
//!
//! | Payload                    | Command                      |
//! |----------------------------|------------------------------|
//! | `create <key> <len> <value>` | [`Command::Create`]        |
//! | `read <key>`               | [`Command::Read`]            |
//! | `update <key> <len> <value>` | [`Command::Update`]        |
//! | `delete <key>`             | [`Command::Delete`]          |
//! | `exit00`                   | [`Command::Exit`]            |
//!
//! Verbs are case-sensitive. The `<len>` token is accepted but not checked
//! against the value; the value is whatever the tokenizer left in the fourth
//! token.

use crate::protocol::tokenizer::tokenize;
use bytes::Bytes;
use thiserror::Error;

/// Verb that ends a session.
pub const EXIT_SENTINEL: &[u8] = b"exit00";

/// A request the dispatcher knows how to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create { key: i32, value: Bytes },
    Read { key: i32 },
    Update { key: i32, value: Bytes },
    Delete { key: i32 },
    /// End-of-session sentinel
    Exit,
}

/// Reasons a payload does not form a valid command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown verb {0:?}")]
    UnknownVerb(String),

    #[error("'{verb}' is missing its {arg}")]
    MissingArgument {
        verb: &'static str,
        arg: &'static str,
    },

    #[error("invalid key {0:?}")]
    InvalidKey(String),
}

impl Command {
    /// Tokenizes and parses a request payload.
    pub fn parse(payload: &Bytes) -> Result<Self, CommandError> {
        Self::from_tokens(&tokenize(payload))
    }

    /// Parses already-tokenized input.
    pub fn from_tokens(tokens: &[Bytes]) -> Result<Self, CommandError> {
        let verb = tokens.first().map(|t| t.as_ref()).unwrap_or_default();

        match verb {
            b"create" => Ok(Command::Create {
                key: parse_key("create", tokens)?,
                value: value_token("create", tokens)?,
            }),
            b"read" => Ok(Command::Read {
                key: parse_key("read", tokens)?,
            }),
            b"update" => Ok(Command::Update {
                key: parse_key("update", tokens)?,
                value: value_token("update", tokens)?,
            }),
            b"delete" => Ok(Command::Delete {
                key: parse_key("delete", tokens)?,
            }),
            EXIT_SENTINEL => Ok(Command::Exit),
            other => Err(CommandError::UnknownVerb(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }

    /// Returns the verb, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Create { .. } => "create",
            Command::Read { .. } => "read",
            Command::Update { .. } => "update",
            Command::Delete { .. } => "delete",
            Command::Exit => "exit00",
        }
    }
}

fn parse_key(verb: &'static str, tokens: &[Bytes]) -> Result<i32, CommandError> {
    let raw = tokens
        .get(1)
        .filter(|t| !t.is_empty())
        .ok_or(CommandError::MissingArgument { verb, arg: "key" })?;

    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| CommandError::InvalidKey(String::from_utf8_lossy(raw).into_owned()))
}

fn value_token(verb: &'static str, tokens: &[Bytes]) -> Result<Bytes, CommandError> {
    tokens
        .get(3)
        .cloned()
        .ok_or(CommandError::MissingArgument { verb, arg: "value" })
}
