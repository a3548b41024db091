//! SF-010: Database call interface for procedure calls against the cluster.
//!
//! Every interaction with the target database is a named procedure call with
//! positional parameters. Two system procedures carry the provisioning work:
//! `@AdHoc` (one SQL/DDL statement) and `@UpdateClasses` (raw bundle bytes).

pub mod memory;
pub mod sqlcmd;

use std::fmt;

/// Runs one ad-hoc SQL or DDL statement.
pub const ADHOC: &str = "@AdHoc";

/// Loads a code bundle into the cluster's class catalog.
pub const UPDATE_CLASSES: &str = "@UpdateClasses";

/// Positional procedure parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Param {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Param::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Param::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Null => write!(f, "NULL"),
            Param::Bool(b) => write!(f, "{}", b),
            Param::Int(i) => write!(f, "{}", i),
            Param::Float(x) => write!(f, "{}", x),
            Param::Str(s) => write!(f, "'{}'", s),
            Param::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Completion status of a call that reached the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

/// Response to a procedure call.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: Status,
    pub status_string: String,
}

impl ClientResponse {
    pub fn success() -> Self {
        Self {
            status: Status::Success,
            status_string: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failure,
            status_string: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Error raised by a procedure call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// The cluster received the call and refused it.
    #[error("{0}")]
    Rejected(String),

    /// The call never completed: no connection, client crashed, etc.
    #[error("connection error: {0}")]
    Connection(String),
}

/// A long-lived client handle.
///
/// Implementations must be usable from several threads; provisioning borrows the
/// handle and never closes it. Connection lifecycle belongs to the caller.
pub trait DatabaseClient: Sync {
    fn call_procedure(&self, procedure: &str, params: &[Param]) -> Result<ClientResponse, CallError>;
}

/// How a statement-style call ended, with rejections of either kind collapsed
/// into a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CallOutcome {
    Ok,
    Rejected(String),
}

/// Fold a call result into [`CallOutcome`], keeping connection errors as `Err`.
pub(crate) fn outcome(result: Result<ClientResponse, CallError>) -> Result<CallOutcome, CallError> {
    match result {
        Ok(resp) if resp.is_success() => Ok(CallOutcome::Ok),
        Ok(resp) => Ok(CallOutcome::Rejected(resp.status_string)),
        Err(CallError::Rejected(msg)) => Ok(CallOutcome::Rejected(msg)),
        Err(e @ CallError::Connection(_)) => Err(e),
    }
}
