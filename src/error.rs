//! Error types for pglink.

use thiserror::Error;

use crate::types::CodecError;

/// Result type for pglink operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Fields of a server `ErrorResponse` or `NoticeResponse`.
///
/// Every field is optional; the server sends only the ones it has. The
/// field-code letters of the wire format map onto the names below.
#[derive(Debug, Clone, Default)]
pub struct Notice {
    /// Severity: ERROR, FATAL, PANIC, WARNING, NOTICE, DEBUG, INFO, LOG
    pub severity: Option<String>,
    /// SQLSTATE error code (5 characters)
    pub code: Option<String>,
    /// Primary error message
    pub message: Option<String>,
    /// Detailed error explanation
    pub detail: Option<String>,
    /// Suggestion for fixing the error
    pub hint: Option<String>,
    /// Cursor position in query string (1-based)
    pub position: Option<u32>,
    /// Position in internal query
    pub internal_position: Option<u32>,
    /// Failed internal command text
    pub internal_query: Option<String>,
    /// Context/stack trace
    pub where_: Option<String>,
    /// Schema name
    pub schema: Option<String>,
    /// Table name
    pub table: Option<String>,
    /// Column name
    pub column: Option<String>,
    /// Data type name
    pub data_type: Option<String>,
    /// Constraint name
    pub constraint: Option<String>,
    /// Source file name
    pub file: Option<String>,
    /// Source line number
    pub line: Option<u32>,
    /// Source routine name
    pub routine: Option<String>,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(severity) = &self.severity {
            write!(f, "{}: ", severity)?;
        }
        if let Some(message) = &self.message {
            write!(f, "{}", message)?;
        }
        if let Some(code) = &self.code {
            write!(f, " (SQLSTATE {})", code)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {}", detail)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT: {}", hint)?;
        }
        Ok(())
    }
}

/// Error type for pglink.
#[derive(Debug, Error)]
pub enum Error {
    /// Server error response; the connection recovers at the next
    /// ReadyForQuery.
    #[error("server error: {0}")]
    Server(Notice),

    /// Protocol error (malformed message, unexpected response). Fatal to the
    /// connection.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transport I/O error. Fatal to the connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server requested an authentication method other than cleartext
    /// or MD5.
    #[error("unsupported authentication method: {0}")]
    UnsupportedAuthKind(i32),

    /// Value serialization or deserialization failed; the operation fails
    /// but the connection stays usable.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The connection is already processing a query whose rows have not
    /// been fully consumed.
    #[error("connection is already engaged by an open row stream")]
    AlreadyEngaged,

    /// The number of bind arguments does not match the statement.
    #[error("statement takes {expected} parameters, {got} given")]
    ParamCount { expected: usize, got: usize },

    /// The query string was empty.
    #[error("empty query string")]
    EmptyQuery,

    /// API misuse (handshake repeated, nested transaction, ...).
    #[error("invalid usage: {0}")]
    InvalidUsage(String),

    /// The connection has been closed.
    #[error("connection is closed")]
    Closed,
}

impl Error {
    /// Returns true if the error leaves the connection unusable.
    ///
    /// Server, codec, and usage errors recover once the protocol reaches the
    /// next ReadyForQuery; everything else tears the connection down.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Protocol(_)
            | Error::Io(_)
            | Error::Auth(_)
            | Error::UnsupportedAuthKind(_)
            | Error::Closed => true,
            Error::Server(notice) => {
                matches!(notice.severity.as_deref(), Some("FATAL") | Some("PANIC"))
            }
            _ => false,
        }
    }

    /// Get the SQLSTATE code if this is a server error.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Server(notice) => notice.code.as_deref(),
            _ => None,
        }
    }
}
