//! PostgreSQL backend (server → client) messages.

pub mod auth;
pub mod error;
pub mod extended;
pub mod query;

pub use auth::{AuthRequest, BackendKey, NotificationResponse, ParameterStatus, ReadyForQuery};
pub use error::parse_notice;
pub use extended::{BindComplete, CloseComplete, NoData, ParameterDescription, ParseComplete};
pub use query::{CommandComplete, DataRow, EmptyQueryResponse, FieldDescription, RowDescription};

/// Backend message type bytes.
pub mod msg_type {
    /// Authentication request
    pub const AUTHENTICATION: u8 = b'R';
    /// BackendKeyData
    pub const BACKEND_KEY_DATA: u8 = b'K';
    /// ParameterStatus
    pub const PARAMETER_STATUS: u8 = b'S';
    /// ReadyForQuery
    pub const READY_FOR_QUERY: u8 = b'Z';
    /// RowDescription
    pub const ROW_DESCRIPTION: u8 = b'T';
    /// DataRow
    pub const DATA_ROW: u8 = b'D';
    /// CommandComplete
    pub const COMMAND_COMPLETE: u8 = b'C';
    /// EmptyQueryResponse
    pub const EMPTY_QUERY_RESPONSE: u8 = b'I';
    /// ErrorResponse
    pub const ERROR_RESPONSE: u8 = b'E';
    /// NoticeResponse
    pub const NOTICE_RESPONSE: u8 = b'N';
    /// NotificationResponse
    pub const NOTIFICATION_RESPONSE: u8 = b'A';
    /// ParseComplete
    pub const PARSE_COMPLETE: u8 = b'1';
    /// BindComplete
    pub const BIND_COMPLETE: u8 = b'2';
    /// CloseComplete
    pub const CLOSE_COMPLETE: u8 = b'3';
    /// ParameterDescription
    pub const PARAMETER_DESCRIPTION: u8 = b't';
    /// NoData
    pub const NO_DATA: u8 = b'n';
    /// CopyOutResponse
    pub const COPY_OUT_RESPONSE: u8 = b'H';
}

/// True for message types that can arrive at any point between other
/// responses: notices, notifications, and parameter changes.
pub fn is_async_type(type_byte: u8) -> bool {
    matches!(
        type_byte,
        msg_type::NOTICE_RESPONSE
            | msg_type::NOTIFICATION_RESPONSE
            | msg_type::PARAMETER_STATUS
    )
}
