//! Error and notice response parsing.

use crate::error::{Notice, Result};
use crate::protocol::codec::Reader;

/// Field-code letters of ErrorResponse/NoticeResponse.
mod field {
    pub const SEVERITY: u8 = b'V';
    pub const SEVERITY_LOCALIZED: u8 = b'S';
    pub const CODE: u8 = b'C';
    pub const MESSAGE: u8 = b'M';
    pub const DETAIL: u8 = b'D';
    pub const HINT: u8 = b'H';
    pub const POSITION: u8 = b'P';
    pub const INTERNAL_POSITION: u8 = b'p';
    pub const INTERNAL_QUERY: u8 = b'q';
    pub const WHERE: u8 = b'W';
    pub const SCHEMA: u8 = b's';
    pub const TABLE: u8 = b't';
    pub const COLUMN: u8 = b'c';
    pub const DATA_TYPE: u8 = b'd';
    pub const CONSTRAINT: u8 = b'n';
    pub const FILE: u8 = b'F';
    pub const LINE: u8 = b'L';
    pub const ROUTINE: u8 = b'R';
}

/// Parse an ErrorResponse or NoticeResponse payload into a [`Notice`].
///
/// The payload is a stream of `(code byte, zero-terminated value)` pairs
/// ending with a single zero byte. Unknown codes are skipped.
pub fn parse_notice(payload: &[u8]) -> Result<Notice> {
    let mut notice = Notice::default();
    let mut r = Reader::new(payload);

    loop {
        let code = r.u8()?;
        if code == 0 {
            break;
        }
        let value = r.cstr()?;
        match code {
            field::SEVERITY => notice.severity = Some(value.to_string()),
            field::SEVERITY_LOCALIZED => {
                // prefer the non-localized severity when both are present
                if notice.severity.is_none() {
                    notice.severity = Some(value.to_string());
                }
            }
            field::CODE => notice.code = Some(value.to_string()),
            field::MESSAGE => notice.message = Some(value.to_string()),
            field::DETAIL => notice.detail = Some(value.to_string()),
            field::HINT => notice.hint = Some(value.to_string()),
            field::POSITION => notice.position = value.parse().ok(),
            field::INTERNAL_POSITION => notice.internal_position = value.parse().ok(),
            field::INTERNAL_QUERY => notice.internal_query = Some(value.to_string()),
            field::WHERE => notice.where_ = Some(value.to_string()),
            field::SCHEMA => notice.schema = Some(value.to_string()),
            field::TABLE => notice.table = Some(value.to_string()),
            field::COLUMN => notice.column = Some(value.to_string()),
            field::DATA_TYPE => notice.data_type = Some(value.to_string()),
            field::CONSTRAINT => notice.constraint = Some(value.to_string()),
            field::FILE => notice.file = Some(value.to_string()),
            field::LINE => notice.line = value.parse().ok(),
            field::ROUTINE => notice.routine = Some(value.to_string()),
            _ => {}
        }
    }

    Ok(notice)
}
