//! Extended query protocol messages.

use crate::protocol::codec::MessageBuilder;
use crate::protocol::types::Oid;

/// Write a Parse message.
///
/// - `name`: statement name (empty for the unnamed statement)
/// - `sql`: query text with `$1`, `$2`, ... placeholders
/// - `param_oids`: declared parameter type OIDs (empty lets the server infer)
pub fn write_parse(buf: &mut Vec<u8>, name: &str, sql: &str, param_oids: &[Oid]) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::PARSE);
    msg.cstr(name);
    msg.cstr(sql);
    msg.i16(param_oids.len() as i16);
    for &oid in param_oids {
        msg.u32(oid);
    }
    msg.finish();
}

/// Write a Bind message with all-binary parameters and results.
///
/// A single format code of 1 in each format list applies to every parameter
/// and every result column. `args` holds the serialized parameter payloads;
/// `None` binds SQL NULL (length -1 on the wire).
pub fn write_bind(
    buf: &mut Vec<u8>,
    portal: &str,
    statement: &str,
    args: &[Option<Vec<u8>>],
) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::BIND);
    msg.cstr(portal);
    msg.cstr(statement);

    // one format code covering all parameters: binary
    msg.i16(1);
    msg.i16(1);

    msg.i16(args.len() as i16);
    for arg in args {
        match arg {
            Some(data) => {
                msg.i32(data.len() as i32);
                msg.bytes(data);
            }
            None => {
                msg.i32(-1);
            }
        }
    }

    // one format code covering all result columns: binary
    msg.i16(1);
    msg.i16(1);

    msg.finish();
}

/// Write a Describe message. `kind` is `b'S'` (statement) or `b'P'` (portal).
pub fn write_describe(buf: &mut Vec<u8>, kind: u8, name: &str) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::DESCRIBE);
    msg.u8(kind);
    msg.cstr(name);
    msg.finish();
}

/// Write an Execute message. `max_rows` of 0 means unlimited.
pub fn write_execute(buf: &mut Vec<u8>, portal: &str, max_rows: i32) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::EXECUTE);
    msg.cstr(portal);
    msg.i32(max_rows);
    msg.finish();
}

/// Write a Close message. `kind` is `b'S'` (statement) or `b'P'` (portal).
///
/// Closing a statement implicitly closes any portal bound from it.
pub fn write_close(buf: &mut Vec<u8>, kind: u8, name: &str) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::CLOSE);
    msg.u8(kind);
    msg.cstr(name);
    msg.finish();
}

/// Write a Flush message, forcing pending responses without ending the
/// extended-query sequence.
pub fn write_flush(buf: &mut Vec<u8>) {
    MessageBuilder::new(buf, super::msg_type::FLUSH).finish();
}

/// Write a Sync message, ending the extended-query sequence. The server
/// answers with ReadyForQuery after processing it.
pub fn write_sync(buf: &mut Vec<u8>) {
    MessageBuilder::new(buf, super::msg_type::SYNC).finish();
}
