//! Startup and termination messages.

use crate::protocol::codec::MessageBuilder;

/// Protocol version 3.0 (0x00030000).
pub const PROTOCOL_VERSION_3_0: i32 = 196608;

/// Write a StartupMessage.
///
/// The startup message carries no type byte. Parameters are zero-terminated
/// `(name, value)` pairs followed by a single terminating zero byte.
pub fn write_startup(buf: &mut Vec<u8>, params: &[(&str, &str)]) {
    let mut msg = MessageBuilder::untyped(buf);
    msg.i32(PROTOCOL_VERSION_3_0);
    for (name, value) in params {
        msg.cstr(name);
        msg.cstr(value);
    }
    msg.u8(0);
    msg.finish();
}

/// Write a Terminate message.
pub fn write_terminate(buf: &mut Vec<u8>) {
    let msg = MessageBuilder::new(buf, super::msg_type::TERMINATE);
    msg.finish();
}
