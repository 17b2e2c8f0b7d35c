//! Simple query protocol message.

use crate::protocol::codec::MessageBuilder;

/// Write a Query message carrying one SQL text.
pub fn write_query(buf: &mut Vec<u8>, sql: &str) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::QUERY);
    msg.cstr(sql);
    msg.finish();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_layout() {
        let mut buf = Vec::new();
        write_query(&mut buf, "SELECT 1");
        assert_eq!(buf[0], b'Q');
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        assert_eq!(len as usize, buf.len() - 1);
        assert_eq!(&buf[5..], b"SELECT 1\0");
    }
}
