//! Authentication messages.

use md5::{Digest, Md5};

use crate::protocol::codec::MessageBuilder;

/// Write a PasswordMessage (cleartext or MD5-hashed password).
pub fn write_password(buf: &mut Vec<u8>, password: &str) {
    let mut msg = MessageBuilder::new(buf, super::msg_type::PASSWORD);
    msg.cstr(password);
    msg.finish();
}

/// Compute the MD5 password response.
///
/// Format: `"md5" + md5(md5(password + username) + salt)`, hex-encoded at
/// each stage.
pub fn md5_password(username: &str, password: &str, salt: &[u8; 4]) -> String {
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(username.as_bytes());
    let inner = format!("{:x}", hasher.finalize());

    let mut hasher = Md5::new();
    hasher.update(inner.as_bytes());
    hasher.update(salt);
    format!("md5{:x}", hasher.finalize())
}
