//! Startup-phase backend messages.

use zerocopy::{FromBytes, Immutable, KnownLayout};
use zerocopy::byteorder::big_endian::U32;

use crate::error::{Error, Result};
use crate::protocol::codec::Reader;
use crate::protocol::types::TransactionStatus;

/// Authentication sub-type constants the core understands.
pub mod auth_kind {
    pub const OK: i32 = 0;
    pub const CLEARTEXT_PASSWORD: i32 = 3;
    pub const MD5_PASSWORD: i32 = 5;
}

/// Parsed AuthenticationRequest message.
///
/// Only cleartext and MD5 are supported; every other sub-type is surfaced
/// as [`Other`][AuthRequest::Other] so the startup flow can fail with
/// `UnsupportedAuthKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequest {
    /// Authentication successful.
    Ok,
    /// Cleartext password requested.
    Cleartext,
    /// MD5 password requested, with the 4-byte salt.
    Md5 { salt: [u8; 4] },
    /// Any other sub-type (SCRAM, GSS, ...).
    Other(i32),
}

impl AuthRequest {
    /// Parse an Authentication message payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        let kind = r.i32()?;
        match kind {
            auth_kind::OK => Ok(AuthRequest::Ok),
            auth_kind::CLEARTEXT_PASSWORD => Ok(AuthRequest::Cleartext),
            auth_kind::MD5_PASSWORD => {
                let raw = r.bytes(4)?;
                let mut salt = [0u8; 4];
                salt.copy_from_slice(raw);
                Ok(AuthRequest::Md5 { salt })
            }
            other => Ok(AuthRequest::Other(other)),
        }
    }
}

/// BackendKeyData: process ID and secret key for out-of-band cancellation.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct BackendKey {
    pid: U32,
    secret_key: U32,
}

impl BackendKey {
    /// Parse a BackendKeyData message payload.
    pub fn parse(payload: &[u8]) -> Result<&Self> {
        Self::ref_from_bytes(payload)
            .map_err(|e| Error::Protocol(format!("BackendKeyData: {e:?}")))
    }

    /// Backend process ID.
    pub fn pid(&self) -> u32 {
        self.pid.get()
    }

    /// Cancellation secret.
    pub fn secret(&self) -> u32 {
        self.secret_key.get()
    }
}

/// ParameterStatus: a server parameter name and its current value.
#[derive(Debug, Clone)]
pub struct ParameterStatus<'a> {
    /// Parameter name
    pub name: &'a str,
    /// Parameter value
    pub value: &'a str,
}

impl<'a> ParameterStatus<'a> {
    /// Parse a ParameterStatus message payload.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        let name = r.cstr()?;
        let value = r.cstr()?;
        Ok(Self { name, value })
    }
}

/// ReadyForQuery: the server is idle; carries the transaction status byte.
#[derive(Debug, Clone, Copy)]
pub struct ReadyForQuery {
    /// Transaction status from the status byte.
    pub status: TransactionStatus,
}

impl ReadyForQuery {
    /// Parse a ReadyForQuery message payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        let byte = r.u8()?;
        let status = TransactionStatus::from_byte(byte).ok_or_else(|| {
            Error::Protocol(format!("ReadyForQuery: unknown status byte '{}'", byte as char))
        })?;
        Ok(Self { status })
    }
}

/// NotificationResponse: asynchronous LISTEN/NOTIFY delivery.
#[derive(Debug, Clone)]
pub struct NotificationResponse<'a> {
    /// PID of the notifying backend
    pub pid: u32,
    /// Channel name
    pub channel: &'a str,
    /// Notification payload
    pub payload: &'a str,
}

impl<'a> NotificationResponse<'a> {
    /// Parse a NotificationResponse message payload.
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        let pid = r.u32()?;
        let channel = r.cstr()?;
        let body = r.cstr()?;
        Ok(Self {
            pid,
            channel,
            payload: body,
        })
    }
}
