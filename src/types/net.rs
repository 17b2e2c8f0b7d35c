//! Codecs for inet, cidr, and macaddr.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::{CodecError, FieldContext, Value};
use crate::protocol::types::oid;

/// PostgreSQL address-family byte for IPv4.
const PGSQL_AF_INET: u8 = 2;
/// PostgreSQL address-family byte for IPv6.
const PGSQL_AF_INET6: u8 = 3;

/// An `inet`/`cidr` value: an IP address with a prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InetAddr {
    /// The address
    pub addr: IpAddr,
    /// Network prefix length in bits
    pub prefix: u8,
}

impl InetAddr {
    /// Create an address with an explicit prefix length.
    pub fn new(addr: IpAddr, prefix: u8) -> Self {
        Self { addr, prefix }
    }

    /// Create a host address (full-length prefix).
    pub fn host(addr: IpAddr) -> Self {
        let prefix = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        Self { addr, prefix }
    }
}

impl std::fmt::Display for InetAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// A `macaddr` value: a 6-byte hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddr(pub [u8; 6]);

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

// === inet (oid 869) / cidr (oid 650) ===
//
// Wire layout: family, prefix bits, is-cidr flag, address length, address.

pub(super) fn encode_inet(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    let inet = match value {
        Value::Inet(inet) => inet,
        other => return Err(CodecError::mismatch(ctx.type_oid, "inet", other)),
    };
    let is_cidr = (ctx.type_oid == oid::CIDR) as u8;
    let mut out = Vec::with_capacity(20);
    match inet.addr {
        IpAddr::V4(v4) => {
            out.extend_from_slice(&[PGSQL_AF_INET, inet.prefix, is_cidr, 4]);
            out.extend_from_slice(&v4.octets());
        }
        IpAddr::V6(v6) => {
            out.extend_from_slice(&[PGSQL_AF_INET6, inet.prefix, is_cidr, 16]);
            out.extend_from_slice(&v6.octets());
        }
    }
    Ok(out)
}

pub(super) fn decode_inet(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    let payload = ctx.payload;
    if payload.len() < 4 {
        return Err(CodecError::LengthMismatch {
            oid: ctx.type_oid,
            expected: 4,
            got: payload.len(),
        });
    }
    let family = payload[0];
    let prefix = payload[1];
    // payload[2] is the is-cidr flag; inet and cidr decode identically
    let addr_len = payload[3] as usize;
    let addr_bytes = &payload[4..];
    if addr_bytes.len() != addr_len {
        return Err(CodecError::LengthMismatch {
            oid: ctx.type_oid,
            expected: 4 + addr_len,
            got: payload.len(),
        });
    }

    let addr = match (family, addr_len) {
        (PGSQL_AF_INET, 4) => {
            let octets: [u8; 4] = addr_bytes.try_into().unwrap();
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        (PGSQL_AF_INET6, 16) => {
            let octets: [u8; 16] = addr_bytes.try_into().unwrap();
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        (PGSQL_AF_INET, _) | (PGSQL_AF_INET6, _) => {
            return Err(CodecError::malformed(
                ctx.type_oid,
                format!("family {family} with {addr_len}-byte address"),
            ));
        }
        _ => return Err(CodecError::AddressFamily(family)),
    };

    Ok(Value::Inet(InetAddr { addr, prefix }))
}

// === macaddr (oid 829) ===

pub(super) fn encode_macaddr(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::MacAddr(mac) => Ok(mac.0.to_vec()),
        other => Err(CodecError::mismatch(ctx.type_oid, "macaddr", other)),
    }
}

pub(super) fn decode_macaddr(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    Ok(Value::MacAddr(MacAddr(ctx.fixed::<6>()?)))
}

#[cfg(test)]
mod tests {
    use super::super::{ServerParams, decode_field, encode_value};
    use super::*;
    use crate::protocol::types::FormatCode;

    fn ctx<'a>(type_oid: u32, payload: &'a [u8], params: &'a ServerParams) -> FieldContext<'a> {
        FieldContext::new(type_oid, -1, -1, FormatCode::Binary, payload, params)
    }

    #[test]
    fn loopback_wire_layout() {
        let params = ServerParams::default();
        let enc = FieldContext::for_encode(oid::INET, &params);
        let value = Value::Inet(InetAddr::host("127.0.0.1".parse().unwrap()));
        let bytes = encode_value(&value, &enc).unwrap();
        assert_eq!(bytes, vec![0x02, 0x20, 0x00, 0x04, 0x7f, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn cidr_sets_flag_and_decodes_like_inet() {
        let params = ServerParams::default();
        let enc = FieldContext::for_encode(oid::CIDR, &params);
        let value = Value::Inet(InetAddr::new("10.0.0.0".parse().unwrap(), 8));
        let bytes = encode_value(&value, &enc).unwrap();
        assert_eq!(bytes[2], 1);
        assert_eq!(decode_field(&ctx(oid::CIDR, &bytes, &params)).unwrap(), value);
        // the flag byte is not consulted on read
        assert_eq!(decode_field(&ctx(oid::INET, &bytes, &params)).unwrap(), value);
    }

    #[test]
    fn v6_round_trip() {
        let params = ServerParams::default();
        let enc = FieldContext::for_encode(oid::INET, &params);
        let value = Value::Inet(InetAddr::new("fe80::1".parse().unwrap(), 64));
        let bytes = encode_value(&value, &enc).unwrap();
        assert_eq!(bytes.len(), 20);
        assert_eq!(bytes[0], 3);
        assert_eq!(decode_field(&ctx(oid::INET, &bytes, &params)).unwrap(), value);
    }

    #[test]
    fn unknown_family_is_rejected() {
        let params = ServerParams::default();
        let payload = [9, 32, 0, 4, 127, 0, 0, 1];
        assert!(matches!(
            decode_field(&ctx(oid::INET, &payload, &params)),
            Err(CodecError::AddressFamily(9))
        ));
    }

    #[test]
    fn macaddr_round_trip_and_display() {
        let params = ServerParams::default();
        let enc = FieldContext::for_encode(oid::MACADDR, &params);
        let value = Value::MacAddr(MacAddr([0x08, 0x00, 0x2B, 0x01, 0x02, 0x03]));
        let bytes = encode_value(&value, &enc).unwrap();
        assert_eq!(bytes.len(), 6);
        assert_eq!(decode_field(&ctx(oid::MACADDR, &bytes, &params)).unwrap(), value);
        assert_eq!(MacAddr([0x08, 0, 0x2B, 1, 2, 3]).to_string(), "08:00:2b:01:02:03");
    }

    #[test]
    fn macaddr_length_checked() {
        let params = ServerParams::default();
        assert!(matches!(
            decode_field(&ctx(oid::MACADDR, &[1, 2, 3], &params)),
            Err(CodecError::LengthMismatch { .. })
        ));
    }
}
