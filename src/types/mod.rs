//! Binary type codecs and the process-wide OID registry.
//!
//! Every PostgreSQL type the crate understands is a pair of pure functions
//! `(encode, decode)` over the type's binary wire representation, keyed by
//! type OID. The registry is populated with the built-in catalogue at first
//! use and can be extended with [`register`]; registration is additive and
//! duplicate OIDs are an error. Text format is never produced or accepted.

mod datetime;
mod json;
mod net;
mod primitives;

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use thiserror::Error;

pub use datetime::{Interval, TimeTz, date2j, j2date};
pub use net::{InetAddr, MacAddr};

use crate::protocol::types::{FormatCode, Oid, oid};

/// A dynamically typed PostgreSQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// `bool` (OID 16)
    Bool(bool),
    /// `int2` (OID 21)
    Int2(i16),
    /// `int4` (OID 23)
    Int4(i32),
    /// `int8` (OID 20)
    Int8(i64),
    /// `oid` (OID 26)
    Oid(u32),
    /// `float4` (OID 700)
    Float4(f32),
    /// `float8` (OID 701)
    Float8(f64),
    /// `text` (OID 25) and `name` (OID 19)
    Text(String),
    /// `bytea` (OID 17)
    Bytes(Vec<u8>),
    /// `date` (OID 1082)
    Date(NaiveDate),
    /// `time` (OID 1083)
    Time(NaiveTime),
    /// `timetz` (OID 1266)
    TimeTz(TimeTz),
    /// `timestamp` (OID 1114)
    Timestamp(NaiveDateTime),
    /// `timestamptz` (OID 1184)
    TimestampTz(DateTime<Utc>),
    /// `interval` (OID 1187)
    Interval(Interval),
    /// `uuid` (OID 2950)
    Uuid(uuid::Uuid),
    /// `inet` (OID 869) and `cidr` (OID 650)
    Inet(InetAddr),
    /// `macaddr` (OID 829)
    MacAddr(MacAddr),
    /// `json` (OID 114) and `jsonb` (OID 3802)
    Json(serde_json::Value),
}

impl Value {
    /// Human-readable name of the variant, used in codec error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int2(_) => "int2",
            Value::Int4(_) => "int4",
            Value::Int8(_) => "int8",
            Value::Oid(_) => "oid",
            Value::Float4(_) => "float4",
            Value::Float8(_) => "float8",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytea",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::TimeTz(_) => "timetz",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Interval(_) => "interval",
            Value::Uuid(_) => "uuid",
            Value::Inet(_) => "inet",
            Value::MacAddr(_) => "macaddr",
            Value::Json(_) => "json",
        }
    }

    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Widened integer view of Int2/Int4/Int8.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int2(v) => Some(*v as i64),
            Value::Int4(v) => Some(*v as i64),
            Value::Int8(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrow the string of a Text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean of a Bool value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the bytes of a Bytes value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int2(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int4(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int8(v)
    }
}
impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float4(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float8(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}
impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}
impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}
impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}
impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}
impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::TimestampTz(v)
    }
}
impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::Uuid(v)
    }
}
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}
impl From<Interval> for Value {
    fn from(v: Interval) -> Self {
        Value::Interval(v)
    }
}
impl From<InetAddr> for Value {
    fn from(v: InetAddr) -> Self {
        Value::Inet(v)
    }
}
impl From<MacAddr> for Value {
    fn from(v: MacAddr) -> Self {
        Value::MacAddr(v)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Codec failure.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No codec registered for the OID.
    #[error("no codec registered for oid {0}")]
    UnknownOid(Oid),

    /// [`register`] was called with an OID that already has a codec.
    #[error("a codec is already registered for oid {0}")]
    DuplicateOid(Oid),

    /// The value cannot satisfy the wire layout of the target type.
    #[error("cannot encode {value} value as oid {oid} ({expected})")]
    TypeMismatch {
        /// Target type OID
        oid: Oid,
        /// Name of the expected wire type
        expected: &'static str,
        /// Kind of the supplied value
        value: &'static str,
    },

    /// The inbound payload does not have the expected fixed length.
    #[error("oid {oid}: expected {expected}-byte payload, got {got}")]
    LengthMismatch {
        /// Type OID
        oid: Oid,
        /// Expected payload length
        expected: usize,
        /// Actual payload length
        got: usize,
    },

    /// Codecs operate on binary format only.
    #[error("text format is not supported")]
    TextFormat,

    /// jsonb payload with a version byte other than 1.
    #[error("unsupported jsonb version {0}")]
    JsonbVersion(u8),

    /// inet/cidr payload with a family byte other than 2 (v4) or 3 (v6).
    #[error("unknown inet address family {0}")]
    AddressFamily(u8),

    /// Any other malformed payload or unrepresentable value.
    #[error("oid {oid}: {message}")]
    Malformed {
        /// Type OID
        oid: Oid,
        /// Failure detail
        message: String,
    },
}

impl CodecError {
    pub(crate) fn mismatch(oid: Oid, expected: &'static str, value: &Value) -> Self {
        CodecError::TypeMismatch {
            oid,
            expected,
            value: value.kind(),
        }
    }

    pub(crate) fn malformed(oid: Oid, message: impl Into<String>) -> Self {
        CodecError::Malformed {
            oid,
            message: message.into(),
        }
    }
}

/// Server parameter map, updated from ParameterStatus messages.
#[derive(Debug, Clone, Default)]
pub struct ServerParams {
    map: HashMap<String, String>,
}

impl ServerParams {
    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Iterate over all known parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn set(&mut self, name: String, value: String) {
        self.map.insert(name, value);
    }
}

/// Per-field context handed to codecs.
///
/// Carries the wire metadata of the field plus the raw payload (empty when
/// encoding) and read access to the session's server parameters for codecs
/// that need them.
pub struct FieldContext<'a> {
    /// Data type OID
    pub type_oid: Oid,
    /// Declared type size (negative = variable)
    pub type_size: i16,
    /// Type modifier
    pub type_modifier: i32,
    /// Format code; the core always negotiates binary
    pub format: FormatCode,
    /// Raw payload bytes (empty for encoding contexts)
    pub payload: &'a [u8],
    params: &'a ServerParams,
}

impl<'a> FieldContext<'a> {
    /// Build a context for decoding a field payload.
    pub fn new(
        type_oid: Oid,
        type_size: i16,
        type_modifier: i32,
        format: FormatCode,
        payload: &'a [u8],
        params: &'a ServerParams,
    ) -> Self {
        Self {
            type_oid,
            type_size,
            type_modifier,
            format,
            payload,
            params,
        }
    }

    /// Build a context for encoding a parameter of the given type.
    pub fn for_encode(type_oid: Oid, params: &'a ServerParams) -> Self {
        Self {
            type_oid,
            type_size: -1,
            type_modifier: -1,
            format: FormatCode::Binary,
            payload: &[],
            params,
        }
    }

    /// Look up a server parameter (e.g. `TimeZone`).
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// The payload as a fixed-size array, or `LengthMismatch`.
    pub(crate) fn fixed<const N: usize>(&self) -> Result<[u8; N], CodecError> {
        self.payload
            .try_into()
            .map_err(|_| CodecError::LengthMismatch {
                oid: self.type_oid,
                expected: N,
                got: self.payload.len(),
            })
    }
}

/// Serialization half of a codec: value in, payload bytes out.
pub type EncodeFn = fn(&Value, &FieldContext<'_>) -> Result<Vec<u8>, CodecError>;

/// Deserialization half of a codec: field context in, value out.
pub type DecodeFn = fn(&FieldContext<'_>) -> Result<Value, CodecError>;

/// A registered type codec.
#[derive(Clone, Copy)]
pub struct Codec {
    /// Serialize a value into its binary representation.
    pub encode: EncodeFn,
    /// Deserialize a binary payload into a value.
    pub decode: DecodeFn,
}

static REGISTRY: LazyLock<RwLock<HashMap<Oid, Codec>>> =
    LazyLock::new(|| RwLock::new(builtins()));

/// Register a codec for a type OID.
///
/// Registration is additive; attempting to replace an existing codec fails
/// with [`CodecError::DuplicateOid`] so conflicting registrations surface at
/// startup instead of silently overwriting each other.
pub fn register(oid: Oid, codec: Codec) -> Result<(), CodecError> {
    let mut map = REGISTRY.write().expect("codec registry poisoned");
    if map.contains_key(&oid) {
        return Err(CodecError::DuplicateOid(oid));
    }
    map.insert(oid, codec);
    Ok(())
}

/// Look up the codec for a type OID.
pub fn lookup(oid: Oid) -> Result<Codec, CodecError> {
    REGISTRY
        .read()
        .expect("codec registry poisoned")
        .get(&oid)
        .copied()
        .ok_or(CodecError::UnknownOid(oid))
}

/// Serialize a value for the context's type OID.
pub fn encode_value(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    let codec = lookup(ctx.type_oid)?;
    (codec.encode)(value, ctx)
}

/// Deserialize the context's payload. Text-format fields are refused.
pub fn decode_field(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    if ctx.format != FormatCode::Binary {
        return Err(CodecError::TextFormat);
    }
    let codec = lookup(ctx.type_oid)?;
    (codec.decode)(ctx)
}

fn builtins() -> HashMap<Oid, Codec> {
    let mut map = HashMap::new();
    let mut add = |oid: Oid, encode: EncodeFn, decode: DecodeFn| {
        map.insert(oid, Codec { encode, decode });
    };

    add(oid::BOOL, primitives::encode_bool, primitives::decode_bool);
    add(oid::BYTEA, primitives::encode_bytea, primitives::decode_bytea);
    add(oid::INT2, primitives::encode_int2, primitives::decode_int2);
    add(oid::INT4, primitives::encode_int4, primitives::decode_int4);
    add(oid::INT8, primitives::encode_int8, primitives::decode_int8);
    add(oid::OID, primitives::encode_oid, primitives::decode_oid);
    add(oid::TEXT, primitives::encode_text, primitives::decode_text);
    add(oid::NAME, primitives::encode_text, primitives::decode_text);
    add(oid::FLOAT4, primitives::encode_float4, primitives::decode_float4);
    add(oid::FLOAT8, primitives::encode_float8, primitives::decode_float8);

    add(oid::DATE, datetime::encode_date, datetime::decode_date);
    add(oid::TIME, datetime::encode_time, datetime::decode_time);
    add(oid::TIMETZ, datetime::encode_timetz, datetime::decode_timetz);
    add(
        oid::TIMESTAMP,
        datetime::encode_timestamp,
        datetime::decode_timestamp,
    );
    add(
        oid::TIMESTAMPTZ,
        datetime::encode_timestamptz,
        datetime::decode_timestamptz,
    );
    add(
        oid::INTERVAL,
        datetime::encode_interval,
        datetime::decode_interval,
    );

    add(oid::UUID, primitives::encode_uuid, primitives::decode_uuid);
    add(oid::INET, net::encode_inet, net::decode_inet);
    add(oid::CIDR, net::encode_inet, net::decode_inet);
    add(oid::MACADDR, net::encode_macaddr, net::decode_macaddr);
    add(oid::JSON, json::encode_json, json::decode_json);
    add(oid::JSONB, json::encode_jsonb, json::decode_jsonb);

    map
}
