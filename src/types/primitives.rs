//! Codecs for booleans, integers, floats, text, bytea, and uuid.

use super::{CodecError, FieldContext, Value};

// === bool (oid 16) ===

pub(super) fn encode_bool(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Bool(b) => Ok(vec![*b as u8]),
        other => Err(CodecError::mismatch(ctx.type_oid, "bool", other)),
    }
}

pub(super) fn decode_bool(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    let [byte] = ctx.fixed::<1>()?;
    Ok(Value::Bool(byte != 0))
}

// === bytea (oid 17) ===

pub(super) fn encode_bytea(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Bytes(data) => Ok(data.clone()),
        other => Err(CodecError::mismatch(ctx.type_oid, "bytea", other)),
    }
}

pub(super) fn decode_bytea(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    Ok(Value::Bytes(ctx.payload.to_vec()))
}

// === int2 (oid 21) ===

pub(super) fn encode_int2(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Int2(v) => Ok(v.to_be_bytes().to_vec()),
        other => Err(CodecError::mismatch(ctx.type_oid, "int2", other)),
    }
}

pub(super) fn decode_int2(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    Ok(Value::Int2(i16::from_be_bytes(ctx.fixed::<2>()?)))
}

// === int4 (oid 23) ===

pub(super) fn encode_int4(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Int2(v) => Ok((*v as i32).to_be_bytes().to_vec()),
        Value::Int4(v) => Ok(v.to_be_bytes().to_vec()),
        other => Err(CodecError::mismatch(ctx.type_oid, "int4", other)),
    }
}

pub(super) fn decode_int4(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    Ok(Value::Int4(i32::from_be_bytes(ctx.fixed::<4>()?)))
}

// === int8 (oid 20) ===

pub(super) fn encode_int8(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Int2(v) => Ok((*v as i64).to_be_bytes().to_vec()),
        Value::Int4(v) => Ok((*v as i64).to_be_bytes().to_vec()),
        Value::Int8(v) => Ok(v.to_be_bytes().to_vec()),
        other => Err(CodecError::mismatch(ctx.type_oid, "int8", other)),
    }
}

pub(super) fn decode_int8(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    Ok(Value::Int8(i64::from_be_bytes(ctx.fixed::<8>()?)))
}

// === oid (oid 26) ===

pub(super) fn encode_oid(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Oid(v) => Ok(v.to_be_bytes().to_vec()),
        other => Err(CodecError::mismatch(ctx.type_oid, "oid", other)),
    }
}

pub(super) fn decode_oid(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    Ok(Value::Oid(u32::from_be_bytes(ctx.fixed::<4>()?)))
}

// === text (oid 25) / name (oid 19) ===

pub(super) fn encode_text(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Text(s) => Ok(s.as_bytes().to_vec()),
        other => Err(CodecError::mismatch(ctx.type_oid, "text", other)),
    }
}

pub(super) fn decode_text(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    let s = simdutf8::compat::from_utf8(ctx.payload)
        .map_err(|e| CodecError::malformed(ctx.type_oid, format!("invalid UTF-8: {e}")))?;
    Ok(Value::Text(s.to_string()))
}

// === float4 (oid 700) / float8 (oid 701) ===

pub(super) fn encode_float4(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Float4(v) => Ok(v.to_be_bytes().to_vec()),
        other => Err(CodecError::mismatch(ctx.type_oid, "float4", other)),
    }
}

pub(super) fn decode_float4(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    Ok(Value::Float4(f32::from_be_bytes(ctx.fixed::<4>()?)))
}

pub(super) fn encode_float8(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Float4(v) => Ok((*v as f64).to_be_bytes().to_vec()),
        Value::Float8(v) => Ok(v.to_be_bytes().to_vec()),
        other => Err(CodecError::mismatch(ctx.type_oid, "float8", other)),
    }
}

pub(super) fn decode_float8(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    Ok(Value::Float8(f64::from_be_bytes(ctx.fixed::<8>()?)))
}

// === uuid (oid 2950) ===

pub(super) fn encode_uuid(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Uuid(u) => Ok(u.as_bytes().to_vec()),
        other => Err(CodecError::mismatch(ctx.type_oid, "uuid", other)),
    }
}

pub(super) fn decode_uuid(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    let bytes = ctx.fixed::<16>()?;
    Ok(Value::Uuid(uuid::Uuid::from_bytes(bytes)))
}
