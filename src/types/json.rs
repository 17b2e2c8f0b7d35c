//! Codecs for json and jsonb.

use super::{CodecError, FieldContext, Value};

/// The only jsonb binary version understood today.
const JSONB_VERSION: u8 = 1;

// === json (oid 114) ===

pub(super) fn encode_json(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Json(json) => Ok(json.to_string().into_bytes()),
        other => Err(CodecError::mismatch(ctx.type_oid, "json", other)),
    }
}

pub(super) fn decode_json(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    parse_json(ctx, ctx.payload)
}

// === jsonb (oid 3802) ===
//
// Same as json with a leading version byte.

pub(super) fn encode_jsonb(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Json(json) => {
            let text = json.to_string();
            let mut out = Vec::with_capacity(text.len() + 1);
            out.push(JSONB_VERSION);
            out.extend_from_slice(text.as_bytes());
            Ok(out)
        }
        other => Err(CodecError::mismatch(ctx.type_oid, "jsonb", other)),
    }
}

pub(super) fn decode_jsonb(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    let (version, body) = ctx
        .payload
        .split_first()
        .ok_or(CodecError::LengthMismatch {
            oid: ctx.type_oid,
            expected: 1,
            got: 0,
        })?;
    if *version != JSONB_VERSION {
        return Err(CodecError::JsonbVersion(*version));
    }
    parse_json(ctx, body)
}

fn parse_json(ctx: &FieldContext<'_>, bytes: &[u8]) -> Result<Value, CodecError> {
    serde_json::from_slice(bytes)
        .map(Value::Json)
        .map_err(|e| CodecError::malformed(ctx.type_oid, format!("invalid JSON: {e}")))
}
