//! Codecs for date, time, timetz, timestamp, timestamptz, and interval.
//!
//! All temporal types ride on the PostgreSQL epoch 2000-01-01. Dates travel
//! as whole days relative to that epoch and are converted with the integer
//! Julian-day algorithm; timestamps travel as microseconds.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use zerocopy::byteorder::big_endian::{I32, I64};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use super::{CodecError, FieldContext, Value};

/// PostgreSQL epoch: 2000-01-01.
const PG_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(2000, 1, 1) {
    Some(d) => d,
    None => panic!("invalid epoch"),
};

/// Julian day number of 2000-01-01.
const POSTGRES_EPOCH_JDATE: i32 = 2_451_545;

const USECS_PER_SEC: i64 = 1_000_000;

/// A `timetz` value: time of day plus a UTC offset in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeTz {
    /// Time of day
    pub time: NaiveTime,
    /// UTC offset in seconds, positive west of Greenwich
    pub offset_secs: i32,
}

/// An `interval` value as the wire-level `(microseconds, days, months)`
/// triple. The three fields are independent; no unit is folded into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interval {
    /// Sub-day time in microseconds
    pub micros: i64,
    /// Whole days
    pub days: i32,
    /// Whole months
    pub months: i32,
}

/// Convert a calendar date to its Julian day number.
///
/// The conventional integer formulation with century corrections; `day` is
/// the day of the month.
pub fn date2j(year: i32, month: u32, day: u32) -> i32 {
    let (mut y, mut m) = (year as i64, month as i64);
    if m > 2 {
        m += 1;
        y += 4800;
    } else {
        m += 13;
        y += 4799;
    }
    let century = y / 100;
    let mut julian = y * 365 - 32167;
    julian += y / 4 - century + century / 4;
    julian += 7834 * m / 256 + day as i64;
    julian as i32
}

/// Convert a Julian day number back to `(year, month, day)`.
pub fn j2date(julian_day: i32) -> (i32, u32, u32) {
    let mut julian = julian_day as u64 + 32044;
    let mut quad = julian / 146097;
    let extra = (julian - quad * 146097) * 4 + 3;
    julian += 60 + quad * 3 + extra / 146097;
    quad = julian / 1461;
    julian -= quad * 1461;
    let mut y = (julian * 4 / 1461) as i64;
    julian = if y != 0 {
        (julian + 305) % 365
    } else {
        (julian + 306) % 366
    } + 123;
    y += (quad * 4) as i64;
    let year = y - 4800;
    quad = julian * 2141 / 65536;
    let day = julian - 7834 * quad / 256;
    let month = (quad + 10) % 12 + 1;
    (year as i32, month as u32, day as u32)
}

// === date (oid 1082) ===

pub(super) fn encode_date(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Date(date) => {
            let days = date2j(date.year(), date.month(), date.day()) - POSTGRES_EPOCH_JDATE;
            Ok(days.to_be_bytes().to_vec())
        }
        other => Err(CodecError::mismatch(ctx.type_oid, "date", other)),
    }
}

pub(super) fn decode_date(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    let days = i32::from_be_bytes(ctx.fixed::<4>()?);
    let (year, month, day) = j2date(days + POSTGRES_EPOCH_JDATE);
    NaiveDate::from_ymd_opt(year, month, day)
        .map(Value::Date)
        .ok_or_else(|| CodecError::malformed(ctx.type_oid, format!("day offset {days} out of range")))
}

// === time (oid 1083) ===

fn time_to_micros(time: &NaiveTime) -> i64 {
    time.num_seconds_from_midnight() as i64 * USECS_PER_SEC + time.nanosecond() as i64 / 1000
}

fn micros_to_time(micros: i64, ctx: &FieldContext<'_>) -> Result<NaiveTime, CodecError> {
    let secs = micros.div_euclid(USECS_PER_SEC);
    let nano = micros.rem_euclid(USECS_PER_SEC) * 1000;
    u32::try_from(secs)
        .ok()
        .and_then(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, nano as u32))
        .ok_or_else(|| CodecError::malformed(ctx.type_oid, format!("{micros}us is not a time of day")))
}

pub(super) fn encode_time(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Time(time) => Ok(time_to_micros(time).to_be_bytes().to_vec()),
        other => Err(CodecError::mismatch(ctx.type_oid, "time", other)),
    }
}

pub(super) fn decode_time(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    let micros = i64::from_be_bytes(ctx.fixed::<8>()?);
    Ok(Value::Time(micros_to_time(micros, ctx)?))
}

// === timetz (oid 1266) ===

pub(super) fn encode_timetz(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::TimeTz(tz) => {
            let mut out = time_to_micros(&tz.time).to_be_bytes().to_vec();
            out.extend_from_slice(&tz.offset_secs.to_be_bytes());
            Ok(out)
        }
        other => Err(CodecError::mismatch(ctx.type_oid, "timetz", other)),
    }
}

/// Wire layout of a timetz payload.
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
struct TimeTzWire {
    micros: I64,
    offset_secs: I32,
}

pub(super) fn decode_timetz(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    let wire =
        TimeTzWire::ref_from_bytes(ctx.payload).map_err(|_| CodecError::LengthMismatch {
            oid: ctx.type_oid,
            expected: 12,
            got: ctx.payload.len(),
        })?;
    Ok(Value::TimeTz(TimeTz {
        time: micros_to_time(wire.micros.get(), ctx)?,
        offset_secs: wire.offset_secs.get(),
    }))
}

// === timestamp (oid 1114) / timestamptz (oid 1184) ===

fn epoch_naive() -> NaiveDateTime {
    PG_EPOCH.and_hms_opt(0, 0, 0).expect("valid epoch")
}

fn naive_to_micros(dt: &NaiveDateTime, ctx: &FieldContext<'_>) -> Result<i64, CodecError> {
    dt.signed_duration_since(epoch_naive())
        .num_microseconds()
        .ok_or_else(|| CodecError::malformed(ctx.type_oid, "timestamp out of range"))
}

fn micros_to_naive(micros: i64, ctx: &FieldContext<'_>) -> Result<NaiveDateTime, CodecError> {
    epoch_naive()
        .checked_add_signed(chrono::Duration::microseconds(micros))
        .ok_or_else(|| CodecError::malformed(ctx.type_oid, format!("{micros}us overflows timestamp")))
}

pub(super) fn encode_timestamp(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Timestamp(dt) => Ok(naive_to_micros(dt, ctx)?.to_be_bytes().to_vec()),
        other => Err(CodecError::mismatch(ctx.type_oid, "timestamp", other)),
    }
}

pub(super) fn decode_timestamp(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    let micros = i64::from_be_bytes(ctx.fixed::<8>()?);
    Ok(Value::Timestamp(micros_to_naive(micros, ctx)?))
}

pub(super) fn encode_timestamptz(
    value: &Value,
    ctx: &FieldContext<'_>,
) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::TimestampTz(dt) => {
            Ok(naive_to_micros(&dt.naive_utc(), ctx)?.to_be_bytes().to_vec())
        }
        other => Err(CodecError::mismatch(ctx.type_oid, "timestamptz", other)),
    }
}

pub(super) fn decode_timestamptz(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    let micros = i64::from_be_bytes(ctx.fixed::<8>()?);
    Ok(Value::TimestampTz(
        micros_to_naive(micros, ctx)?.and_utc(),
    ))
}

// === interval (oid 1187) ===

pub(super) fn encode_interval(value: &Value, ctx: &FieldContext<'_>) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Interval(interval) => {
            let mut out = interval.micros.to_be_bytes().to_vec();
            out.extend_from_slice(&interval.days.to_be_bytes());
            out.extend_from_slice(&interval.months.to_be_bytes());
            Ok(out)
        }
        other => Err(CodecError::mismatch(ctx.type_oid, "interval", other)),
    }
}

/// Wire layout of an interval payload.
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
struct IntervalWire {
    micros: I64,
    days: I32,
    months: I32,
}

pub(super) fn decode_interval(ctx: &FieldContext<'_>) -> Result<Value, CodecError> {
    let wire =
        IntervalWire::ref_from_bytes(ctx.payload).map_err(|_| CodecError::LengthMismatch {
            oid: ctx.type_oid,
            expected: 16,
            got: ctx.payload.len(),
        })?;
    Ok(Value::Interval(Interval {
        micros: wire.micros.get(),
        days: wire.days.get(),
        months: wire.months.get(),
    }))
}
