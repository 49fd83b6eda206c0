//! Per-field value coercion to a declared logical type.
//!
//! Coercion only performs conversions that lose nothing: integer widths are
//! range-checked, floats must survive the round trip, decimals are rescaled
//! exactly and temporal values keep their sub-unit precision unless
//! [`CoercionConfig::allow_truncation`] says otherwise.

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use rustc_hash::FxHashMap;

use crate::config::CoercionConfig;
use crate::mapping::date_utils::{parse_date_string, parse_datetime_string, parse_time_string};
use crate::schema::{FieldDescriptor, LogicalType, TimeUnit};
use crate::value::Value;

/// Largest integer magnitude every `f32` can hold exactly
const F32_EXACT: i128 = 1 << 24;
/// Largest integer magnitude every `f64` can hold exactly
const F64_EXACT: i128 = 1 << 53;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A value that does not fit its declared field
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {reason}")]
pub struct CoercionError {
    /// Dotted path of the offending field; list elements appear by index
    pub path: String,
    pub reason: String,
}

impl CoercionError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            path: String::new(),
            reason: reason.into(),
        }
    }

    fn mismatch(value: &Value, target: &LogicalType) -> Self {
        Self::new(format!("cannot convert {} value {value} to {target}", value.kind()))
    }

    /// Prefix the path with an enclosing field name
    #[must_use]
    pub fn within(mut self, name: &str) -> Self {
        self.path = if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{name}.{}", self.path)
        };
        self
    }
}

type Coerced = std::result::Result<Value, CoercionError>;

/// Coerce `value` to the type and nullability of `field`
pub fn coerce(value: Value, field: &FieldDescriptor, config: &CoercionConfig) -> Coerced {
    coerce_to(value, field, config).map_err(|err| err.within(&field.name))
}

fn coerce_to(value: Value, field: &FieldDescriptor, config: &CoercionConfig) -> Coerced {
    if value.is_null() {
        return if field.nullable {
            Ok(Value::Null)
        } else {
            Err(CoercionError::new("null value for non-nullable field"))
        };
    }

    let target = &field.logical_type;
    match target {
        LogicalType::Boolean => match value {
            Value::Boolean(_) => Ok(value),
            other => Err(CoercionError::mismatch(&other, target)),
        },
        LogicalType::Int8
        | LogicalType::Int16
        | LogicalType::Int32
        | LogicalType::Int64
        | LogicalType::UInt8
        | LogicalType::UInt16
        | LogicalType::UInt32
        | LogicalType::UInt64 => {
            let n = value
                .as_i128()
                .ok_or_else(|| CoercionError::mismatch(&value, target))?;
            integer(n, target)
        }
        LogicalType::Float32 => match value {
            Value::Float32(_) => Ok(value),
            Value::Float64(v) => {
                #[allow(clippy::cast_possible_truncation)]
                let narrowed = v as f32;
                if v.is_nan() || f64::from(narrowed) == v {
                    Ok(Value::Float32(narrowed))
                } else {
                    Err(CoercionError::new(format!("{v} is not representable as float32")))
                }
            }
            other => exact_float(&other, F32_EXACT, target)
                .map(|n| Value::Float32(n as f32)),
        },
        LogicalType::Float64 => match value {
            Value::Float64(_) => Ok(value),
            Value::Float32(v) => Ok(Value::Float64(f64::from(v))),
            other => exact_float(&other, F64_EXACT, target).map(|n| Value::Float64(n as f64)),
        },
        LogicalType::Utf8 => match value {
            Value::Utf8(_) => Ok(value),
            Value::Enum(variant) => Ok(Value::Utf8(variant)),
            other => Err(CoercionError::mismatch(&other, target)),
        },
        LogicalType::Binary => match value {
            Value::Binary(_) => Ok(value),
            other => Err(CoercionError::mismatch(&other, target)),
        },
        LogicalType::Date => match value {
            Value::Date(_) => Ok(value),
            Value::Utf8(ref s) => parse_date_string(s, &config.date_format)
                .map(Value::Date)
                .ok_or_else(|| CoercionError::new(format!("cannot parse date from {s:?}"))),
            other => Err(CoercionError::mismatch(&other, target)),
        },
        LogicalType::Time(unit) => {
            let time = match value {
                Value::Time(time) => time,
                Value::Utf8(ref s) => parse_time_string(s)
                    .ok_or_else(|| CoercionError::new(format!("cannot parse time from {s:?}")))?,
                other => return Err(CoercionError::mismatch(&other, target)),
            };
            time_in_unit(time, *unit, config.allow_truncation).map(Value::Time)
        }
        LogicalType::Timestamp(unit) => {
            let datetime = match value {
                Value::Timestamp(datetime) => datetime,
                Value::Date(date) => date.and_time(NaiveTime::MIN),
                Value::Utf8(ref s) => parse_datetime_string(s, &config.date_format).ok_or_else(
                    || CoercionError::new(format!("cannot parse timestamp from {s:?}")),
                )?,
                other => return Err(CoercionError::mismatch(&other, target)),
            };
            timestamp_in_unit(datetime, *unit, config.allow_truncation).map(Value::Timestamp)
        }
        LogicalType::Decimal { precision, scale } => {
            let (unscaled, from_scale) = match value {
                Value::Decimal { value, scale } => (value, scale),
                ref other => (
                    other
                        .as_i128()
                        .ok_or_else(|| CoercionError::mismatch(other, target))?,
                    0,
                ),
            };
            let rescaled = rescale(unscaled, from_scale, *scale)?;
            if decimal_digits(rescaled) > u32::from(*precision) {
                return Err(CoercionError::new(format!("value does not fit {target}")));
            }
            Ok(Value::Decimal {
                value: rescaled,
                scale: *scale,
            })
        }
        LogicalType::Enum => match value {
            Value::Enum(variant) | Value::Utf8(variant) => {
                if field.variants.is_empty() || field.variants.contains(&variant) {
                    Ok(Value::Enum(variant))
                } else {
                    Err(CoercionError::new(format!("unknown variant '{variant}'")))
                }
            }
            other => Err(CoercionError::mismatch(&other, target)),
        },
        LogicalType::List(item) => match value {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, element)| {
                    coerce_to(element, item, config).map_err(|err| err.within(&index.to_string()))
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::List),
            other => Err(CoercionError::mismatch(&other, target)),
        },
        LogicalType::Struct(children) => match value {
            Value::Struct(members) => {
                let mut by_name: FxHashMap<String, Value> = members.into_iter().collect();
                let mut coerced = Vec::with_capacity(children.len());
                for child in children {
                    let member = by_name.remove(&child.name).unwrap_or(Value::Null);
                    coerced.push((child.name.clone(), coerce(member, child, config)?));
                }
                if !by_name.is_empty() {
                    log::debug!(
                        "Ignoring {} undeclared struct member(s) for field '{}'",
                        by_name.len(),
                        field.name
                    );
                }
                Ok(Value::Struct(coerced))
            }
            other => Err(CoercionError::mismatch(&other, target)),
        },
    }
}

fn integer(n: i128, target: &LogicalType) -> Coerced {
    let out_of_range = || CoercionError::new(format!("value {n} is out of range for {target}"));
    let value = match target {
        LogicalType::Int8 => Value::Int8(i8::try_from(n).map_err(|_| out_of_range())?),
        LogicalType::Int16 => Value::Int16(i16::try_from(n).map_err(|_| out_of_range())?),
        LogicalType::Int32 => Value::Int32(i32::try_from(n).map_err(|_| out_of_range())?),
        LogicalType::Int64 => Value::Int64(i64::try_from(n).map_err(|_| out_of_range())?),
        LogicalType::UInt8 => Value::UInt8(u8::try_from(n).map_err(|_| out_of_range())?),
        LogicalType::UInt16 => Value::UInt16(u16::try_from(n).map_err(|_| out_of_range())?),
        LogicalType::UInt32 => Value::UInt32(u32::try_from(n).map_err(|_| out_of_range())?),
        LogicalType::UInt64 => Value::UInt64(u64::try_from(n).map_err(|_| out_of_range())?),
        other => return Err(CoercionError::new(format!("{other} is not an integer type"))),
    };
    Ok(value)
}

/// Integer payload of `value` when it is exactly representable below `limit`
fn exact_float(
    value: &Value,
    limit: i128,
    target: &LogicalType,
) -> std::result::Result<i128, CoercionError> {
    let n = value
        .as_i128()
        .ok_or_else(|| CoercionError::mismatch(value, target))?;
    if n.abs() > limit {
        return Err(CoercionError::new(format!(
            "{n} is not exactly representable as {target}"
        )));
    }
    Ok(n)
}

fn rescale(value: i128, from: i8, to: i8) -> std::result::Result<i128, CoercionError> {
    let overflow = || CoercionError::new(format!("decimal {value}e-{from} overflows at scale {to}"));
    let diff = i32::from(to) - i32::from(from);
    let factor = 10_i128
        .checked_pow(diff.unsigned_abs())
        .ok_or_else(overflow)?;
    if diff >= 0 {
        value.checked_mul(factor).ok_or_else(overflow)
    } else if value % factor == 0 {
        Ok(value / factor)
    } else {
        Err(CoercionError::new(format!(
            "decimal {value}e-{from} loses digits at scale {to}"
        )))
    }
}

/// Number of decimal digits of an unscaled decimal value
pub(crate) fn decimal_digits(value: i128) -> u32 {
    value.unsigned_abs().checked_ilog10().map_or(1, |digits| digits + 1)
}

/// Nanoseconds per tick of `unit`
pub(crate) const fn nanos_per_tick(unit: TimeUnit) -> u32 {
    (NANOS_PER_SECOND / unit.ticks_per_second()) as u32
}

fn time_in_unit(
    time: NaiveTime,
    unit: TimeUnit,
    allow_truncation: bool,
) -> std::result::Result<NaiveTime, CoercionError> {
    let step = nanos_per_tick(unit);
    let excess = time.nanosecond() % step;
    if excess == 0 {
        return Ok(time);
    }
    if !allow_truncation {
        return Err(CoercionError::new(format!(
            "time {time} has precision finer than {}",
            unit.suffix()
        )));
    }
    time.with_nanosecond(time.nanosecond() - excess)
        .ok_or_else(|| CoercionError::new(format!("cannot truncate time {time}")))
}

fn timestamp_in_unit(
    datetime: NaiveDateTime,
    unit: TimeUnit,
    allow_truncation: bool,
) -> std::result::Result<NaiveDateTime, CoercionError> {
    if unit == TimeUnit::Nanosecond && datetime.and_utc().timestamp_nanos_opt().is_none() {
        return Err(CoercionError::new(format!(
            "timestamp {datetime} is outside the nanosecond range"
        )));
    }
    let step = nanos_per_tick(unit);
    let excess = datetime.nanosecond() % step;
    if excess == 0 {
        return Ok(datetime);
    }
    if !allow_truncation {
        return Err(CoercionError::new(format!(
            "timestamp {datetime} has precision finer than {}",
            unit.suffix()
        )));
    }
    datetime
        .with_nanosecond(datetime.nanosecond() - excess)
        .ok_or_else(|| CoercionError::new(format!("cannot truncate timestamp {datetime}")))
}
