//! PostgreSQL result decoding.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies a column's PostgreSQL type name
//! 2. Category decoders extract the value as JSON
//!
//! Results of the simple query protocol arrive in text format and those of
//! prepared statements mostly in binary; the decoders accept both.

use crate::models::Row;
use serde_json::Value as JsonValue;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::{PgHasArrayType, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgRow, PgTypeInfo, PgTypeKind, PgValueFormat, PgValueRef};
use sqlx::{Column, Decode, Row as _, Type, TypeInfo, ValueRef};
use std::fmt::Write as _;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for PostgreSQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    TimeTz,
    Interval,
    Money,
    Network,
    Array,
    Unknown,
}

/// Classify a PostgreSQL type name (as reported by sqlx, e.g. `INT4`) into a category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let upper = type_name.to_ascii_uppercase();
    if upper.ends_with("[]") {
        return TypeCategory::Array;
    }
    match upper.as_str() {
        "INT2" | "INT4" | "INT8" | "SMALLINT" | "INTEGER" | "BIGINT" | "OID" => {
            TypeCategory::Integer
        }
        "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE PRECISION" => TypeCategory::Float,
        "NUMERIC" | "DECIMAL" => TypeCategory::Decimal,
        "BOOL" | "BOOLEAN" => TypeCategory::Boolean,
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" | "UNKNOWN" => {
            TypeCategory::Text
        }
        "BYTEA" => TypeCategory::Binary,
        "JSON" | "JSONB" => TypeCategory::Json,
        "UUID" => TypeCategory::Uuid,
        "TIMESTAMP" => TypeCategory::Timestamp,
        "TIMESTAMPTZ" => TypeCategory::TimestampTz,
        "DATE" => TypeCategory::Date,
        "TIME" => TypeCategory::Time,
        "TIMETZ" => TypeCategory::TimeTz,
        "INTERVAL" => TypeCategory::Interval,
        "MONEY" => TypeCategory::Money,
        "INET" | "CIDR" => TypeCategory::Network,
        _ => TypeCategory::Unknown,
    }
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Raw NUMERIC value rendered as an exact decimal string.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("NUMERIC")
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        matches!(categorize_type(ty.name()), TypeCategory::Decimal)
    }
}

impl PgHasArrayType for RawDecimal {
    fn array_type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("_numeric")
    }

    fn array_compatible(ty: &PgTypeInfo) -> bool {
        ty.name().eq_ignore_ascii_case("NUMERIC[]")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(RawDecimal(value.as_str()?.to_string())),
            PgValueFormat::Binary => numeric_from_binary(value.as_bytes()?).map(RawDecimal),
        }
    }
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Render PostgreSQL's binary NUMERIC (base-10000 digit groups) as a decimal string.
pub fn numeric_from_binary(bytes: &[u8]) -> Result<String, BoxDynError> {
    let word = |i: usize| -> Result<u16, BoxDynError> {
        bytes
            .get(i..i + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated NUMERIC value".into())
    };

    let ndigits = word(0)? as usize;
    let weight = word(2)? as i16 as i32;
    let sign = word(4)?;
    let dscale = word(6)? as usize;
    let digits = (0..ndigits)
        .map(|i| word(8 + i * 2))
        .collect::<Result<Vec<_>, _>>()?;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid NUMERIC sign 0x{other:04x}").into()),
    }

    let group = |idx: i32| -> u16 {
        usize::try_from(idx)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        for idx in 0..=weight {
            if idx == 0 {
                write!(out, "{}", group(idx))?;
            } else {
                write!(out, "{:04}", group(idx))?;
            }
        }
    }

    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut idx = weight + 1;
        while frac.len() < dscale {
            write!(frac, "{:04}", group(idx))?;
            idx += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }

    Ok(out)
}

// =============================================================================
// Interval, Money and Network Rendering
// =============================================================================

fn plural(out: &mut String, n: i64, unit: &str) {
    if n != 0 {
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = write!(out, "{n} {unit}{}", if n.abs() == 1 { "" } else { "s" });
    }
}

/// Render an interval the way PostgreSQL's default `IntervalStyle` does,
/// e.g. `1 year 2 mons 3 days 04:05:06.5`.
pub fn format_interval(interval: &PgInterval) -> String {
    let mut out = String::new();
    let months = i64::from(interval.months);
    plural(&mut out, months / 12, "year");
    plural(&mut out, months % 12, "mon");
    plural(&mut out, i64::from(interval.days), "day");

    let micros = interval.microseconds;
    if micros != 0 || out.is_empty() {
        if !out.is_empty() {
            out.push(' ');
        }
        if micros < 0 {
            out.push('-');
        }
        let total = micros.unsigned_abs();
        let secs = total / 1_000_000;
        let frac = total % 1_000_000;
        let _ = write!(out, "{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60);
        if frac != 0 {
            let digits = format!("{frac:06}");
            out.push('.');
            out.push_str(digits.trim_end_matches('0'));
        }
    }
    out
}

/// Render a MONEY amount (minor units, two fraction digits) as a decimal string.
pub fn format_money(money: PgMoney) -> String {
    let sign = if money.0 < 0 { "-" } else { "" };
    let cents = money.0.unsigned_abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

const PGSQL_AF_INET: u8 = 2;
const PGSQL_AF_INET6: u8 = 3;

/// Render binary INET/CIDR as text. The prefix length is shown for CIDR values
/// and for INET values narrower than a single host.
pub fn network_from_binary(bytes: &[u8]) -> Result<String, BoxDynError> {
    let [family, bits, is_cidr, len, addr @ ..] = bytes else {
        return Err("truncated INET value".into());
    };
    let (ip, host_bits) = match (*family, *len as usize, addr.len()) {
        (PGSQL_AF_INET, 4, 4) => {
            let octets: [u8; 4] = addr.try_into()?;
            (IpAddr::V4(Ipv4Addr::from(octets)), 32)
        }
        (PGSQL_AF_INET6, 16, 16) => {
            let octets: [u8; 16] = addr.try_into()?;
            (IpAddr::V6(Ipv6Addr::from(octets)), 128)
        }
        (other, _, _) => return Err(format!("invalid INET family {other}").into()),
    };
    if *is_cidr != 0 || *bits != host_bits {
        Ok(format!("{ip}/{bits}"))
    } else {
        Ok(ip.to_string())
    }
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Encode binary data as a base64 JSON string.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting database rows to ordered JSON maps.
pub trait RowToJson {
    fn to_row(&self) -> Row;
}

impl RowToJson for PgRow {
    fn to_row(&self) -> Row {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name());
                let value = decode_column(self, idx, category);
                (col.name().to_string(), value)
            })
            .collect()
    }
}

/// Convert a whole result set.
pub fn rows_to_json(rows: &[PgRow]) -> Vec<Row> {
    rows.iter().map(RowToJson::to_row).collect()
}

// =============================================================================
// Category Decoders
// =============================================================================

fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
    match category {
        TypeCategory::Decimal => decode_decimal(row, idx),
        TypeCategory::Integer => decode_integer(row, idx),
        TypeCategory::Boolean => decode_boolean(row, idx),
        TypeCategory::Float => decode_float(row, idx),
        TypeCategory::Binary => decode_binary_col(row, idx),
        TypeCategory::Json => decode_json(row, idx),
        TypeCategory::Uuid => decode_uuid(row, idx),
        TypeCategory::Timestamp => decode_timestamp(row, idx),
        TypeCategory::TimestampTz => decode_timestamptz(row, idx),
        TypeCategory::Date => decode_date(row, idx),
        TypeCategory::Time => decode_time(row, idx),
        TypeCategory::TimeTz => decode_timetz(row, idx),
        TypeCategory::Interval => decode_interval(row, idx),
        TypeCategory::Money => decode_money(row, idx),
        TypeCategory::Network => decode_network(row, idx),
        TypeCategory::Array => decode_array(row, idx),
        TypeCategory::Text | TypeCategory::Unknown => decode_text(row, idx),
    }
}

fn decode_decimal(row: &PgRow, idx: usize) -> JsonValue {
    match row.try_get::<Option<RawDecimal>, _>(idx) {
        Ok(Some(v)) => JsonValue::String(v.0),
        Ok(None) => JsonValue::Null,
        Err(e) => {
            tracing::error!("Failed to decode NUMERIC: {:?}", e);
            JsonValue::Null
        }
    }
}

fn decode_integer(row: &PgRow, idx: usize) -> JsonValue {
    if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
        return JsonValue::Number(v.into());
    }
    if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
        return JsonValue::Number(v.into());
    }
    if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
        return JsonValue::Number(v.into());
    }
    if let Ok(Some(v)) = row.try_get::<Option<sqlx::postgres::types::Oid>, _>(idx) {
        return JsonValue::Number(v.0.into());
    }
    JsonValue::Null
}

fn decode_boolean(row: &PgRow, idx: usize) -> JsonValue {
    row.try_get::<Option<bool>, _>(idx)
        .ok()
        .flatten()
        .map(JsonValue::Bool)
        .unwrap_or(JsonValue::Null)
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn decode_float(row: &PgRow, idx: usize) -> JsonValue {
    if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
        return float_value(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
        return float_value(v as f64);
    }
    JsonValue::Null
}

fn decode_binary_col(row: &PgRow, idx: usize) -> JsonValue {
    row.try_get::<Option<Vec<u8>>, _>(idx)
        .ok()
        .flatten()
        .map(|v| decode_binary_value(&v))
        .unwrap_or(JsonValue::Null)
}

fn decode_json(row: &PgRow, idx: usize) -> JsonValue {
    row.try_get::<Option<JsonValue>, _>(idx)
        .ok()
        .flatten()
        .unwrap_or(JsonValue::Null)
}

fn decode_uuid(row: &PgRow, idx: usize) -> JsonValue {
    row.try_get::<Option<uuid::Uuid>, _>(idx)
        .ok()
        .flatten()
        .map(|v| JsonValue::String(v.to_string()))
        .unwrap_or(JsonValue::Null)
}

fn decode_timestamp(row: &PgRow, idx: usize) -> JsonValue {
    row.try_get::<Option<chrono::NaiveDateTime>, _>(idx)
        .ok()
        .flatten()
        .map(|v| JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
        .unwrap_or(JsonValue::Null)
}

fn decode_timestamptz(row: &PgRow, idx: usize) -> JsonValue {
    row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
        .ok()
        .flatten()
        .map(|v| JsonValue::String(v.to_rfc3339()))
        .unwrap_or(JsonValue::Null)
}

fn decode_date(row: &PgRow, idx: usize) -> JsonValue {
    row.try_get::<Option<chrono::NaiveDate>, _>(idx)
        .ok()
        .flatten()
        .map(|v| JsonValue::String(v.to_string()))
        .unwrap_or(JsonValue::Null)
}

fn decode_time(row: &PgRow, idx: usize) -> JsonValue {
    row.try_get::<Option<chrono::NaiveTime>, _>(idx)
        .ok()
        .flatten()
        .map(|v| JsonValue::String(v.to_string()))
        .unwrap_or(JsonValue::Null)
}

fn decode_timetz(row: &PgRow, idx: usize) -> JsonValue {
    row.try_get::<Option<PgTimeTz>, _>(idx)
        .ok()
        .flatten()
        .map(|v| JsonValue::String(format!("{}{}", v.time, v.offset)))
        .unwrap_or(JsonValue::Null)
}

fn decode_interval(row: &PgRow, idx: usize) -> JsonValue {
    row.try_get::<Option<PgInterval>, _>(idx)
        .ok()
        .flatten()
        .map(|v| JsonValue::String(format_interval(&v)))
        .unwrap_or_else(|| decode_text(row, idx))
}

fn decode_money(row: &PgRow, idx: usize) -> JsonValue {
    row.try_get::<Option<PgMoney>, _>(idx)
        .ok()
        .flatten()
        .map(|v| JsonValue::String(format_money(v)))
        .unwrap_or_else(|| decode_text(row, idx))
}

fn decode_network(row: &PgRow, idx: usize) -> JsonValue {
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => JsonValue::Null,
        Ok(raw) if raw.format() == PgValueFormat::Binary => match raw.as_bytes() {
            Ok(bytes) => network_from_binary(bytes)
                .map(JsonValue::String)
                .unwrap_or_else(|e| {
                    tracing::error!("Failed to decode INET: {:?}", e);
                    JsonValue::Null
                }),
            Err(_) => JsonValue::Null,
        },
        _ => decode_text(row, idx),
    }
}

fn decode_array(row: &PgRow, idx: usize) -> JsonValue {
    fn array<T: Into<JsonValue>>(items: Vec<Option<T>>) -> JsonValue {
        JsonValue::Array(
            items
                .into_iter()
                .map(|v| v.map(Into::into).unwrap_or(JsonValue::Null))
                .collect(),
        )
    }

    if let Ok(v) = row.try_get::<Option<Vec<Option<String>>>, _>(idx) {
        return v.map(array).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<Option<i64>>>, _>(idx) {
        return v.map(array).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<Option<i32>>>, _>(idx) {
        return v.map(array).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<Option<bool>>>, _>(idx) {
        return v.map(array).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<Option<f64>>>, _>(idx) {
        return v
            .map(|items| {
                JsonValue::Array(
                    items
                        .into_iter()
                        .map(|f| f.map(float_value).unwrap_or(JsonValue::Null))
                        .collect(),
                )
            })
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<Option<RawDecimal>>>, _>(idx) {
        return v
            .map(|items| array(items.into_iter().map(|d| d.map(|d| d.0)).collect()))
            .unwrap_or(JsonValue::Null);
    }
    decode_text(row, idx)
}

/// Text-compatible types decode directly. Anything else falls back to the raw
/// value when it arrived as text, or when its binary form is the text itself
/// (enum labels).
fn decode_text(row: &PgRow, idx: usize) -> JsonValue {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
    }

    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => JsonValue::Null,
        Ok(raw) if raw.format() == PgValueFormat::Text => raw
            .as_str()
            .map(|s| JsonValue::String(s.to_string()))
            .unwrap_or(JsonValue::Null),
        Ok(raw) => {
            let type_info = raw.type_info().into_owned();
            let label = matches!(type_info.kind(), PgTypeKind::Enum(_));
            match raw.as_bytes() {
                Ok(bytes) if label => String::from_utf8(bytes.to_vec())
                    .map(JsonValue::String)
                    .unwrap_or(JsonValue::Null),
                _ => {
                    tracing::debug!(
                        column = idx,
                        type_name = %type_info.name(),
                        "No JSON mapping for binary column value"
                    );
                    JsonValue::Null
                }
            }
        }
        Err(e) => {
            tracing::error!("Failed to read column {}: {:?}", idx, e);
            JsonValue::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(ndigits: u16, weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&ndigits.to_be_bytes());
        bytes.extend_from_slice(&weight.to_be_bytes());
        bytes.extend_from_slice(&sign.to_be_bytes());
        bytes.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            bytes.extend_from_slice(&d.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn test_categorize_type() {
        assert_eq!(categorize_type("INT4"), TypeCategory::Integer);
        assert_eq!(categorize_type("int8"), TypeCategory::Integer);
        assert_eq!(categorize_type("NUMERIC"), TypeCategory::Decimal);
        assert_eq!(categorize_type("FLOAT8"), TypeCategory::Float);
        assert_eq!(categorize_type("BOOL"), TypeCategory::Boolean);
        assert_eq!(categorize_type("VARCHAR"), TypeCategory::Text);
        assert_eq!(categorize_type("NAME"), TypeCategory::Text);
        assert_eq!(categorize_type("JSONB"), TypeCategory::Json);
        assert_eq!(categorize_type("UUID"), TypeCategory::Uuid);
        assert_eq!(categorize_type("BYTEA"), TypeCategory::Binary);
        assert_eq!(categorize_type("TIMESTAMPTZ"), TypeCategory::TimestampTz);
        assert_eq!(categorize_type("DATE"), TypeCategory::Date);
        assert_eq!(categorize_type("TEXT[]"), TypeCategory::Array);
        assert_eq!(categorize_type("INTERVAL"), TypeCategory::Interval);
        assert_eq!(categorize_type("TIMETZ"), TypeCategory::TimeTz);
        assert_eq!(categorize_type("MONEY"), TypeCategory::Money);
        assert_eq!(categorize_type("CIDR"), TypeCategory::Network);
        // Substring matches would misfile these as integers.
        assert_eq!(categorize_type("POINT"), TypeCategory::Unknown);
        assert_eq!(categorize_type("INT4RANGE"), TypeCategory::Unknown);
    }

    #[test]
    fn test_numeric_simple() {
        // 123.45
        let bytes = numeric(2, 0, NUMERIC_POS, 2, &[123, 4500]);
        assert_eq!(numeric_from_binary(&bytes).unwrap(), "123.45");
    }

    #[test]
    fn test_numeric_negative_large() {
        // -12345678.9
        let bytes = numeric(3, 1, NUMERIC_NEG, 1, &[1234, 5678, 9000]);
        assert_eq!(numeric_from_binary(&bytes).unwrap(), "-12345678.9");
    }

    #[test]
    fn test_numeric_small_fraction() {
        // 0.001
        let bytes = numeric(1, -1, NUMERIC_POS, 3, &[10]);
        assert_eq!(numeric_from_binary(&bytes).unwrap(), "0.001");
    }

    #[test]
    fn test_numeric_trailing_zero_groups() {
        // 10000 stored as a single group with weight 1
        let bytes = numeric(1, 1, NUMERIC_POS, 0, &[1]);
        assert_eq!(numeric_from_binary(&bytes).unwrap(), "10000");
    }

    #[test]
    fn test_numeric_zero_with_scale() {
        let bytes = numeric(0, 0, NUMERIC_POS, 2, &[]);
        assert_eq!(numeric_from_binary(&bytes).unwrap(), "0.00");
    }

    #[test]
    fn test_numeric_special_values() {
        assert_eq!(
            numeric_from_binary(&numeric(0, 0, NUMERIC_NAN, 0, &[])).unwrap(),
            "NaN"
        );
        assert_eq!(
            numeric_from_binary(&numeric(0, 0, NUMERIC_NINF, 0, &[])).unwrap(),
            "-Infinity"
        );
    }

    #[test]
    fn test_numeric_truncated_input() {
        assert!(numeric_from_binary(&[0, 2, 0, 0]).is_err());
        assert!(numeric_from_binary(&numeric(2, 0, NUMERIC_POS, 0, &[1])).is_err());
    }

    #[test]
    fn test_binary_is_base64() {
        assert_eq!(
            decode_binary_value(&[0xde, 0xad, 0xbe, 0xef]),
            JsonValue::String("3q2+7w==".to_string())
        );
    }

    #[test]
    fn test_format_interval() {
        let interval = |months, days, microseconds| PgInterval {
            months,
            days,
            microseconds,
        };
        assert_eq!(format_interval(&interval(0, 1, 0)), "1 day");
        assert_eq!(
            format_interval(&interval(14, 3, 14_706_500_000)),
            "1 year 2 mons 3 days 04:05:06.5"
        );
        assert_eq!(format_interval(&interval(0, 0, -90_000_000)), "-00:01:30");
        assert_eq!(format_interval(&interval(0, 0, 0)), "00:00:00");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(PgMoney(12345)), "123.45");
        assert_eq!(format_money(PgMoney(-5)), "-0.05");
    }

    #[test]
    fn test_network_from_binary() {
        assert_eq!(
            network_from_binary(&[2, 32, 0, 4, 10, 0, 0, 1]).unwrap(),
            "10.0.0.1"
        );
        assert_eq!(
            network_from_binary(&[2, 24, 0, 4, 192, 168, 1, 7]).unwrap(),
            "192.168.1.7/24"
        );
        assert_eq!(
            network_from_binary(&[2, 8, 1, 4, 10, 0, 0, 0]).unwrap(),
            "10.0.0.0/8"
        );
        let mut v6 = vec![3, 128, 0, 16];
        v6.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        assert_eq!(network_from_binary(&v6).unwrap(), "::1");
        assert!(network_from_binary(&[2, 32, 0]).is_err());
        assert!(network_from_binary(&[9, 32, 0, 4, 1, 2, 3, 4]).is_err());
    }
}
