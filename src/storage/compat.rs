//! Lenient field decoding for files written by the earlier tracker.
//!
//! That tracker wrote timestamps without an offset
//! (`2026-10-18 09:30:00.123456`, always UTC) and sometimes wrote whole
//! cent amounts as floats (`94.0`). Current files use RFC 3339 and plain
//! integers; both forms are accepted on read.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("unrecognised timestamp {raw:?}"))
}

pub(crate) fn parse_whole(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(v);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => Ok(v as i64),
        _ => Err(format!("not a whole number: {raw:?}")),
    }
}

fn parse_cents(raw: &str) -> Result<u32, String> {
    let v = parse_whole(raw)?;
    u32::try_from(v).map_err(|_| format!("negative cent amount {v}"))
}

/// Empty or whitespace-only fields read as absent.
fn optional<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(d)?.filter(|s| !s.trim().is_empty()))
}

pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    parse_timestamp(&String::deserialize(d)?).map_err(de::Error::custom)
}

pub fn opt_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    optional(d)?
        .map(|s| parse_timestamp(&s))
        .transpose()
        .map_err(de::Error::custom)
}

pub fn cents<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    parse_cents(&String::deserialize(d)?).map_err(de::Error::custom)
}

pub fn opt_cents<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    optional(d)?
        .map(|s| parse_cents(&s))
        .transpose()
        .map_err(de::Error::custom)
}

pub fn opt_whole<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    optional(d)?
        .map(|s| parse_whole(&s))
        .transpose()
        .map_err(de::Error::custom)
}
