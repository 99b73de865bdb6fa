//! Streaming service scrapers.
//!
//! Each service fetches JSON through [`HttpClient`](crate::http::HttpClient)
//! and hands it to pure `parse_*` functions that build [`Title`](crate::Title)s.

pub mod appletvplus;
pub mod disneyplus;
pub mod hbogoasia;
pub mod iqiyi;
pub mod kktv;

use serde_json::Value;

/// String at a JSON pointer, if present.
pub(crate) fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

/// Non-negative integer that may be encoded as a number or a string.
pub(crate) fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Year from a number, a numeric string, or the first four characters of a date.
pub(crate) fn as_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.get(..4).and_then(|y| y.parse().ok()),
        _ => None,
    }
}
