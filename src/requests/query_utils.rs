use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use super::manga::ListKind;
use super::{Error, Result};

/// Number of search results the backend returns per page
pub const PAGE_SIZE: u32 = 20;

/// Characters that may not appear verbatim inside a single path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Anything that can be serialized into a query string with [serde_qs]
pub trait Query: Serialize + std::fmt::Debug {}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Copy)]
pub struct ListQuery {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ListKind>,
}
impl Query for ListQuery {}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchQuery {
    pub limit: u32,
    pub offset: u32,
}
impl Query for SearchQuery {}

/// Offset of the first entry on a 1-indexed search `page`
pub fn search_offset(page: u32) -> Result<u32> {
    if page == 0 {
        return Err(Error::validation("page", "pages are numbered from 1"));
    }

    (page - 1)
        .checked_mul(PAGE_SIZE)
        .ok_or_else(|| Error::validation("page", format!("page {page} is out of range")))
}

/// Percent-encodes `raw` so it can be used as one path segment
pub fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, SEGMENT).to_string()
}

pub trait ResponseSucceeded {
    fn response_succeeded(&self) -> Result<bool>;
}

impl ResponseSucceeded for Value {
    fn response_succeeded(&self) -> Result<bool> {
        match self.get("success") {
            Some(Value::Bool(success)) => Ok(*success),
            _ => Err(Error::ParseError),
        }
    }
}

/// Moves `field` out of an envelope and deserializes it
pub(crate) fn take_field<T: DeserializeOwned>(resp: &mut Value, field: &str) -> Result<T> {
    let data = match resp.get_mut(field) {
        Some(d) => d,
        None => return Err(Error::ParseError),
    };

    Ok(serde_json::from_value::<T>(data.take())?)
}

/// Chapter numbers come through as `"10.5"` from some sources and `10.5` from others
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or a number, got {other}"
        ))),
    }
}

/// Years are either a number, a numeric string, or some marker such as `"Unknown"`
pub(crate) fn lenient_year<'de, D>(deserializer: D) -> std::result::Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let year = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    Ok(year)
}
