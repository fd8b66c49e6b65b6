use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The full key/value content of one session.
pub type SessionData = BTreeMap<String, SessionValue>;

/// A value stored under a session key.
///
/// Encoded untagged, so a session file is a plain JSON object such as
/// `{"name":"Jason","count":1}`.
///
/// JSON has no NaN or infinity, so a non-finite `Float` fails to encode.
/// Whole numbers outside the `i64` range read back as `Float`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<SessionValue>),
    Map(BTreeMap<String, SessionValue>),
}

impl SessionValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[SessionValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, SessionValue>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for SessionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for SessionValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for SessionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for SessionValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for SessionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SessionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SessionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<SessionValue>> From<Vec<T>> for SessionValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<SessionValue>> From<Option<T>> for SessionValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<BTreeMap<String, SessionValue>> for SessionValue {
    fn from(entries: BTreeMap<String, SessionValue>) -> Self {
        Self::Map(entries)
    }
}

pub(crate) fn encode(data: &SessionData) -> Result<Vec<u8>, serde_json::Error> {
    if let Some(key) = data
        .iter()
        .find_map(|(key, value)| has_non_finite(value).then_some(key))
    {
        return Err(serde::ser::Error::custom(format_args!(
            "value under {key:?} holds a non-finite float"
        )));
    }
    serde_json::to_vec(data)
}

fn has_non_finite(value: &SessionValue) -> bool {
    match value {
        SessionValue::Float(number) => !number.is_finite(),
        SessionValue::List(items) => items.iter().any(has_non_finite),
        SessionValue::Map(entries) => entries.values().any(has_non_finite),
        _ => false,
    }
}

/// Empty input is rejected: an empty file is only a placeholder, never a committed session.
pub(crate) fn decode(bytes: &[u8]) -> Result<SessionData, serde_json::Error> {
    serde_json::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_json_object() {
        let data = decode(br#"{"name":"Jason","count":1,"ratio":0.5,"tags":["a",null]}"#)
            .expect("valid session json should decode");
        assert_eq!(data["name"].as_str(), Some("Jason"));
        assert_eq!(data["count"].as_i64(), Some(1));
        assert_eq!(data["ratio"].as_f64(), Some(0.5));
        assert_eq!(
            data["tags"],
            SessionValue::List(vec![SessionValue::from("a"), SessionValue::Null])
        );
    }

    #[test]
    fn whole_floats_stay_floats() {
        let mut data = SessionData::new();
        data.insert("x".to_string(), SessionValue::Float(2.0));
        let bytes = encode(&data).expect("encode should succeed");
        let decoded = decode(&bytes).expect("decode should succeed");
        assert_eq!(decoded["x"], SessionValue::Float(2.0));
    }

    #[test]
    fn non_finite_floats_are_rejected_at_any_depth() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut data = SessionData::new();
            data.insert("x".to_string(), SessionValue::Float(bad));
            assert!(encode(&data).is_err());

            let mut nested = BTreeMap::new();
            nested.insert(
                "inner".to_string(),
                SessionValue::List(vec![SessionValue::Float(1.0), SessionValue::Float(bad)]),
            );
            let mut data = SessionData::new();
            data.insert("outer".to_string(), SessionValue::Map(nested));
            let error = encode(&data).expect_err("nested non-finite float must be rejected");
            assert!(error.to_string().contains("\"outer\""));
        }
    }

    #[test]
    fn integers_beyond_i64_read_back_as_floats() {
        let data = decode(b"{\"big\":18446744073709551615}").expect("decode should succeed");
        assert!(matches!(data["big"], SessionValue::Float(_)));
    }

    #[test]
    fn empty_and_non_object_input_is_corrupt() {
        assert!(decode(b"").is_err());
        assert!(decode(b"[1,2]").is_err());
        assert!(decode(b"\x00\xffgarbage").is_err());
    }
}
