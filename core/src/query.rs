//! Query-string parameters.
//!
//! Values go through `serde_json`: null (including `None`) is absent and
//! dropped from the URL, strings are used as-is, numbers and booleans are
//! stringified, and arrays/objects are sent as their JSON text.

use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

/// Ordered query parameters for a GET request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pairs: Vec<(String, Value)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter. A value that cannot be represented as JSON is
    /// treated as absent.
    pub fn param<V: Serialize>(mut self, key: impl Into<String>, value: V) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.pairs.push((key.into(), value));
        self
    }

    /// Build from any value that serializes to a JSON object, such as a
    /// filter struct. Field order is preserved.
    pub fn from_serialize<S: Serialize + ?Sized>(value: &S) -> Result<Self, ApiError> {
        match serde_json::to_value(value).map_err(|e| ApiError::Serialization(e.to_string()))? {
            Value::Object(map) => Ok(Self {
                pairs: map.into_iter().collect(),
            }),
            Value::Null => Ok(Self::new()),
            other => Err(ApiError::Serialization(format!(
                "query parameters must serialize to an object, got {other}"
            ))),
        }
    }

    /// The non-absent pairs, stringified, in insertion order.
    pub fn pairs(&self) -> Vec<(&str, String)> {
        self.pairs
            .iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key.as_str(), value))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.iter().all(|(_, v)| v.is_null())
    }

    /// Form-urlencoded query string without the leading `?`.
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.pairs() {
            serializer.append_pair(key, &value);
        }
        serializer.finish()
    }
}

impl<K: Into<String>, V: Serialize> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Query::new(), |query, (key, value)| query.param(key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_values_are_omitted() {
        let query = Query::new()
            .param("state", "QLD")
            .param("page", None::<u32>)
            .param("limit", 20);
        assert_eq!(query.encode(), "state=QLD&limit=20");
    }

    #[test]
    fn scalars_are_stringified() {
        let query = Query::new()
            .param("remote", true)
            .param("rate", 42.5)
            .param("ids", vec![1, 2]);
        assert_eq!(
            query.pairs(),
            vec![
                ("remote", "true".to_string()),
                ("rate", "42.5".to_string()),
                ("ids", "[1,2]".to_string()),
            ]
        );
    }

    #[test]
    fn values_are_percent_encoded() {
        let query = Query::new().param("q", "plumber & sons");
        assert_eq!(query.encode(), "q=plumber+%26+sons");
    }

    #[test]
    fn from_serialize_keeps_field_order_and_skips_none() {
        #[derive(Serialize)]
        struct Filter {
            state: Option<&'static str>,
            limit: u32,
            keyword: Option<&'static str>,
        }
        let query = Query::from_serialize(&Filter {
            state: Some("NSW"),
            limit: 5,
            keyword: None,
        })
        .unwrap();
        assert_eq!(query.encode(), "state=NSW&limit=5");
    }

    #[test]
    fn from_serialize_rejects_non_objects() {
        let err = Query::from_serialize(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, ApiError::Serialization(_)));
    }

    #[test]
    fn only_absent_values_is_empty() {
        assert!(Query::new().is_empty());
        assert!(Query::new().param("a", None::<String>).is_empty());
        assert!(!Query::new().param("a", "b").is_empty());
    }
}
