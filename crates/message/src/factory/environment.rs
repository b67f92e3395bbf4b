use crate::server_request::Params;
use bytes::Bytes;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Everything the hosting environment knows about the current request.
///
/// The snapshot is always passed explicitly; nothing in this crate reads process-wide
/// state. It can be deserialized, e.g. from a JSON dump of a CGI environment:
///
/// ```json
/// {
///   "server": { "REQUEST_METHOD": "POST", "HTTP_HOST": "example.com", "SERVER_PORT": 8080 },
///   "cookies": { "session": "abc" },
///   "query": { "page": "2" },
///   "post": { "name": "terry" },
///   "files": { "avatar": { "tmp_name": "/tmp/php1", "name": "a.png", "type": "image/png", "size": 10, "error": 0 } },
///   "input": ""
/// }
/// ```
///
/// Scalar parameter values (numbers, booleans) are turned into strings, other values are
/// dropped. A payload that is not UTF-8 can be given as a byte array: `"input": [255, 0]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnvironmentSnapshot {
    #[serde(deserialize_with = "scalar_params")]
    pub server: Params,
    #[serde(deserialize_with = "scalar_params")]
    pub cookies: Params,
    #[serde(deserialize_with = "scalar_params")]
    pub query: Params,
    #[serde(deserialize_with = "scalar_params")]
    pub post: Params,
    pub files: Value,
    /// The raw request payload, given as a string or as an array of bytes.
    pub input: Bytes,
}

impl EnvironmentSnapshot {
    /// Derives request headers from the server params.
    ///
    /// `HTTP_ACCEPT_LANGUAGE` becomes `accept-language`; `CONTENT_TYPE` and
    /// `CONTENT_LENGTH`, which servers report without the `HTTP_` prefix, are included too.
    /// Each header appears once: when both `CONTENT_TYPE` and `HTTP_CONTENT_TYPE` are set,
    /// the prefixed one wins.
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = BTreeMap::new();
        for (key, value) in &self.server {
            match key.strip_prefix("HTTP_") {
                Some(name) => {
                    headers.insert(header_name(name), value.clone());
                }
                None if key == "CONTENT_TYPE" || key == "CONTENT_LENGTH" => {
                    headers.entry(header_name(key)).or_insert_with(|| value.clone());
                }
                None => {}
            }
        }
        headers.into_iter().collect()
    }

    pub fn server_param(&self, key: &str) -> Option<&str> {
        self.server.get(key).map(String::as_str)
    }
}

fn header_name(key: &str) -> String {
    key.to_ascii_lowercase().replace('_', "-")
}

fn scalar_params<'de, D>(deserializer: D) -> Result<Params, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    let params = raw
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            Value::Number(n) => Some((key, n.to_string())),
            Value::Bool(b) => Some((key, if b { "1".to_owned() } else { String::new() })),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        })
        .collect();
    Ok(params)
}
