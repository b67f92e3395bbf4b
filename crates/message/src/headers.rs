//! Header storage and validation shared by every message type.

use crate::error::MessageError;
use crate::utils::ensure;
use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;

/// Values accepted by the header with-ers: strings, numbers, and sequences of those.
pub trait IntoHeaderValues {
    fn into_header_values(self) -> Vec<String>;
}

macro_rules! scalar_header_values {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoHeaderValues for $ty {
                fn into_header_values(self) -> Vec<String> {
                    vec![self.to_string()]
                }
            }
        )*
    };
}

scalar_header_values!(&str, String, &String, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl<T: IntoHeaderValues> IntoHeaderValues for Vec<T> {
    fn into_header_values(self) -> Vec<String> {
        self.into_iter().flat_map(IntoHeaderValues::into_header_values).collect()
    }
}

impl<T: IntoHeaderValues, const N: usize> IntoHeaderValues for [T; N] {
    fn into_header_values(self) -> Vec<String> {
        self.into_iter().flat_map(IntoHeaderValues::into_header_values).collect()
    }
}

impl<T: IntoHeaderValues + Clone> IntoHeaderValues for &[T] {
    fn into_header_values(self) -> Vec<String> {
        self.iter().cloned().flat_map(IntoHeaderValues::into_header_values).collect()
    }
}

/// Headers keyed by lowercase name, remembering the case each name was last written with.
#[derive(Debug, Clone, Default)]
pub(crate) struct HeaderBag {
    map: HeaderMap,
    names: HashMap<HeaderName, String>,
}

impl HeaderBag {
    pub(crate) fn contains(&self, name: &str) -> bool {
        lookup_name(name).is_some_and(|name| self.map.contains_key(name))
    }

    pub(crate) fn get(&self, name: &str) -> Vec<&str> {
        let Some(name) = lookup_name(name) else {
            return Vec::new();
        };
        self.map.get_all(name).iter().filter_map(|value| value.to_str().ok()).collect()
    }

    /// Iterates `(original-case name, values)` pairs.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, Vec<&str>)> {
        self.map.keys().map(|name| {
            let display = self.names.get(name).map_or(name.as_str(), String::as_str);
            let values = self.map.get_all(name).iter().filter_map(|value| value.to_str().ok()).collect();
            (display, values)
        })
    }

    /// Replaces every value of `name`.
    pub(crate) fn set(&mut self, name: &str, values: Vec<String>) -> Result<(), MessageError> {
        let (header_name, values) = validate(name, values)?;
        self.map.remove(&header_name);
        for value in values {
            self.map.append(&header_name, value);
        }
        self.names.insert(header_name, name.trim().to_owned());
        Ok(())
    }

    /// Appends values to `name`, keeping the existing ones.
    pub(crate) fn append(&mut self, name: &str, values: Vec<String>) -> Result<(), MessageError> {
        let (header_name, values) = validate(name, values)?;
        for value in values {
            self.map.append(&header_name, value);
        }
        self.names.entry(header_name).or_insert_with(|| name.trim().to_owned());
        Ok(())
    }

    pub(crate) fn remove(&mut self, name: &str) {
        if let Some(name) = lookup_name(name) {
            self.map.remove(&name);
            self.names.remove(&name);
        }
    }

    pub(crate) fn as_header_map(&self) -> &HeaderMap {
        &self.map
    }
}

impl PartialEq for HeaderBag {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl Eq for HeaderBag {}

fn lookup_name(name: &str) -> Option<HeaderName> {
    HeaderName::from_bytes(name.trim().as_bytes()).ok()
}

fn validate(name: &str, values: Vec<String>) -> Result<(HeaderName, Vec<HeaderValue>), MessageError> {
    let trimmed = name.trim();
    ensure!(!trimmed.is_empty(), MessageError::invalid_header_name(name));
    ensure!(trimmed.bytes().all(is_token_char), MessageError::invalid_header_name(name));
    let header_name = HeaderName::from_bytes(trimmed.as_bytes()).map_err(|_| MessageError::invalid_header_name(name))?;

    let values = values
        .iter()
        .map(|value| {
            let value = value.trim();
            ensure!(value.bytes().all(is_field_char), MessageError::invalid_header_value(value));
            HeaderValue::from_str(value).map_err(|_| MessageError::invalid_header_value(value))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((header_name, values))
}

/// `tchar` of RFC 7230 section 3.2.6.
fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Visible ASCII, space and horizontal tab.
fn is_field_char(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | 0x21..=0x7e)
}

/// Parses a raw `Name: value` header block into a map.
///
/// Names and values are trimmed, and a later duplicate replaces an earlier one. Lines
/// without a colon, or whose name is not a valid header token (such as a request line or
/// a status line), are skipped.
pub fn parse_raw_header(raw: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();

    for line in raw.lines() {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };

        let name = name.trim();
        if name.is_empty() || !name.bytes().all(is_token_char) {
            continue;
        }

        headers.insert(name.to_owned(), value.trim().to_owned());
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_set_and_get() {
        let mut bag = HeaderBag::default();
        bag.set("Content-Type", vec![" text/html ".to_owned()]).unwrap();

        assert!(bag.contains("content-type"));
        assert!(bag.contains("CONTENT-TYPE"));
        assert_eq!(bag.get("Content-Type"), vec!["text/html"]);
        assert_eq!(bag.iter().collect::<Vec<_>>(), vec![("Content-Type", vec!["text/html"])]);
    }

    #[test]
    fn test_append_keeps_existing_values() {
        let mut bag = HeaderBag::default();
        bag.set("Accept", vec!["text/html".to_owned()]).unwrap();
        bag.append("accept", vec!["application/json".to_owned(), "*/*".to_owned()]).unwrap();

        assert_eq!(bag.get("accept"), vec!["text/html", "application/json", "*/*"]);
        assert_eq!(bag.iter().count(), 1);
        assert_eq!(bag.iter().next().map(|(name, _)| name), Some("Accept"));
    }

    #[test]
    fn test_remove() {
        let mut bag = HeaderBag::default();
        bag.set("X-Test", vec!["1".to_owned()]).unwrap();
        bag.remove("x-test");
        assert!(!bag.contains("X-Test"));
        assert!(bag.as_header_map().is_empty());

        bag.remove("not a header");
    }

    #[test]
    fn test_invalid_names() {
        let mut bag = HeaderBag::default();
        for name in ["", "   ", "Content Type", "Content:Type", "Frühstück", "(comment)"] {
            let result = bag.set(name, vec!["value".to_owned()]);
            assert!(matches!(result, Err(MessageError::InvalidHeaderName { .. })), "{name:?}");
        }
    }

    #[test]
    fn test_invalid_values() {
        let mut bag = HeaderBag::default();
        for value in ["line1\r\nline2", "nul\0", "中文", "bell\x07"] {
            let result = bag.set("X-Test", vec![value.to_owned()]);
            assert!(matches!(result, Err(MessageError::InvalidHeaderValue { .. })), "{value:?}");
        }
        assert!(!bag.contains("X-Test"));
    }

    #[test]
    fn test_empty_value_is_allowed() {
        let mut bag = HeaderBag::default();
        bag.set("X-Empty", vec![String::new()]).unwrap();
        assert_eq!(bag.get("x-empty"), vec![""]);
    }

    #[test]
    fn test_into_header_values() {
        assert_eq!("a".into_header_values(), vec!["a"]);
        assert_eq!(String::from("b").into_header_values(), vec!["b"]);
        assert_eq!(42_u16.into_header_values(), vec!["42"]);
        assert_eq!(1.5_f64.into_header_values(), vec!["1.5"]);
        assert_eq!(vec!["a", "b"].into_header_values(), vec!["a", "b"]);
        assert_eq!([1_i64, 2, 3].into_header_values(), vec!["1", "2", "3"]);
        assert_eq!(["x", "y"][..].into_header_values(), vec!["x", "y"]);
    }

    #[test]
    fn test_parse_raw_header() {
        let raw = indoc! {"
            GET / HTTP/1.1
            Host: 127.0.0.1:8080
            User-Agent: curl/7.79.1
            Accept: */*
            Accept:   text/html
            not a header line
        "};

        let headers = parse_raw_header(raw);
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("Host").map(String::as_str), Some("127.0.0.1:8080"));
        assert_eq!(headers.get("User-Agent").map(String::as_str), Some("curl/7.79.1"));
        assert_eq!(headers.get("Accept").map(String::as_str), Some("text/html"));
    }

    #[test]
    fn test_parse_raw_response_header() {
        let raw = "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=UTF-8\r\n\r\n";
        let headers = parse_raw_header(raw);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["Content-Type"], "text/html; charset=UTF-8");

        assert!(parse_raw_header("").is_empty());
    }
}
