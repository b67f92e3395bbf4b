//! Per-component percent-encoding.
//!
//! Unreserved characters and sub-delimiters are always kept as-is, and existing `%XX`
//! triplets are preserved so already-encoded input is never double encoded. A `%` that
//! does not start a valid triplet becomes `%25`.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Everything outside `unreserved / sub-delims`, `%` excluded.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b'%');

/// `pchar` plus `/`.
const PATH: &AsciiSet = &USERINFO.remove(b':').remove(b'@').remove(b'/');

/// `pchar` plus `/` and `?`.
const QUERY_OR_FRAGMENT: &AsciiSet = &PATH.remove(b'?');

pub(crate) fn encode_user_info(input: &str) -> String {
    encode(input, USERINFO)
}

pub(crate) fn encode_path(input: &str) -> String {
    encode(input, PATH)
}

pub(crate) fn encode_query_or_fragment(input: &str) -> String {
    encode(input, QUERY_OR_FRAGMENT)
}

fn encode(input: &str, set: &'static AsciiSet) -> String {
    let mut encoded = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(idx) = rest.find('%') {
        let (head, tail) = rest.split_at(idx);
        encoded.extend(utf8_percent_encode(head, set));

        if is_percent_triplet(tail) {
            encoded.push_str(&tail[..3]);
            rest = &tail[3..];
        } else {
            encoded.push_str("%25");
            rest = &tail[1..];
        }
    }

    encoded.extend(utf8_percent_encode(rest, set));
    encoded
}

fn is_percent_triplet(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 3 && bytes[0] == b'%' && bytes[1].is_ascii_hexdigit() && bytes[2].is_ascii_hexdigit()
}
