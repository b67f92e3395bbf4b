//! The immutable envelope shared by requests and responses.
//!
//! [`Message`] holds the protocol version, the headers and the body. The [`HttpMessage`]
//! trait exposes the getters and with-ers on top of it, so [`Request`](crate::Request),
//! [`Response`](crate::Response) and [`ServerRequest`](crate::ServerRequest) all share
//! the same header handling.
//!
//! Every with-er clones the receiver and replaces one field. Headers and body are held
//! behind `Arc`s, so the clone shares whatever it does not replace.

use crate::error::MessageError;
use crate::headers::{HeaderBag, IntoHeaderValues};
use crate::stream::Stream;
use http::{HeaderMap, Version};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Message {
    version: Version,
    headers: Arc<HeaderBag>,
    body: Arc<Stream>,
}

impl Default for Message {
    fn default() -> Self {
        Self { version: Version::HTTP_11, headers: Arc::default(), body: Arc::new(Stream::memory()) }
    }
}

pub(crate) mod sealed {
    use super::Message;

    /// Gives the [`HttpMessage`](super::HttpMessage) methods access to the envelope,
    /// without letting callers mutate a message in place.
    pub trait Envelope {
        fn envelope(&self) -> &Message;

        fn envelope_mut(&mut self) -> &mut Message;
    }
}

impl sealed::Envelope for Message {
    fn envelope(&self) -> &Message {
        self
    }

    fn envelope_mut(&mut self) -> &mut Message {
        self
    }
}

impl HttpMessage for Message {}

/// Getters and with-ers common to every message.
///
/// Header names are case-insensitive. Lookups with an invalid name simply find nothing,
/// while with-ers fail with [`MessageError::InvalidHeaderName`] or
/// [`MessageError::InvalidHeaderValue`].
pub trait HttpMessage: sealed::Envelope + Clone {
    /// The protocol version as a string: `1.0`, `1.1`, `2.0` or `3.0`.
    fn protocol_version(&self) -> &'static str {
        version_to_str(self.envelope().version)
    }

    fn version(&self) -> Version {
        self.envelope().version
    }

    fn with_protocol_version(&self, version: &str) -> Result<Self, MessageError> {
        let version = version_from_str(version)?;
        let mut next = self.clone();
        next.envelope_mut().version = version;
        Ok(next)
    }

    /// Iterates every header as `(name, values)`, the name in the case it was written with.
    fn headers(&self) -> impl Iterator<Item = (&str, Vec<&str>)> {
        self.envelope().headers.iter()
    }

    fn header_map(&self) -> &HeaderMap {
        self.envelope().headers.as_header_map()
    }

    fn has_header(&self, name: &str) -> bool {
        self.envelope().headers.contains(name)
    }

    /// Returns the values of `name`, empty when the header is absent.
    fn header(&self, name: &str) -> Vec<&str> {
        self.envelope().headers.get(name)
    }

    /// Returns the values of `name` joined with `", "`.
    fn header_line(&self, name: &str) -> String {
        self.header(name).join(", ")
    }

    /// Replaces every value of `name`. Values are trimmed.
    fn with_header(&self, name: &str, value: impl IntoHeaderValues) -> Result<Self, MessageError> {
        let mut next = self.clone();
        Arc::make_mut(&mut next.envelope_mut().headers).set(name, value.into_header_values())?;
        Ok(next)
    }

    /// Appends values to `name`, keeping the existing ones.
    fn with_added_header(&self, name: &str, value: impl IntoHeaderValues) -> Result<Self, MessageError> {
        let mut next = self.clone();
        Arc::make_mut(&mut next.envelope_mut().headers).append(name, value.into_header_values())?;
        Ok(next)
    }

    fn without_header(&self, name: &str) -> Self {
        let mut next = self.clone();
        if self.has_header(name) {
            Arc::make_mut(&mut next.envelope_mut().headers).remove(name);
        }
        next
    }

    fn body(&self) -> &Arc<Stream> {
        &self.envelope().body
    }

    /// Replaces the body. The stream is shared, not copied.
    fn with_body(&self, body: impl Into<Arc<Stream>>) -> Self {
        let mut next = self.clone();
        next.envelope_mut().body = body.into();
        next
    }
}

pub(crate) fn version_from_str(version: &str) -> Result<Version, MessageError> {
    match version {
        "1.0" => Ok(Version::HTTP_10),
        "1.1" => Ok(Version::HTTP_11),
        "2.0" => Ok(Version::HTTP_2),
        "3.0" => Ok(Version::HTTP_3),
        other => Err(MessageError::invalid_protocol_version(other)),
    }
}

pub(crate) fn version_to_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

/// Checks a version coming from outside this crate, e.g. an `http::Request`.
pub(crate) fn ensure_supported_version(version: Version) -> Result<Version, MessageError> {
    match version {
        Version::HTTP_10 | Version::HTTP_11 | Version::HTTP_2 | Version::HTTP_3 => Ok(version),
        other => Err(MessageError::invalid_protocol_version(format!("{other:?}"))),
    }
}
