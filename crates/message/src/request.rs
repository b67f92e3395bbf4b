//! Outgoing/client-side requests: a [`Message`] plus method, uri and request target.

use crate::error::MessageError;
use crate::message::{HttpMessage, Message, sealed::Envelope};
use crate::uri::Uri;
use crate::utils::ensure;
use http::Method;

/// The request methods a [`Request`] accepts, matched case-sensitively.
const METHODS: [Method; 9] = [
    Method::HEAD,
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::CONNECT,
    Method::OPTIONS,
    Method::TRACE,
];

#[derive(Debug, Clone)]
pub struct Request {
    message: Message,
    method: Method,
    uri: Uri,
    request_target: Option<String>,
}

impl Request {
    /// Creates a request, `method` must be one of the nine RFC 7231 methods in uppercase.
    pub fn new(method: &str, uri: &str) -> Result<Self, MessageError> {
        Ok(Self::from_parts(parse_method(method)?, Uri::new(uri)?, Message::default()))
    }

    pub(crate) fn from_parts(method: Method, uri: Uri, message: Message) -> Self {
        Self { message, method, uri, request_target: None }
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::from_parts(Method::GET, Uri::default(), Message::default())
    }
}

impl Envelope for Request {
    fn envelope(&self) -> &Message {
        &self.message
    }

    fn envelope_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

impl HttpMessage for Request {}

pub(crate) mod sealed {
    use super::Request;

    pub trait RequestEnvelope {
        fn request(&self) -> &Request;

        fn request_mut(&mut self) -> &mut Request;
    }
}

impl sealed::RequestEnvelope for Request {
    fn request(&self) -> &Request {
        self
    }

    fn request_mut(&mut self) -> &mut Request {
        self
    }
}

impl RequestMessage for Request {}

/// Getters and with-ers for the request line, shared by [`Request`] and
/// [`ServerRequest`](crate::ServerRequest).
pub trait RequestMessage: HttpMessage + sealed::RequestEnvelope {
    fn method(&self) -> &Method {
        &self.request().method
    }

    fn with_method(&self, method: &str) -> Result<Self, MessageError> {
        let method = parse_method(method)?;
        let mut next = self.clone();
        next.request_mut().method = method;
        Ok(next)
    }

    fn uri(&self) -> &Uri {
        &self.request().uri
    }

    /// Replaces the uri.
    ///
    /// When the new uri has a host, the `Host` header is updated with it, unless
    /// `preserve_host` is set and the request already carries a `Host` header.
    fn with_uri(&self, uri: Uri, preserve_host: bool) -> Result<Self, MessageError> {
        let host = host_header(&uri);
        let mut next = self.clone();
        next.request_mut().uri = uri;

        match host {
            Some(host) if !preserve_host || !self.has_header("Host") => next.with_header("Host", host),
            _ => Ok(next),
        }
    }

    /// Returns the explicit request target, or `path[?query]` of the uri (`/` when the path is empty).
    fn request_target(&self) -> String {
        let request = self.request();
        if let Some(target) = &request.request_target {
            return target.clone();
        }

        let mut target = match request.uri.path() {
            "" => "/".to_owned(),
            path => path.to_owned(),
        };

        let query = request.uri.query();
        if !query.is_empty() {
            target.push('?');
            target.push_str(query);
        }
        target
    }

    /// Overrides the request target, e.g. `*` or an absolute-form target. An empty target
    /// clears the override.
    fn with_request_target(&self, target: &str) -> Result<Self, MessageError> {
        ensure!(
            !target.chars().any(char::is_whitespace),
            MessageError::invalid_request_target("a request target cannot contain any whitespace")
        );

        let mut next = self.clone();
        next.request_mut().request_target = if target.is_empty() { None } else { Some(target.to_owned()) };
        Ok(next)
    }
}

pub(crate) fn parse_method(method: &str) -> Result<Method, MessageError> {
    METHODS.iter().find(|candidate| candidate.as_str() == method).cloned().ok_or_else(|| MessageError::invalid_method(method))
}

/// `host[:port]` for the `Host` header, the port only when it is not the scheme's default.
fn host_header(uri: &Uri) -> Option<String> {
    match (uri.host(), uri.port()) {
        ("", _) => None,
        (host, None) => Some(host.to_owned()),
        (host, Some(port)) => Some(format!("{host}:{port}")),
    }
}
