//! Conversions between this crate's messages and the [`http`] crate's types.
//!
//! Bodies are buffered: an `http` body becomes an in-memory [`Stream`], and a message
//! body is read in full (rewinding first when possible).

use crate::error::MessageError;
use crate::message::{HttpMessage, Message, ensure_supported_version, version_to_str};
use crate::request::{Request, RequestMessage, parse_method};
use crate::response::Response;
use crate::server_request::ServerRequest;
use crate::stream::Stream;
use crate::uri::Uri;
use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};

fn build_message(version: Version, headers: &HeaderMap, body: Bytes) -> Result<Message, MessageError> {
    let version = version_to_str(ensure_supported_version(version)?);
    let mut message = Message::default().with_protocol_version(version)?.with_body(Stream::from(body));

    for (name, value) in headers {
        let value = value.to_str().map_err(|_| MessageError::invalid_header_value(String::from_utf8_lossy(value.as_bytes())))?;
        message = message.with_added_header(name.as_str(), value)?;
    }
    Ok(message)
}

fn body_bytes<M: HttpMessage>(message: &M) -> Result<Bytes, MessageError> {
    let body = message.body();
    if !body.is_readable() {
        return Ok(Bytes::new());
    }
    Ok(body.read_all()?)
}

impl TryFrom<http::Request<Bytes>> for Request {
    type Error = MessageError;

    fn try_from(request: http::Request<Bytes>) -> Result<Self, Self::Error> {
        let (parts, body) = request.into_parts();
        let method = parse_method(parts.method.as_str())?;
        let uri = Uri::new(&parts.uri.to_string())?;
        let message = build_message(parts.version, &parts.headers, body)?;
        Ok(Request::from_parts(method, uri, message))
    }
}

impl TryFrom<http::Request<Bytes>> for ServerRequest {
    type Error = MessageError;

    /// The body doubles as the raw input, so the parsed body is derived from it.
    fn try_from(request: http::Request<Bytes>) -> Result<Self, Self::Error> {
        let (parts, body) = request.into_parts();
        let version = version_to_str(ensure_supported_version(parts.version)?);

        let mut builder = ServerRequest::builder()
            .method(parts.method.as_str())
            .parsed_uri(Uri::new(&parts.uri.to_string())?)
            .protocol_version(version)
            .body(Stream::from(body.clone()))
            .input(body);

        for (name, value) in &parts.headers {
            let value = value.to_str().map_err(|_| MessageError::invalid_header_value(String::from_utf8_lossy(value.as_bytes())))?;
            builder = builder.header(name.as_str(), value);
        }

        builder.build()
    }
}

fn request_to_http<R: RequestMessage>(request: &R) -> Result<http::Request<Bytes>, MessageError> {
    let uri = match request.uri().host() {
        "" => request.request_target(),
        _ => request.uri().to_string(),
    };

    let mut builder = http::Request::builder().method(request.method().clone()).uri(uri).version(request.version());
    if let Some(headers) = builder.headers_mut() {
        headers.extend(request.header_map().clone());
    }

    builder.body(body_bytes(request)?).map_err(MessageError::invalid_argument)
}

impl TryFrom<&Request> for http::Request<Bytes> {
    type Error = MessageError;

    fn try_from(request: &Request) -> Result<Self, Self::Error> {
        request_to_http(request)
    }
}

impl TryFrom<&ServerRequest> for http::Request<Bytes> {
    type Error = MessageError;

    fn try_from(request: &ServerRequest) -> Result<Self, Self::Error> {
        request_to_http(request)
    }
}

impl TryFrom<http::Response<Bytes>> for Response {
    type Error = MessageError;

    fn try_from(response: http::Response<Bytes>) -> Result<Self, Self::Error> {
        let (parts, body) = response.into_parts();
        let message = build_message(parts.version, &parts.headers, body)?;
        Response::from_parts(StatusCode::OK, "OK".to_owned(), message).with_status(parts.status.as_u16(), "")
    }
}

impl TryFrom<&Response> for http::Response<Bytes> {
    type Error = MessageError;

    fn try_from(response: &Response) -> Result<Self, Self::Error> {
        let mut builder = http::Response::builder().status(response.status()).version(response.version());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(response.header_map().clone());
        }

        builder.body(body_bytes(response)?).map_err(MessageError::invalid_argument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;

    #[test]
    fn test_request_from_http() {
        let http_request = http::Request::builder()
            .method("POST")
            .uri("http://example.com:8080/users?id=1")
            .header("Content-Type", "application/json")
            .header("Accept", "text/html")
            .header("Accept", "*/*")
            .body(Bytes::from_static(b"{}"))
            .unwrap();

        let request = Request::try_from(http_request).unwrap();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.uri().port(), Some(8080));
        assert_eq!(request.request_target(), "/users?id=1");
        assert_eq!(request.header_line("accept"), "text/html, */*");
        assert_eq!(request.body().contents().unwrap(), Bytes::from_static(b"{}"));
    }

    #[test]
    fn test_request_from_http_rejects_extension_method() {
        let http_request = http::Request::builder().method("PURGE").uri("/").body(Bytes::new()).unwrap();
        assert!(matches!(Request::try_from(http_request), Err(MessageError::InvalidMethod { .. })));
    }

    #[test]
    fn test_request_from_http_rejects_http09() {
        let http_request = http::Request::builder().version(Version::HTTP_09).uri("/").body(Bytes::new()).unwrap();
        assert!(matches!(Request::try_from(http_request), Err(MessageError::InvalidProtocolVersion { .. })));
    }

    #[test]
    fn test_server_request_from_http() {
        let http_request = http::Request::builder()
            .method("PUT")
            .uri("/items/1")
            .header("Content-Type", "application/json")
            .body(Bytes::from_static(br#"{"name":"rust"}"#))
            .unwrap();

        let request = ServerRequest::try_from(http_request).unwrap();
        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.parsed_body(), Some(&json!({ "name": "rust" })));
        assert_eq!(request.body().read_all().unwrap(), Bytes::from_static(br#"{"name":"rust"}"#));
    }

    #[test]
    fn test_request_to_http() {
        let request = Request::new("GET", "/search?q=rust")
            .unwrap()
            .with_header("X-Trace", "abc")
            .unwrap()
            .with_body(Stream::from("payload"));

        let http_request = http::Request::<Bytes>::try_from(&request).unwrap();
        assert_eq!(http_request.method(), Method::GET);
        assert_eq!(http_request.uri(), "/search?q=rust");
        assert_eq!(http_request.headers()["x-trace"], "abc");
        assert_eq!(http_request.body(), &Bytes::from_static(b"payload"));
    }

    #[test]
    fn test_response_round_trip() {
        let response = Response::new()
            .with_status(201, "")
            .unwrap()
            .with_header("Location", "/items/1")
            .unwrap()
            .with_body(Stream::from("created"));

        let http_response = http::Response::<Bytes>::try_from(&response).unwrap();
        assert_eq!(http_response.status(), StatusCode::CREATED);
        assert_eq!(http_response.headers()["location"], "/items/1");
        assert_eq!(http_response.body(), &Bytes::from_static(b"created"));

        let back = Response::try_from(http_response).unwrap();
        assert_eq!(back.status_code(), 201);
        assert_eq!(back.reason_phrase(), "Created");
        assert_eq!(back.header_line("location"), "/items/1");
    }

    #[test]
    fn test_response_from_http_rejects_out_of_range_status() {
        let http_response = http::Response::builder().status(700).body(Bytes::new()).unwrap();
        assert!(matches!(Response::try_from(http_response), Err(MessageError::InvalidStatus { code: 700 })));
    }
}
