//! Server-side requests: a [`Request`] plus the environment data it arrived with.
//!
//! A [`ServerRequest`] carries immutable snapshots of server, cookie and query
//! parameters, the parsed body, the uploaded files, and a bag of attributes that
//! middlewares use to pass request-scoped data (such as routing results) down the chain.
//!
//! # Parsed body
//!
//! When built through [`ServerRequest::builder`], the parsed body is derived from the
//! method and the `Content-Type` header:
//!
//! - `GET` requests never get one;
//! - `POST` with `application/x-www-form-urlencoded` or `multipart/form-data` uses the
//!   supplied post parameters as-is;
//! - any other non-`GET` request decodes the raw input as JSON when it holds an object or
//!   an array, and falls back to query-string decoding otherwise. Bracketed keys nest
//!   (`tags[]=a&tags[]=b`, `user[name]=terry`).

use crate::error::{MessageError, StreamError};
use crate::headers::IntoHeaderValues;
use crate::message::{HttpMessage, Message, sealed::Envelope};
use crate::request::sealed::RequestEnvelope;
use crate::request::{Request, RequestMessage, parse_method};
use crate::stream::Stream;
use crate::upload::{HostingMode, UploadedFiles, convert_file_specs, parse_uploaded_files};
use crate::uri::Uri;
use bytes::Bytes;
use http::Method;
use mime::Mime;
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::trace;

/// Flat string parameters: server params, cookies, query and post fields.
pub type Params = BTreeMap<String, String>;

type Attributes = HashMap<String, Arc<dyn Any + Send + Sync>>;

#[derive(Debug, Clone)]
pub struct ServerRequest {
    request: Request,
    server_params: Arc<Params>,
    cookie_params: Arc<Params>,
    query_params: Arc<Params>,
    parsed_body: Option<Arc<Value>>,
    uploaded_files: Arc<UploadedFiles>,
    attributes: Arc<Attributes>,
}

impl ServerRequest {
    pub fn builder() -> ServerRequestBuilder {
        ServerRequestBuilder::new()
    }

    /// Shortcut for a request with only a method and a uri.
    pub fn new(method: &str, uri: &str) -> Result<Self, MessageError> {
        Self::builder().method(method).uri(uri).build()
    }

    pub fn server_params(&self) -> &Params {
        &self.server_params
    }

    pub fn cookie_params(&self) -> &Params {
        &self.cookie_params
    }

    pub fn with_cookie_params(&self, cookies: Params) -> Self {
        Self { cookie_params: Arc::new(cookies), ..self.clone() }
    }

    pub fn query_params(&self) -> &Params {
        &self.query_params
    }

    pub fn with_query_params(&self, query: Params) -> Self {
        Self { query_params: Arc::new(query), ..self.clone() }
    }

    pub fn uploaded_files(&self) -> &UploadedFiles {
        &self.uploaded_files
    }

    pub fn with_uploaded_files(&self, files: UploadedFiles) -> Self {
        Self { uploaded_files: Arc::new(files), ..self.clone() }
    }

    pub fn parsed_body(&self) -> Option<&Value> {
        self.parsed_body.as_deref()
    }

    /// Replaces the parsed body, which must be an object, an array or nothing.
    pub fn with_parsed_body(&self, data: Option<Value>) -> Result<Self, MessageError> {
        let parsed_body = match data {
            None => None,
            Some(value @ (Value::Object(_) | Value::Array(_))) => Some(Arc::new(value)),
            Some(other) => return Err(MessageError::InvalidParsedBody { kind: value_kind(&other) }),
        };
        Ok(Self { parsed_body, ..self.clone() })
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Returns the attribute `name` when it is present and of type `T`.
    pub fn attribute<T: Any>(&self, name: &str) -> Option<&T> {
        self.attributes.get(name).and_then(|value| value.downcast_ref::<T>())
    }

    /// Returns the attribute `name`, or `default` when it is absent or not of type `T`.
    pub fn attribute_or<'a, T: Any>(&'a self, name: &str, default: &'a T) -> &'a T {
        self.attribute(name).unwrap_or(default)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn with_attribute<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.attributes).insert(name.into(), Arc::new(value));
        next
    }

    pub fn without_attribute(&self, name: &str) -> Self {
        let mut next = self.clone();
        if self.has_attribute(name) {
            Arc::make_mut(&mut next.attributes).remove(name);
        }
        next
    }

    /// Returns the plain [`Request`] this server request extends.
    pub fn as_request(&self) -> &Request {
        &self.request
    }
}

impl Default for ServerRequest {
    fn default() -> Self {
        Self {
            request: Request::default(),
            server_params: Arc::default(),
            cookie_params: Arc::default(),
            query_params: Arc::default(),
            parsed_body: None,
            uploaded_files: Arc::default(),
            attributes: Arc::default(),
        }
    }
}

impl Envelope for ServerRequest {
    fn envelope(&self) -> &Message {
        self.request.envelope()
    }

    fn envelope_mut(&mut self) -> &mut Message {
        self.request.envelope_mut()
    }
}

impl HttpMessage for ServerRequest {}

impl RequestEnvelope for ServerRequest {
    fn request(&self) -> &Request {
        &self.request
    }

    fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }
}

impl RequestMessage for ServerRequest {}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug)]
enum UriInput {
    Raw(String),
    Parsed(Uri),
}

/// Builds a [`ServerRequest`] from explicit environment data.
#[derive(Debug)]
pub struct ServerRequestBuilder {
    method: String,
    uri: UriInput,
    protocol_version: String,
    headers: Vec<(String, Vec<String>)>,
    body: Option<Arc<Stream>>,
    input: Option<Bytes>,
    server_params: Params,
    cookie_params: Params,
    query_params: Params,
    post_params: Params,
    files: Value,
    hosting: HostingMode,
}

impl ServerRequestBuilder {
    fn new() -> Self {
        Self {
            method: Method::GET.to_string(),
            uri: UriInput::Raw(String::new()),
            protocol_version: "1.1".to_owned(),
            headers: Vec::new(),
            body: None,
            input: None,
            server_params: Params::new(),
            cookie_params: Params::new(),
            query_params: Params::new(),
            post_params: Params::new(),
            files: Value::Null,
            hosting: HostingMode::default(),
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = UriInput::Raw(uri.into());
        self
    }

    pub fn parsed_uri(mut self, uri: Uri) -> Self {
        self.uri = UriInput::Parsed(uri);
        self
    }

    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Adds a header, repeated names accumulate their values.
    pub fn header(mut self, name: impl Into<String>, value: impl IntoHeaderValues) -> Self {
        self.headers.push((name.into(), value.into_header_values()));
        self
    }

    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: IntoHeaderValues,
    {
        self.headers.extend(headers.into_iter().map(|(name, value)| (name.into(), value.into_header_values())));
        self
    }

    pub fn body(mut self, body: impl Into<Arc<Stream>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// The raw request payload used to derive the parsed body.
    ///
    /// When unset, the body stream is read instead.
    pub fn input(mut self, input: impl Into<Bytes>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn server_params(mut self, params: Params) -> Self {
        self.server_params = params;
        self
    }

    pub fn cookie_params(mut self, params: Params) -> Self {
        self.cookie_params = params;
        self
    }

    pub fn query_params(mut self, params: Params) -> Self {
        self.query_params = params;
        self
    }

    pub fn post_params(mut self, params: Params) -> Self {
        self.post_params = params;
        self
    }

    /// The uploaded-file descriptors, in the per-attribute layout servers report them.
    pub fn files(mut self, files: Value) -> Self {
        self.files = files;
        self
    }

    pub fn hosting(mut self, hosting: HostingMode) -> Self {
        self.hosting = hosting;
        self
    }

    pub fn build(self) -> Result<ServerRequest, MessageError> {
        let method = parse_method(&self.method)?;
        let uri = match self.uri {
            UriInput::Raw(uri) => Uri::new(&uri)?,
            UriInput::Parsed(uri) => uri,
        };

        let mut message = Message::default().with_protocol_version(&self.protocol_version)?;
        for (name, values) in self.headers {
            message = message.with_added_header(&name, values)?;
        }
        if let Some(body) = self.body {
            message = message.with_body(body);
        }

        let request = Request::from_parts(method, uri, message);
        let parsed_body = derive_parsed_body(&request, &self.post_params, self.input)?;
        let uploaded_files = convert_file_specs(&parse_uploaded_files(&self.files), self.hosting);

        Ok(ServerRequest {
            request,
            server_params: Arc::new(self.server_params),
            cookie_params: Arc::new(self.cookie_params),
            query_params: Arc::new(self.query_params),
            parsed_body: parsed_body.map(Arc::new),
            uploaded_files: Arc::new(uploaded_files),
            attributes: Arc::default(),
        })
    }
}

fn derive_parsed_body(request: &Request, post: &Params, input: Option<Bytes>) -> Result<Option<Value>, MessageError> {
    if request.method() == Method::GET {
        return Ok(None);
    }

    let content_type = request.header_line("content-type").parse::<Mime>().ok();
    let is_form = content_type.as_ref().is_some_and(|mime| {
        let essence = mime.essence_str();
        essence == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() || essence == mime::MULTIPART_FORM_DATA.essence_str()
    });

    if request.method() == Method::POST && is_form {
        if post.is_empty() {
            return Ok(None);
        }
        let fields = post.iter().map(|(key, value)| (key.clone(), Value::String(value.clone()))).collect();
        return Ok(Some(Value::Object(fields)));
    }

    let input = match input {
        Some(input) => input,
        None => read_body(request.body())?,
    };
    Ok(decode_input(&input))
}

/// Reads the whole body and rewinds it, leaving the stream as it was for handlers.
fn read_body(body: &Stream) -> Result<Bytes, StreamError> {
    if !body.is_readable() {
        return Ok(Bytes::new());
    }
    let contents = body.read_all()?;
    if body.is_seekable() {
        body.rewind()?;
    }
    Ok(contents)
}

fn decode_input(input: &[u8]) -> Option<Value> {
    if input.trim_ascii().is_empty() {
        return None;
    }

    match serde_json::from_slice::<Value>(input) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => return Some(value),
        Ok(other) => trace!(kind = value_kind(&other), "input is json but not structured, decode it as a form"),
        Err(e) => trace!(cause = %e, "input is not json, decode it as a form"),
    }

    match serde_qs::from_bytes::<Value>(input) {
        Ok(Value::Object(fields)) if fields.is_empty() => None,
        Ok(value) => Some(value),
        Err(e) => {
            trace!(cause = %e, "input is not a nested form, decode it flat");
            decode_flat_form(input)
        }
    }
}

/// Flat `key=value` decoding where a repeated key keeps its last value.
fn decode_flat_form(input: &[u8]) -> Option<Value> {
    let pairs = match serde_urlencoded::from_bytes::<Vec<(String, String)>>(input) {
        Ok(pairs) if !pairs.is_empty() => pairs,
        Ok(_) => return None,
        Err(e) => {
            trace!(cause = %e, "input is not form encoded either, no parsed body");
            return None;
        }
    };

    Some(Value::Object(pairs.into_iter().map(|(key, value)| (key, Value::String(value))).collect()))
}
