//! Immutable HTTP message value objects
//!
//! This crate models requests, responses and their parts as values: every "change" is a
//! with-er returning a new instance, while the receiver is left untouched. Headers and
//! attributes are shared between a value and its derivatives until one of them replaces
//! them, so deriving a message is cheap.
//!
//! # Example
//!
//! ```
//! use micro_message::{HttpMessage, RequestMessage, Response, ServerRequest, Stream};
//!
//! let request = ServerRequest::builder()
//!     .method("POST")
//!     .uri("https://example.com/users?page=2")
//!     .header("Content-Type", "application/json")
//!     .input(r#"{"name":"terry"}"#)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(request.request_target(), "/users?page=2");
//! assert_eq!(request.parsed_body().unwrap()["name"], "terry");
//!
//! let response = Response::new()
//!     .with_status(201, "")
//!     .unwrap()
//!     .with_header("Location", "/users/1")
//!     .unwrap()
//!     .with_body(Stream::from("created"));
//!
//! assert_eq!(response.reason_phrase(), "Created");
//! ```
//!
//! # Architecture
//!
//! - [`Stream`]: a readable/writable/seekable body over any [`StreamResource`]
//! - [`Uri`]: an RFC 3986 uri with normalized scheme and host and encoded components
//! - [`UploadedFile`]: a file received with a request, movable exactly once
//! - [`HttpMessage`]: version, headers and body, shared by all messages
//! - [`Request`], [`RequestMessage`]: method, uri and request target
//! - [`Response`]: status code and reason phrase
//! - [`ServerRequest`]: a request enriched with server-side context
//! - [`ServerRequestFactory`]: builds a [`ServerRequest`] from an [`EnvironmentSnapshot`]
//!
//! Requests and responses also convert from and to the [`http`] crate's types.
//!
//! # Error Handling
//!
//! Every fallible operation returns one of:
//!
//! - [`MessageError`]: invalid message parts, wraps the others
//! - [`UriError`]: invalid uri components
//! - [`StreamError`]: stream state and io failures
//! - [`UploadError`]: uploaded file access and moves

mod error;
mod factory;
mod headers;
mod interop;
mod message;
mod request;
mod response;
mod server_request;
mod stream;
mod upload;
mod uri;
mod utils;

pub use error::{MessageError, StreamError, UploadError, UriError};
pub use factory::{EnvironmentSnapshot, ServerRequestFactory};
pub use headers::{IntoHeaderValues, parse_raw_header};
pub use message::{HttpMessage, Message};
pub use request::{Request, RequestMessage};
pub use response::{Response, default_reason_phrase};
pub use server_request::{Params, ServerRequest, ServerRequestBuilder};
pub use stream::{Stream, StreamMetadata, StreamResource};
pub use upload::{
    FileSpec, FileSpecNode, FileSpecTree, HostingMode, UploadErrorCode, UploadedFile, UploadedFileBuilder,
    UploadedFileNode, UploadedFiles, convert_file_specs, parse_uploaded_files,
};
pub use uri::Uri;
