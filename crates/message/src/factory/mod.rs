//! Builds [`ServerRequest`]s from an [`EnvironmentSnapshot`].

mod environment;

pub use environment::EnvironmentSnapshot;

use crate::error::MessageError;
use crate::server_request::ServerRequest;
use crate::upload::HostingMode;
use crate::uri::Uri;
use tracing::debug;

#[derive(Debug, Default, Copy, Clone)]
pub struct ServerRequestFactory {
    hosting: HostingMode,
    auto_determine: bool,
}

impl ServerRequestFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// How uploaded files of the created requests are moved.
    pub fn hosting(mut self, hosting: HostingMode) -> Self {
        self.hosting = hosting;
        self
    }

    /// Whether [`create_server_request`](Self::create_server_request) fills an empty
    /// method or uri from the server params.
    pub fn auto_determine(mut self, auto_determine: bool) -> Self {
        self.auto_determine = auto_determine;
        self
    }

    /// Creates a request entirely from the environment: method from `REQUEST_METHOD`
    /// (default `GET`) and uri from the server params.
    pub fn from_environment(&self, snapshot: &EnvironmentSnapshot) -> Result<ServerRequest, MessageError> {
        let method = snapshot.server_param("REQUEST_METHOD").unwrap_or("GET");
        let uri = Uri::from_server_params(&snapshot.server)?;
        self.build(method, uri, snapshot)
    }

    /// Creates a request with an explicit method and uri, everything else comes from the
    /// environment.
    pub fn create_server_request(
        &self,
        method: &str,
        uri: &str,
        snapshot: &EnvironmentSnapshot,
    ) -> Result<ServerRequest, MessageError> {
        let method = match method {
            "" if self.auto_determine => snapshot.server_param("REQUEST_METHOD").unwrap_or("GET"),
            method => method,
        };

        let uri = match uri {
            "" if self.auto_determine => Uri::from_server_params(&snapshot.server)?,
            uri => Uri::new(uri)?,
        };

        self.build(method, uri, snapshot)
    }

    fn build(&self, method: &str, uri: Uri, snapshot: &EnvironmentSnapshot) -> Result<ServerRequest, MessageError> {
        let protocol = snapshot.server_param("SERVER_PROTOCOL").unwrap_or("1.1");
        let protocol = protocol.strip_prefix("HTTP/").unwrap_or(protocol);

        debug!(method, uri = %uri, protocol, "create server request from environment");

        ServerRequest::builder()
            .method(method)
            .parsed_uri(uri)
            .protocol_version(protocol)
            .headers(snapshot.headers())
            .server_params(snapshot.server.clone())
            .cookie_params(snapshot.cookies.clone())
            .query_params(snapshot.query.clone())
            .post_params(snapshot.post.clone())
            .files(snapshot.files.clone())
            .input(snapshot.input.clone())
            .hosting(self.hosting)
            .build()
    }
}
