use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error of every fallible with-er and constructor in this crate.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("\"{name}\" is not valid header name, it must be an RFC 7230 compatible string")]
    InvalidHeaderName { name: String },

    #[error("\"{value}\" is not valid header value, it must contain visible ASCII characters only")]
    InvalidHeaderValue { value: String },

    #[error("unsupported http method \"{method}\", it must be an RFC 7231 request method")]
    InvalidMethod { method: String },

    #[error("unsupported http protocol version \"{version}\"")]
    InvalidProtocolVersion { version: String },

    #[error("status code should be in a range of 100-599, but {code} provided")]
    InvalidStatus { code: u16 },

    #[error("reason phrase contains a prohibited control character: {reason_phrase:?}")]
    InvalidReasonPhrase { reason_phrase: String },

    #[error("invalid request target: {reason}")]
    InvalidRequestTarget { reason: String },

    #[error("parsed body only accepts an object, an array or nothing, but {kind} provided")]
    InvalidParsedBody { kind: &'static str },

    #[error("uri error: {source}")]
    Uri {
        #[from]
        source: UriError,
    },

    #[error("stream error: {source}")]
    Stream {
        #[from]
        source: StreamError,
    },

    #[error("upload error: {source}")]
    Upload {
        #[from]
        source: UploadError,
    },
}

impl MessageError {
    pub fn invalid_argument<S: ToString>(str: S) -> Self {
        Self::InvalidArgument { reason: str.to_string() }
    }

    pub fn invalid_header_name<S: ToString>(str: S) -> Self {
        Self::InvalidHeaderName { name: str.to_string() }
    }

    pub fn invalid_header_value<S: ToString>(str: S) -> Self {
        Self::InvalidHeaderValue { value: str.to_string() }
    }

    pub fn invalid_method<S: ToString>(str: S) -> Self {
        Self::InvalidMethod { method: str.to_string() }
    }

    pub fn invalid_protocol_version<S: ToString>(str: S) -> Self {
        Self::InvalidProtocolVersion { version: str.to_string() }
    }

    pub fn invalid_request_target<S: ToString>(str: S) -> Self {
        Self::InvalidRequestTarget { reason: str.to_string() }
    }
}

#[derive(Debug, Error)]
pub enum UriError {
    #[error("\"{uri}\" is not a valid uri")]
    InvalidUri { uri: String },

    #[error("the string \"{scheme}\" is not a valid scheme, only http and https are supported")]
    InvalidScheme { scheme: String },

    #[error("\"{host}\" is not a valid host")]
    InvalidHost { host: String },

    #[error("port number should be in a range of 1-65535, but {port} provided")]
    InvalidPort { port: String },
}

impl UriError {
    pub fn invalid_uri<S: ToString>(str: S) -> Self {
        Self::InvalidUri { uri: str.to_string() }
    }

    pub fn invalid_scheme<S: ToString>(str: S) -> Self {
        Self::InvalidScheme { scheme: str.to_string() }
    }

    pub fn invalid_host<S: ToString>(str: S) -> Self {
        Self::InvalidHost { host: str.to_string() }
    }

    pub fn invalid_port<S: ToString>(str: S) -> Self {
        Self::InvalidPort { port: str.to_string() }
    }
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream does not exist, it has been closed or detached")]
    Unavailable,

    #[error("stream is not seekable")]
    NotSeekable,

    #[error("unable to seek to {position:?}: {source}")]
    Seek { position: io::SeekFrom, source: io::Error },

    #[error("invalid file opening mode \"{mode}\"")]
    InvalidMode { mode: String },

    #[error("unable to open file at \"{}\": {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl StreamError {
    pub fn invalid_mode<S: ToString>(str: S) -> Self {
        Self::InvalidMode { mode: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("uploaded file already moved")]
    AlreadyMoved,

    #[error("no stream is available or can be created")]
    NoStream,

    #[error("the stream of an uploaded file must be readable")]
    UnreadableStream,

    #[error("the target path \"{}\" is not writable", path.display())]
    TargetNotWritable { path: PathBuf },

    #[error("could not move the uploaded file to \"{}\": {reason}", path.display())]
    MoveFailed { path: PathBuf, reason: String },
}

impl UploadError {
    pub fn move_failed<S: ToString>(path: impl Into<PathBuf>, str: S) -> Self {
        Self::MoveFailed { path: path.into(), reason: str.to_string() }
    }
}
