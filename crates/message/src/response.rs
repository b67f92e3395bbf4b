//! HTTP responses: a status code and reason phrase on top of the shared [`Message`] envelope.

use crate::error::MessageError;
use crate::message::{HttpMessage, Message, sealed::Envelope};
use crate::utils::ensure;
use http::StatusCode;

/// A response: a [`Message`] plus status code and reason phrase.
///
/// The default response is an empty `200 OK`.
#[derive(Debug, Clone)]
pub struct Response {
    message: Message,
    status: StatusCode,
    reason_phrase: String,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(status: StatusCode, reason_phrase: String, message: Message) -> Self {
        Self { message, status, reason_phrase }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn reason_phrase(&self) -> &str {
        &self.reason_phrase
    }

    /// Replaces status and reason phrase.
    ///
    /// `code` must be within `100..=599`. An empty `reason_phrase` is filled from the
    /// registered phrase of `code` (and stays empty for unregistered codes). Control
    /// characters are rejected.
    pub fn with_status(&self, code: u16, reason_phrase: &str) -> Result<Self, MessageError> {
        ensure!((100..=599).contains(&code), MessageError::InvalidStatus { code });
        ensure!(
            !reason_phrase.chars().any(char::is_control),
            MessageError::InvalidReasonPhrase { reason_phrase: reason_phrase.to_owned() }
        );
        let status = StatusCode::from_u16(code).map_err(|_| MessageError::InvalidStatus { code })?;

        let reason_phrase = match reason_phrase {
            "" => default_reason_phrase(code).unwrap_or_default().to_owned(),
            phrase => phrase.to_owned(),
        };

        Ok(Self { status, reason_phrase, ..self.clone() })
    }
}

impl Default for Response {
    fn default() -> Self {
        Self { message: Message::default(), status: StatusCode::OK, reason_phrase: "OK".to_owned() }
    }
}

impl Envelope for Response {
    fn envelope(&self) -> &Message {
        &self.message
    }

    fn envelope_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

impl HttpMessage for Response {}

/// The registered reason phrase of a status code.
pub fn default_reason_phrase(code: u16) -> Option<&'static str> {
    let phrase = match code {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",

        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-status",
        208 => "Already Reported",

        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        306 => "Switch Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",

        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Time-out",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Request Entity Too Large",
        414 => "Request-URI Too Large",
        415 => "Unsupported Media Type",
        416 => "Requested range not satisfiable",
        417 => "Expectation Failed",
        422 => "Unprocessable Entity",
        423 => "Locked",
        424 => "Failed Dependency",
        425 => "Unordered Collection",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",

        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Time-out",
        505 => "HTTP Version not supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        510 => "Not Extended",
        511 => "Network Authentication Required",

        _ => return None,
    };
    Some(phrase)
}
