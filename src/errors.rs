use crate::{context::multipart, Version};
use std::{fmt, io};

/// Errors returned to handler code by [`Context`](crate::Context) helpers
/// and renderers.
///
/// The framework never turns these into responses on its own: the handler
/// decides whether to log them, ignore them or write an error response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request has no body to decode.
    #[error("request body is empty")]
    EmptyBody,

    /// The body is not valid JSON or does not fit the target type.
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// A field marked as required in [`JsonFields`](crate::JsonFields)
    /// is absent from the decoded body.
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),

    /// Strict decoding met a key not declared by the target type.
    #[error("unknown field `{0}`")]
    UnknownField(String),

    /// The decoded JSON is neither an object nor an array of objects.
    #[error("expected a JSON object or an array of objects")]
    UnexpectedShape,

    /// The multipart body could not be parsed.
    #[error("multipart: {0}")]
    Multipart(#[from] multipart::Error),

    /// No file was uploaded under the given form field.
    #[error("no file uploaded for field `{0}`")]
    MissingFile(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("template: {0}")]
    Template(#[from] minijinja::Error),

    /// No template environment is attached to the context.
    #[error("no HTML templates have been loaded into the engine")]
    TemplatesNotLoaded,

    #[error("xml: {0}")]
    Xml(String),

    #[error("formatting failed")]
    Format(#[from] fmt::Error),
}

// Transport errors, answered with a canned response before any handler runs.

#[derive(Debug, PartialEq)]
pub(crate) enum ErrorKind {
    InvalidMethod,
    InvalidUrl,
    InvalidVersion,
    UnsupportedVersion,

    InvalidHeader,
    TooManyHeaders,
    InvalidContentLength,
    InvalidConnection,
    UnsupportedEncoding,

    BodyTooLarge,
    #[allow(dead_code)]
    BodyMismatch {
        expected: usize,
        available: usize,
    },

    ServiceUnavailable,
    Io(IoError),
}

macro_rules! http_errors {
    ($($name:ident: $status_code:expr, $len:literal => $json:literal; )*) => {
        pub(crate) const fn as_http(
            &self,
            version: Version,
            json: bool,
        ) -> &'static [u8] {
            match (json, self, version) { $(
                (true, Self::$name { .. }, Version::Http11) => concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: ", $len, "\r\n",
                    "content-type: application/json\r\n",
                    "\r\n",
                    $json
                ),
                (false, Self::$name { .. }, Version::Http11) => concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: 0\r\n\r\n",
                ),
                (true, Self::$name { .. }, Version::Http10) => concat!(
                    "HTTP/1.0 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: ", $len, "\r\n",
                    "content-type: application/json\r\n",
                    "\r\n",
                    $json
                ),
                (false, Self::$name { .. }, Version::Http10) => concat!(
                    "HTTP/1.0 ", $status_code, "\r\n",
                    "connection: close\r\n",
                    "content-length: 0\r\n\r\n",
                ),
            )* }.as_bytes()
        }
    };
}

impl ErrorKind {
    http_errors! {
        InvalidMethod: "400 Bad Request", "55"
            => r#"{"error":"Invalid HTTP method","code":"INVALID_METHOD"}"#;
        InvalidUrl: "400 Bad Request", "51"
            => r#"{"error":"Invalid URL format","code":"INVALID_URL"}"#;
        InvalidVersion: "400 Bad Request", "57"
            => r#"{"error":"Invalid HTTP version","code":"INVALID_VERSION"}"#;
        UnsupportedVersion: "505 HTTP Version Not Supported", "67"
            => r#"{"error":"HTTP version not supported","code":"UNSUPPORTED_VERSION"}"#;

        InvalidHeader: "400 Bad Request", "57"
            => r#"{"error":"Invalid header format","code":"INVALID_HEADER"}"#;
        TooManyHeaders: "431 Request Header Fields Too Large", "54"
            => r#"{"error":"Too many headers","code":"TOO_MANY_HEADERS"}"#;
        InvalidContentLength: "400 Bad Request", "66"
            => r#"{"error":"Invalid Content-Length","code":"INVALID_CONTENT_LENGTH"}"#;
        InvalidConnection: "400 Bad Request", "65"
            => r#"{"error":"Invalid Connection header","code":"INVALID_CONNECTION"}"#;
        UnsupportedEncoding: "501 Not Implemented", "82"
            => r#"{"error":"Transfer-Encoding not supported","code":"UNSUPPORTED_TRANSFER_ENCODING"}"#;

        BodyTooLarge: "413 Payload Too Large", "58"
            => r#"{"error":"Request body too large","code":"BODY_TOO_LARGE"}"#;
        BodyMismatch: "400 Bad Request", "55"
            => r#"{"error":"Body length mismatch","code":"BODY_MISMATCH"}"#;

        ServiceUnavailable: "503 Service Unavailable", "72"
            => r#"{"error":"Service temporarily unavailable","code":"SERVICE_UNAVAILABLE"}"#;
        Io: "503 Service Unavailable", "48"
            => r#"{"error":"I/O error occurred","code":"IO_ERROR"}"#;
    }
}

impl std::error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(IoError(err))
    }
}

#[derive(Debug)]
pub(crate) struct IoError(pub(crate) io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::*;

    #[test]
    fn canned_lengths_match() {
        let kinds = [
            ErrorKind::InvalidMethod,
            ErrorKind::InvalidUrl,
            ErrorKind::InvalidVersion,
            ErrorKind::UnsupportedVersion,
            ErrorKind::InvalidHeader,
            ErrorKind::TooManyHeaders,
            ErrorKind::InvalidContentLength,
            ErrorKind::InvalidConnection,
            ErrorKind::UnsupportedEncoding,
            ErrorKind::BodyTooLarge,
            ErrorKind::ServiceUnavailable,
        ];

        for kind in kinds {
            let text = str_op(kind.as_http(Version::Http11, true));
            let (head, body) = text.split_once("\r\n\r\n").unwrap();
            let declared = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length: "))
                .unwrap();

            assert_eq!(declared.parse::<usize>().unwrap(), body.len(), "{kind:?}");
        }
    }

    #[test]
    fn empty_body_variant() {
        let text = str_op(ErrorKind::BodyTooLarge.as_http(Version::Http10, false));
        assert_eq!(
            text,
            "HTTP/1.0 413 Payload Too Large\r\nconnection: close\r\ncontent-length: 0\r\n\r\n"
        );
    }

    #[test]
    fn public_error_messages() {
        assert_eq!(
            Error::MissingField("email").to_string(),
            "required field `email` is missing"
        );
        assert_eq!(
            Error::MissingFile("avatar".into()).to_string(),
            "no file uploaded for field `avatar`"
        );
    }
}
