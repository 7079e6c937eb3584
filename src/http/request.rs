use crate::{
    errors::ErrorKind,
    http::types::{Header, Method, Url, Version},
    limits::ReqLimits,
};
use memchr::memmem;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::timeout,
};

/// An HTTP/1.x request, fully buffered before it reaches the router.
///
/// Requests are produced by the built-in transport, or built by hand with
/// [`Request::new`] when the router is driven by another transport or by tests.
///
/// # Input data requirements
///
/// - Line terminator: exactly `CRLF`.
/// - First line: `[METHOD] SP [TARGET] SP HTTP/1.x CRLF`, where the target
///   starts with `/` and contains no empty segment (`//`).
/// - Headers: `[NAME]: [VALUE] CRLF`, names are case-insensitive; leading
///   whitespace of the value is dropped.
/// - The head (first line and headers) must be valid `UTF-8`.
/// - Bodies require `Content-Length`. Any `Transfer-Encoding` header is
///   rejected with `501 Not Implemented` and the connection is closed.
///
/// `Content-Length` and `Connection` are interpreted and also kept in the
/// header list.
///
/// # Examples
/// ```
/// use maker_route::{Method, Request};
///
/// let req = Request::new(Method::Post, "/user/login?next=%2Fhome")
///     .with_header("Content-Type", "application/json")
///     .with_body(r#"{"name":"jerry"}"#);
///
/// assert_eq!(req.url().path(), "/user/login");
/// assert_eq!(req.header("content-type"), Some("application/json"));
/// assert_eq!(req.body(), br#"{"name":"jerry"}"#);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    url: Url,
    version: Version,

    headers: Vec<Header>,
    content_length: Option<usize>,
    keep_alive: bool,

    body: Vec<u8>,

    pub(crate) client_addr: SocketAddr,
}

impl Default for Request {
    fn default() -> Self {
        Request {
            method: Method::Get,
            url: Url::default(),
            version: Version::Http11,

            headers: Vec::new(),
            content_length: None,
            keep_alive: true,

            body: Vec::new(),

            client_addr: Self::UNKNOWN_CLIENT,
        }
    }
}

impl Request {
    const UNKNOWN_CLIENT: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);

    /// Creates an HTTP/1.1 request for `target` (path plus optional query).
    pub fn new(method: Method, target: &str) -> Self {
        Request {
            method,
            url: Url::parse(target),
            ..Request::default()
        }
    }

    /// Appends a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    /// Sets the body and its `Content-Length`.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.content_length = Some(self.body.len());
        self
    }

    #[inline(always)]
    pub(crate) fn reset(&mut self) {
        self.method = Method::Get;
        self.url.clear();
        self.version = Version::Http11;

        self.headers.clear();
        self.content_length = None;
        self.keep_alive = true;

        self.body.clear();
        self.client_addr = Self::UNKNOWN_CLIENT;
    }

    #[inline(always)]
    pub(crate) fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }
}

// Public API
impl Request {
    #[inline(always)]
    pub const fn client_addr(&self) -> &SocketAddr {
        &self.client_addr
    }

    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[inline(always)]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    #[inline(always)]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// Returns the first header value with case-insensitive name matching
    /// (per [RFC 7230](https://tools.ietf.org/html/rfc7230#section-3.2)).
    /// Uses linear search.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// All headers in arrival order.
    #[inline(always)]
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Returns the value of the `Content-Length` header if present.
    #[inline(always)]
    pub const fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// Returns the keep-alive status of the connection.
    #[inline(always)]
    pub const fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// The request body; empty when none was sent.
    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

// Parse head
impl Request {
    /// Parses a complete head (`...\r\n\r\n`) into `self`.
    pub(crate) fn parse_head(&mut self, head: &[u8], limits: &ReqLimits) -> Result<(), ErrorKind> {
        let text = simdutf8::basic::from_utf8(head).map_err(|_| ErrorKind::InvalidHeader)?;
        let text = text.strip_suffix("\r\n\r\n").ok_or(ErrorKind::InvalidHeader)?;

        let mut lines = text.split("\r\n");
        let first_line = lines.next().ok_or(ErrorKind::InvalidVersion)?;
        if first_line.len() > limits.first_line() {
            return Err(ErrorKind::InvalidUrl);
        }
        self.parse_first_line(first_line, limits)?;

        for line in lines {
            if self.headers.len() >= limits.header_count {
                return Err(ErrorKind::TooManyHeaders);
            }
            self.parse_header(line, limits)?;
        }

        Ok(())
    }

    #[inline]
    fn parse_first_line(&mut self, line: &str, limits: &ReqLimits) -> Result<(), ErrorKind> {
        let mut parts = line.splitn(3, ' ');

        let method = parts.next().ok_or(ErrorKind::InvalidMethod)?;
        self.method = Method::from_bytes(method.as_bytes())?;

        let target = parts.next().ok_or(ErrorKind::InvalidUrl)?;
        Self::check_target(target, limits)?;
        self.url = Url::parse(target);

        let version = parts.next().ok_or(ErrorKind::InvalidVersion)?;
        let (version, keep_alive) = Version::from_bytes(version.as_bytes())?;
        self.version = version;
        self.keep_alive = keep_alive;

        Ok(())
    }

    #[inline]
    fn check_target(target: &str, limits: &ReqLimits) -> Result<(), ErrorKind> {
        if !target.starts_with('/') || target.len() > limits.url_size {
            return Err(ErrorKind::InvalidUrl);
        }

        let path = target.split('?').next().unwrap_or(target);
        if memmem::find(path.as_bytes(), b"//").is_some() {
            return Err(ErrorKind::InvalidUrl);
        }

        match target.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
            true => Err(ErrorKind::InvalidUrl),
            false => Ok(()),
        }
    }

    #[inline]
    fn parse_header(&mut self, line: &str, limits: &ReqLimits) -> Result<(), ErrorKind> {
        if line.len() > limits.header_line_size {
            return Err(ErrorKind::InvalidHeader);
        }

        let (name, value) = line.split_once(':').ok_or(ErrorKind::InvalidHeader)?;
        if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(ErrorKind::InvalidHeader);
        }
        let value = value.trim_start_matches([' ', '\t']);

        if name.eq_ignore_ascii_case("content-length") {
            let len = slice_to_usize(value.as_bytes()).ok_or(ErrorKind::InvalidContentLength)?;
            if len > limits.body_size {
                return Err(ErrorKind::BodyTooLarge);
            }
            self.content_length = Some(len);
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            return Err(ErrorKind::UnsupportedEncoding);
        } else if name.eq_ignore_ascii_case("connection") {
            self.keep_alive = match value {
                v if v.eq_ignore_ascii_case("keep-alive") => true,
                v if v.eq_ignore_ascii_case("close") => false,
                _ => return Err(ErrorKind::InvalidConnection),
            };
        }

        self.headers.push(Header::new(name, value));
        Ok(())
    }
}

#[inline(always)]
fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }

    let mut result: usize = 0;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}

// Reading from the socket

/// Accumulates bytes of one connection and cuts them into requests.
///
/// Bytes following a complete request (pipelining) stay in the buffer
/// for the next call.
#[derive(Debug, Default)]
pub(crate) struct Parser {
    buffer: Vec<u8>,
}

impl Parser {
    #[inline(always)]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        Parser {
            buffer: Vec::with_capacity(limits.head_size().min(16 * 1024)),
        }
    }

    #[inline(always)]
    pub(crate) fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Reads the next request into `request`.
    ///
    /// Returns `Ok(false)` when the peer closed the connection cleanly
    /// between two requests.
    pub(crate) async fn read_request<R: AsyncRead + Unpin>(
        &mut self,
        stream: &mut R,
        request: &mut Request,
        limits: &ReqLimits,
        read_timeout: Duration,
    ) -> Result<bool, ErrorKind> {
        let head_end = loop {
            if let Some(pos) = memmem::find(&self.buffer, b"\r\n\r\n") {
                break pos + 4;
            }
            if self.buffer.len() > limits.head_size() {
                return Err(ErrorKind::TooManyHeaders);
            }

            if self.fill(stream, read_timeout).await? == 0 {
                return match self.buffer.is_empty() {
                    true => Ok(false),
                    false => Err(ErrorKind::InvalidHeader),
                };
            }
        };

        request.parse_head(&self.buffer[..head_end], limits)?;

        let body_len = request.content_length.unwrap_or(0);
        while self.buffer.len() < head_end + body_len {
            if self.fill(stream, read_timeout).await? == 0 {
                return Err(ErrorKind::BodyMismatch {
                    expected: body_len,
                    available: self.buffer.len() - head_end,
                });
            }
        }

        request.body.clear();
        request
            .body
            .extend_from_slice(&self.buffer[head_end..head_end + body_len]);
        self.buffer.drain(..head_end + body_len);

        Ok(true)
    }

    #[inline]
    async fn fill<R: AsyncRead + Unpin>(
        &mut self,
        stream: &mut R,
        read_timeout: Duration,
    ) -> Result<usize, ErrorKind> {
        self.buffer.reserve(4096);

        Ok(timeout(read_timeout, stream.read_buf(&mut self.buffer)).await??)
    }
}

impl From<tokio::time::error::Elapsed> for ErrorKind {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ErrorKind::Io(crate::errors::IoError(std::io::ErrorKind::TimedOut.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &str) -> Result<Request, ErrorKind> {
        let mut request = Request::default();
        request.parse_head(data.as_bytes(), &ReqLimits::default())?;
        Ok(request)
    }

    #[test]
    fn reset() {
        let mut req = Request::new(Method::Post, "/a?b=c")
            .with_header("X", "y")
            .with_body("body");
        req.reset();

        assert_eq!(req, Request::default());
    }

    #[test]
    fn parse_method() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.1\r\n\r\n", Ok(Method::Get)),
            ("PUT / HTTP/1.1\r\n\r\n", Ok(Method::Put)),
            ("POST / HTTP/1.1\r\n\r\n", Ok(Method::Post)),
            ("HEAD / HTTP/1.1\r\n\r\n", Ok(Method::Head)),
            ("PATCH / HTTP/1.1\r\n\r\n", Ok(Method::Patch)),
            ("DELETE / HTTP/1.1\r\n\r\n", Ok(Method::Delete)),
            ("OPTIONS / HTTP/1.1\r\n\r\n", Ok(Method::Options)),

            ("TRACE / HTTP/1.1\r\n\r\n", Err(ErrorKind::InvalidMethod)),
            ("get / HTTP/1.1\r\n\r\n", Err(ErrorKind::InvalidMethod)),
            (" / HTTP/1.1\r\n\r\n", Err(ErrorKind::InvalidMethod)),
        ];

        for (data, expected) in cases {
            assert_eq!(parse(data).map(|r| r.method()), expected, "{data:?}");
        }
    }

    #[test]
    fn parse_url() {
        #[rustfmt::skip]
        let cases = [
            ("/", Some(("/", None))),
            ("/api/users/123", Some(("/api/users/123", None))),
            ("/api/users/123/", Some(("/api/users/123/", None))),
            ("/search?q=rust&page=2", Some(("/search", Some("q=rust&page=2")))),
            ("/search?", Some(("/search", Some("")))),
            ("/a?next=//b", Some(("/a", Some("next=//b")))),

            ("api/users", None),
            ("//api/users", None),
            ("/api//users", None),
            ("/api/users//", None),
            ("*", None),
        ];

        for (target, expected) in cases {
            let result = parse(&format!("GET {target} HTTP/1.1\r\n\r\n"));

            match expected {
                Some((path, query)) => {
                    let req = result.unwrap();
                    assert_eq!(req.url().target(), target);
                    assert_eq!(req.url().path(), path);
                    assert_eq!(req.url().query(), query);
                }
                None => assert_eq!(result, Err(ErrorKind::InvalidUrl), "{target:?}"),
            }
        }
    }

    #[test]
    fn parse_version() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.1\r\n\r\n", Ok((Version::Http11, true))),
            ("GET / HTTP/1.0\r\n\r\n", Ok((Version::Http10, false))),

            ("GET / HTTP/2.0\r\n\r\n", Err(ErrorKind::UnsupportedVersion)),
            ("GET / http/1.1\r\n\r\n", Err(ErrorKind::UnsupportedVersion)),
            ("GET / HTTP/1.1 \r\n\r\n", Err(ErrorKind::UnsupportedVersion)),
            ("GET /\r\n\r\n", Err(ErrorKind::InvalidVersion)),
            ("GET / HTTP/1.1\n\n", Err(ErrorKind::InvalidHeader)),
        ];

        for (data, expected) in cases {
            let result = parse(data).map(|r| (r.version(), r.is_keep_alive()));
            assert_eq!(result, expected, "{data:?}");
        }
    }

    #[test]
    fn parse_headers() {
        let req = parse(
            "GET / HTTP/1.1\r\nHost: example.com\r\nX-Empty:\r\nX-Spaced:   value  \r\n\r\n",
        )
        .unwrap();

        assert_eq!(req.header("host"), Some("example.com"));
        assert_eq!(req.header("HOST"), Some("example.com"));
        assert_eq!(req.header("x-empty"), Some(""));
        assert_eq!(req.header("x-spaced"), Some("value  "));
        assert_eq!(req.header("missing"), None);
        assert_eq!(req.headers().len(), 3);
    }

    #[test]
    fn parse_invalid_headers() {
        #[rustfmt::skip]
        let cases = [
            ("No-Colon value\r\n\r\n", ErrorKind::InvalidHeader),
            (": empty-name\r\n\r\n", ErrorKind::InvalidHeader),
            ("Bad Name: value\r\n\r\n", ErrorKind::InvalidHeader),
        ];

        for (headers, expected) in cases {
            let data = format!("GET / HTTP/1.1\r\n{headers}");
            assert_eq!(parse(&data), Err(expected), "{headers:?}");
        }
    }

    #[test]
    fn parse_special_headers() {
        #[rustfmt::skip]
        let cases = [
            ("content-length: 6\r\n\r\n", Ok((Some(6), true))),
            ("Content-Length: 3\r\nConnection: close\r\n\r\n", Ok((Some(3), false))),
            ("connection: Keep-Alive\r\n\r\n", Ok((None, true))),

            ("connection: keep_alive\r\n\r\n", Err(ErrorKind::InvalidConnection)),
            ("content-length: 12asd\r\n\r\n", Err(ErrorKind::InvalidContentLength)),
            ("content-length: +5\r\n\r\n", Err(ErrorKind::InvalidContentLength)),
            ("content-length: \r\n\r\n", Err(ErrorKind::InvalidContentLength)),
            ("content-length: 99999999999999999999999\r\n\r\n", Err(ErrorKind::InvalidContentLength)),
            ("content-length: 999999999\r\n\r\n", Err(ErrorKind::BodyTooLarge)),
            ("transfer-encoding: chunked\r\n\r\n", Err(ErrorKind::UnsupportedEncoding)),
            ("Transfer-Encoding: gzip\r\ncontent-length: 4\r\n\r\n", Err(ErrorKind::UnsupportedEncoding)),
        ];

        for (headers, expected) in cases {
            let data = format!("GET / HTTP/1.1\r\n{headers}");
            let result = parse(&data).map(|r| (r.content_length(), r.is_keep_alive()));
            assert_eq!(result, expected, "{headers:?}");
        }
    }

    #[test]
    fn check_limits() {
        let limits = ReqLimits {
            header_count: 2,
            url_size: 8,
            ..ReqLimits::default()
        };

        let mut req = Request::default();
        assert_eq!(
            req.parse_head(b"GET / HTTP/1.1\r\nA: 1\r\nB: 2\r\nC: 3\r\n\r\n", &limits),
            Err(ErrorKind::TooManyHeaders)
        );

        let mut req = Request::default();
        assert_eq!(
            req.parse_head(b"GET /very/long/path HTTP/1.1\r\n\r\n", &limits),
            Err(ErrorKind::InvalidUrl)
        );
    }

    #[tokio::test]
    async fn read_pipelined_requests() {
        let data = b"POST /a HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET /b?x=1 HTTP/1.1\r\n\r\n";
        let mut stream = &data[..];
        let limits = ReqLimits::default();
        let mut parser = Parser::new(&limits);
        let mut req = Request::default();
        let wait = Duration::from_secs(1);

        assert_eq!(parser.read_request(&mut stream, &mut req, &limits, wait).await, Ok(true));
        assert_eq!(req.method(), Method::Post);
        assert_eq!(req.body(), b"hello");

        req.reset();
        assert_eq!(parser.read_request(&mut stream, &mut req, &limits, wait).await, Ok(true));
        assert_eq!(req.url().path(), "/b");
        assert_eq!(req.url().query(), Some("x=1"));
        assert!(req.body().is_empty());

        req.reset();
        assert_eq!(parser.read_request(&mut stream, &mut req, &limits, wait).await, Ok(false));
    }

    #[tokio::test]
    async fn read_truncated_body() {
        let data = b"POST /a HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";
        let mut stream = &data[..];
        let limits = ReqLimits::default();
        let mut parser = Parser::new(&limits);
        let mut req = Request::default();

        let result = parser
            .read_request(&mut stream, &mut req, &limits, Duration::from_secs(1))
            .await;

        assert_eq!(
            result,
            Err(ErrorKind::BodyMismatch {
                expected: 10,
                available: 5
            })
        );
    }
}
