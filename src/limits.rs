//! Transport limits and timeouts used by [`Engine::run`](crate::Engine::run).
//!
//! Routing itself has no limits; these values only bound what the built-in
//! HTTP/1.x transport accepts before a request reaches the router.
//!
//! # Examples
//!
//! ```no_run
//! use maker_route::{Engine, limits::{ConnLimits, ReqLimits, ServerLimits}};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let mut engine = Engine::with_port(8080);
//!     engine.server_limits(ServerLimits {
//!         max_connections: 500,
//!         ..ServerLimits::default()
//!     });
//!     engine.connection_limits(ConnLimits {
//!         socket_read_timeout: Duration::from_secs(5),
//!         ..ConnLimits::default()
//!     });
//!     engine.request_limits(ReqLimits {
//!         body_size: 1024 * 1024, // multipart uploads
//!         ..ReqLimits::default()
//!     });
//!
//!     engine.run().await
//! }
//! ```

use std::time::Duration;

/// Server-level concurrency and queueing.
///
/// ```text
///  [ Tcp accept ] ==> queue full? ==yes==> [ 503 ]
///                          || no
///                          \/
///  [ pending queue ] ==> free worker? ==> [ worker: parse -> dispatch -> write ]
/// ```
///
/// Each worker owns one reusable [`Context`](crate::Context), so at most
/// `max_connections` requests are dispatched at the same time.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of workers, i.e. concurrently served connections (default: `100`).
    pub max_connections: usize,

    /// Accepted connections waiting for a worker (default: `250`).
    ///
    /// When the queue is full, new connections receive an immediate `503`.
    pub max_pending_connections: usize,

    /// How the accept loop waits for a free worker (default: `Sleep(50μs)`).
    pub wait_strategy: WaitStrategy,

    /// Use JSON bodies for transport error responses (default: `true`).
    ///
    /// ```text
    /// HTTP/1.1 400 Bad Request\r
    /// connection: close\r
    /// content-length: 55\r
    /// content-type: application/json\r
    /// \r
    /// {"error":"Invalid HTTP method","code":"INVALID_METHOD"}
    /// ```
    pub json_errors: bool,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: 100,
            max_pending_connections: 250,
            wait_strategy: WaitStrategy::Sleep(Duration::from_micros(50)),
            json_errors: true,

            _priv: (),
        }
    }
}

/// How a task waits for an item of an empty queue.
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// [`tokio::task::yield_now()`] between attempts. Burns CPU, lowest latency.
    Yield,

    /// [`tokio::time::sleep()`] between attempts.
    Sleep(Duration),
}

/// Per-connection timeouts and lifetime.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum wait for the next chunk of a request (default: `2s`).
    pub socket_read_timeout: Duration,

    /// Maximum time to write one response (default: `3s`).
    pub socket_write_timeout: Duration,

    /// Keep-alive requests served before the connection is closed (default: `100`).
    pub max_requests_per_connection: usize,

    /// Total lifetime of a keep-alive connection (default: `120s`).
    pub connection_lifetime: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            socket_read_timeout: Duration::from_secs(2),
            socket_write_timeout: Duration::from_secs(3),
            max_requests_per_connection: 100,
            connection_lifetime: Duration::from_secs(120),

            _priv: (),
        }
    }
}

/// Request size limits enforced by the parser.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Request target including the query string (default: `1024`).
    pub url_size: usize,

    /// Number of headers (default: `32`).
    pub header_count: usize,

    /// Size of one `name: value` header line (default: `4096`).
    pub header_line_size: usize,

    /// Body size declared by `Content-Length` (default: `64 KiB`).
    pub body_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            url_size: 1024,
            header_count: 32,
            header_line_size: 4096,
            body_size: 64 * 1024,

            _priv: (),
        }
    }
}

impl ReqLimits {
    // Method(7) + " " + URL + " " + Version(8) + "\r\n"
    #[inline(always)]
    pub(crate) fn first_line(&self) -> usize {
        19 + self.url_size
    }

    /// Largest head (first line + headers + empty line) the parser accepts.
    #[inline(always)]
    pub fn head_size(&self) -> usize {
        self.first_line() + self.header_count * (self.header_line_size + 2) + 2
    }
}

/// Response buffer sizing.
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Initial capacity of the serialized response buffer (default: `1 KiB`).
    pub default_capacity: usize,

    /// A buffer grown beyond this is dropped and reallocated on reset (default: `64 KiB`).
    pub max_capacity: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            default_capacity: 1024,
            max_capacity: 64 * 1024,

            _priv: (),
        }
    }
}
