use crate::{
    engine::App,
    errors::ErrorKind,
    http::{request::Parser, types::Method},
    limits::{ConnLimits, ReqLimits, RespLimits},
    server::server_impl::AllTypesLimits,
    Context, Request, StatusCode,
};
use std::{
    io,
    net::SocketAddr,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    time::Instant,
};
use tokio::io::{AsyncRead, AsyncWrite};

/// One worker: parses requests of a connection, dispatches them and writes
/// the responses back, reusing its buffers between connections.
pub(crate) struct HttpConnection {
    app: Arc<App>,

    connection: Connection,
    parser: Parser,
    ctx: Context,
    output: Vec<u8>,

    json_errors: bool,
    conn_limits: ConnLimits,
    req_limits: ReqLimits,
    resp_limits: RespLimits,
}

impl HttpConnection {
    #[inline]
    pub(crate) fn new(app: Arc<App>, limits: &AllTypesLimits) -> Self {
        Self {
            app,

            connection: Connection::new(),
            parser: Parser::new(&limits.request),
            ctx: Context::new(Request::default()),
            output: Vec::with_capacity(limits.response.default_capacity),

            json_errors: limits.server.json_errors,
            conn_limits: limits.connection.clone(),
            req_limits: limits.request.clone(),
            resp_limits: limits.response.clone(),
        }
    }

    /// Serves `stream` until the peer closes it or a limit is reached.
    ///
    /// Protocol errors are answered with a canned response; only I/O errors
    /// are returned.
    pub(crate) async fn run<S>(&mut self, stream: &mut S, addr: SocketAddr) -> Result<(), io::Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.impl_run(stream, addr).await {
            Ok(()) => Ok(()),
            Err(ErrorKind::Io(e)) => Err(e.0),
            Err(err) => {
                tracing::debug!(%addr, ?err, "rejecting malformed request");
                writer::send_error(
                    stream,
                    self.ctx.request().version(),
                    err,
                    self.json_errors,
                    self.conn_limits.socket_write_timeout,
                )
                .await
            }
        }
    }

    async fn impl_run<S>(&mut self, stream: &mut S, addr: SocketAddr) -> Result<(), ErrorKind>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.connection.reset();
        self.parser.reset();

        while !self.is_expired() {
            self.ctx.reset(&self.resp_limits);

            let read = self
                .parser
                .read_request(
                    stream,
                    self.ctx.request_mut(),
                    &self.req_limits,
                    self.conn_limits.socket_read_timeout,
                )
                .await?;
            if !read {
                break;
            }

            self.ctx.request_mut().client_addr = addr;
            self.ctx.prepare_response();
            self.connection.request_count += 1;
            if self.is_expired() {
                self.ctx.response_mut().close();
            }

            self.dispatch(addr);

            let head_only = self.ctx.method() == Method::Head;
            self.output.clear();
            self.ctx.response().write_into(&mut self.output, head_only);
            writer::write_bytes(stream, &self.output, self.conn_limits.socket_write_timeout).await?;

            if self.output.capacity() > self.resp_limits.max_capacity {
                self.output = Vec::with_capacity(self.resp_limits.default_capacity);
            }

            if !self.ctx.response().is_keep_alive() {
                break;
            }
        }

        Ok(())
    }

    /// Runs the handler chain; a panicking handler gets a `500` and the
    /// connection is closed.
    #[inline]
    fn dispatch(&mut self, addr: SocketAddr) {
        let app = &self.app;
        let ctx = &mut self.ctx;

        if catch_unwind(AssertUnwindSafe(|| app.serve(ctx))).is_err() {
            tracing::error!(
                %addr,
                method = %self.ctx.method(),
                path = self.ctx.path(),
                "handler panicked"
            );

            let resp = self.ctx.response_mut();
            resp.clear_body()
                .remove_header("content-type")
                .remove_header("location")
                .close();
            self.ctx.string(StatusCode::InternalServerError, "500 Internal Server Error\n");
        }
    }

    #[inline(always)]
    fn is_expired(&self) -> bool {
        self.connection.request_count >= self.conn_limits.max_requests_per_connection
            || self.connection.created.elapsed() > self.conn_limits.connection_lifetime
    }
}

pub(crate) mod writer {
    use crate::{errors::ErrorKind, http::types::Version};
    use std::io;
    use tokio::{
        io::{AsyncWrite, AsyncWriteExt},
        time::{timeout, Duration},
    };

    #[inline(always)]
    pub(crate) async fn send_error<S: AsyncWrite + Unpin>(
        stream: &mut S,
        version: Version,
        error: ErrorKind,
        json: bool,
        write_timeout: Duration,
    ) -> Result<(), io::Error> {
        write_bytes(stream, error.as_http(version, json), write_timeout).await
    }

    #[inline(always)]
    pub(crate) async fn write_bytes<S: AsyncWrite + Unpin>(
        stream: &mut S,
        response: &[u8],
        write_timeout: Duration,
    ) -> Result<(), io::Error> {
        timeout(write_timeout, stream.write_all(response)).await??;
        stream.flush().await
    }
}

#[derive(Debug)]
pub(crate) struct Connection {
    created: Instant,
    request_count: usize,
}

impl Connection {
    #[inline(always)]
    pub(crate) fn new() -> Self {
        Self {
            created: Instant::now(),
            request_count: 0,
        }
    }

    #[inline(always)]
    pub(crate) fn reset(&mut self) {
        self.created = Instant::now();
        self.request_count = 0;
    }
}
