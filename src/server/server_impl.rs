use crate::{
    engine::App,
    errors::ErrorKind,
    limits::{ConnLimits, ReqLimits, RespLimits, ServerLimits, WaitStrategy},
    server::connection::{writer, HttpConnection},
    Version,
};
use crossbeam::queue::{ArrayQueue, SegQueue};
use std::{net::SocketAddr, sync::Arc};
use tokio::{
    net::{TcpListener, TcpStream},
    task::yield_now,
    time::sleep as tokio_sleep,
};

/// Every limit the transport works with.
#[derive(Debug, Clone, Default)]
pub(crate) struct AllTypesLimits {
    pub(crate) server: ServerLimits,
    pub(crate) connection: ConnLimits,
    pub(crate) request: ReqLimits,
    pub(crate) response: RespLimits,
}

type Incoming = (TcpStream, SocketAddr);

/// Accept loop feeding a fixed pool of workers.
///
/// Each worker owns one [`HttpConnection`] (and with it one reusable
/// [`Context`](crate::Context)), so memory per connection is allocated once
/// at startup.
pub(crate) struct Server {
    listener: TcpListener,

    worker_pool: Arc<ArrayQueue<HttpConnection>>,
    incoming_streams: Arc<SegQueue<Incoming>>,

    limits: AllTypesLimits,
}

macro_rules! impl_get_value_queue {
    ($name:ident, $type:ident) => {
        #[inline]
        async fn $name<V>(pool: &Arc<$type<V>>, limits: &ServerLimits) -> V {
            loop {
                if let Some(value) = pool.pop() {
                    return value;
                }

                match &limits.wait_strategy {
                    WaitStrategy::Yield => yield_now().await,
                    WaitStrategy::Sleep(time) => tokio_sleep(*time).await,
                }
            }
        }
    };
}

impl Server {
    pub(crate) fn new(listener: TcpListener, app: Arc<App>, limits: AllTypesLimits) -> Self {
        let workers = limits.server.max_connections.max(1);
        let worker_pool = ArrayQueue::new(workers);

        for _ in 0..workers {
            let _ = worker_pool.push(HttpConnection::new(app.clone(), &limits));
        }

        Server {
            listener,

            worker_pool: Arc::new(worker_pool),
            incoming_streams: Arc::new(SegQueue::new()),

            limits,
        }
    }

    /// Serves connections forever.
    pub(crate) async fn launch(self) {
        let streams_rx = self.incoming_streams.clone();
        let streams_tx = self.incoming_streams.clone();
        let accept_limits = self.limits.clone();
        let listener = self.listener;

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let _ = stream.set_nodelay(true);
                        Self::push_incoming_stream(stream, addr, &streams_tx, &accept_limits);
                    }
                    Err(err) => tracing::warn!(%err, "accept failed"),
                }
            }
        });

        let server_limits = &self.limits.server;
        loop {
            let mut worker = Self::get_value_array(&self.worker_pool, server_limits).await;
            let (mut stream, addr) = Self::get_value_seq(&streams_rx, server_limits).await;

            let worker_pool = self.worker_pool.clone();
            tokio::spawn(async move {
                if let Err(err) = worker.run(&mut stream, addr).await {
                    tracing::debug!(%addr, %err, "connection closed with an I/O error");
                }
                let _ = worker_pool.push(worker);
            });
        }
    }

    #[inline]
    fn push_incoming_stream(
        mut stream: TcpStream,
        addr: SocketAddr,
        streams_tx: &Arc<SegQueue<Incoming>>,
        limits: &AllTypesLimits,
    ) {
        if streams_tx.len() < limits.server.max_pending_connections {
            streams_tx.push((stream, addr));
            return;
        }

        tracing::warn!(%addr, pending = streams_tx.len(), "pending queue full, rejecting");

        let json = limits.server.json_errors;
        let write_timeout = limits.connection.socket_write_timeout;
        tokio::spawn(async move {
            let _ = writer::send_error(
                &mut stream,
                Version::Http11,
                ErrorKind::ServiceUnavailable,
                json,
                write_timeout,
            )
            .await;
        });
    }

    impl_get_value_queue! { get_value_array, ArrayQueue }
    impl_get_value_queue! { get_value_seq, SegQueue }
}
