use crate::{
    http::{codec::Codec, response::Response, types::StatusCode},
    limits::{ConnLimits, ReqLimits, ServerLimits, WaitStrategy},
    log,
    server::{
        app::App,
        connection::{serve, Connection, TcpConnection},
    },
};
use crossbeam::queue::SegQueue;
use std::{net::SocketAddr, sync::Arc};
use tokio::{
    net::{TcpListener, TcpStream},
    task::yield_now,
    time::sleep as tokio_sleep,
};

/// TCP front of an [`App`].
///
/// A fixed set of worker tasks is spawned by [`ServerBuilder::build`]; the
/// accept loop only queues sockets for them.
///
/// # Examples
///
/// ```no_run
/// use relay_web::{App, Registry, Router, Server};
/// use std::sync::Arc;
/// use tokio::net::TcpListener;
///
/// #[tokio::main]
/// async fn main() {
///     let app = App::new(Router::new(), Arc::new(Registry::new()));
///
///     Server::builder()
///         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
///         .app(app)
///         .build()
///         .launch()
///         .await
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    stream_queue: TcpQueue,
    error_queue: TcpQueue,
    server_limits: ServerLimits,
}

impl Server {
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            listener: None,
            app: None,

            server_limits: None,
            connection_limits: None,
            request_limits: None,
        }
    }

    /// Accepts connections forever.
    ///
    /// Connections beyond [`max_pending_connections`](ServerLimits::max_pending_connections)
    /// are handed to the 503 tasks instead of the workers.
    #[inline]
    pub async fn launch(self) {
        if let Ok(addr) = self.listener.local_addr() {
            log::info!("listening on {}", addr);
        }

        loop {
            let value = match self.listener.accept().await {
                Ok(value) => value,
                Err(err) => {
                    log::error!("accept failed: {}", err);
                    continue;
                }
            };

            match self.stream_queue.len() < self.server_limits.max_pending_connections {
                true => self.stream_queue.push(value),
                false => {
                    log::warning!("queue is full, rejecting {}", value.1);
                    self.error_queue.push(value)
                }
            }
        }
    }

    #[inline]
    async fn get_stream(queue: &TcpQueue, wait: &WaitStrategy) -> (TcpStream, SocketAddr) {
        loop {
            if let Some(value) = queue.pop() {
                return value;
            }

            match wait {
                WaitStrategy::Yield => yield_now().await,
                WaitStrategy::Sleep(time) => tokio_sleep(*time).await,
            }
        }
    }
}

//

/// Builder for [`Server`].
pub struct ServerBuilder {
    listener: Option<TcpListener>,
    app: Option<App>,

    server_limits: Option<ServerLimits>,
    connection_limits: Option<ConnLimits>,
    request_limits: Option<ReqLimits>,
}

impl ServerBuilder {
    /// **Required.** Socket the server accepts connections on.
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// **Required.** Router, resolver and codec serving every request.
    #[inline(always)]
    pub fn app(mut self, app: App) -> Self {
        self.app = Some(app);
        self
    }

    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Applied to both the socket reader and the app's [`Codec`].
    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// Spawns the workers and the 503 tasks, then returns the server.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Panics
    ///
    /// When [`listener`](Self::listener) or [`app`](Self::app) was not called.
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server {
        let listener = self
            .listener
            .expect("The `listener` method must be called to create");
        let mut app = self.app.expect("The `app` method must be called to create");

        let server_limits = self.server_limits.unwrap_or_default();
        let conn_limits = self.connection_limits.unwrap_or_default();
        let req_limits = match self.request_limits {
            Some(limits) => {
                let codec = app.get_codec().clone().limits(limits.clone());
                app = app.codec(codec);
                limits
            }
            None => app.get_codec().req_limits().clone(),
        };
        let app = Arc::new(app);

        let stream_queue = Arc::new(SegQueue::new());
        let error_queue = Arc::new(SegQueue::new());

        for _ in 0..server_limits.max_connections {
            spawn_worker(&stream_queue, &app, &server_limits, &conn_limits, &req_limits);
        }
        if server_limits.count_503_handlers != 0 {
            for _ in 0..server_limits.count_503_handlers {
                spawn_alarmist(&error_queue, app.get_codec(), &server_limits, &conn_limits);
            }
        } else {
            spawn_quiet_alarmist(&error_queue, &server_limits);
        }

        log::debug!(
            "{} workers, {} routing rules",
            server_limits.max_connections,
            app.router().len()
        );

        Server {
            listener,
            stream_queue,
            error_queue,
            server_limits,
        }
    }
}

#[inline]
fn spawn_worker(
    queue: &TcpQueue,
    app: &Arc<App>,
    server_limits: &ServerLimits,
    conn_limits: &ConnLimits,
    req_limits: &ReqLimits,
) {
    let queue = queue.clone();
    let app = app.clone();
    let wait = server_limits.wait_strategy.clone();
    let (conn_limits, req_limits) = (conn_limits.clone(), req_limits.clone());

    tokio::spawn(async move {
        loop {
            let (stream, addr) = Server::get_stream(&queue, &wait).await;
            let mut conn =
                TcpConnection::accepted(stream, addr, conn_limits.clone(), req_limits.clone());

            if let Err(err) = serve(&mut conn, &app, &conn_limits).await {
                log::debug!("connection {} ended: {}", addr, err);
            }
        }
    });
}

#[inline]
fn spawn_alarmist(
    queue: &TcpQueue,
    codec: &Codec,
    server_limits: &ServerLimits,
    conn_limits: &ConnLimits,
) {
    let queue = queue.clone();
    let wait = server_limits.wait_strategy.clone();
    let conn_limits = conn_limits.clone();

    let mut response = Response::with_status(StatusCode::ServiceUnavailable);
    response.close();
    let raw = codec.encode(&response);

    tokio::spawn(async move {
        loop {
            let (stream, addr) = Server::get_stream(&queue, &wait).await;
            let mut conn = TcpConnection::accepted(stream, addr, conn_limits.clone(), ReqLimits::default());

            if let Err(err) = conn.send(&raw).await {
                log::debug!("503 to {} failed: {}", addr, err);
            }
        }
    });
}

#[inline]
fn spawn_quiet_alarmist(queue: &TcpQueue, server_limits: &ServerLimits) {
    let queue = queue.clone();
    let wait = server_limits.wait_strategy.clone();

    tokio::spawn(async move {
        loop {
            let (stream, _) = Server::get_stream(&queue, &wait).await;

            drop(stream);
        }
    });
}

type TcpQueue = Arc<SegQueue<(TcpStream, SocketAddr)>>;
