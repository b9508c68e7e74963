//! Limits and timeouts for the server, its connections and request decoding
//!
//! Every struct implements [`Default`] with conservative values, so only the
//! fields that matter need to be spelled out. The defaults keep a single
//! client from holding a worker forever (slow reads, endless keep-alive) or
//! from making the codec allocate without bound (huge heads, parameter
//! floods, oversized uploads).
//!
//! # Examples
//!
//! ```no_run
//! use relay_web::{
//!     limits::{ConnLimits, ReqLimits, ServerLimits, WaitStrategy},
//!     App, Registry, Router, Server,
//! };
//! use std::{sync::Arc, time::Duration};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = App::new(Router::new(), Arc::new(Registry::new()));
//!
//!     Server::builder()
//!         .listener(TcpListener::bind("0.0.0.0:3000").await.unwrap())
//!         .app(app)
//!         .server_limits(ServerLimits {
//!             max_connections: 1024,
//!             wait_strategy: WaitStrategy::Yield,
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             connection_lifetime: Duration::from_secs(30),
//!             ..ConnLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             header_count: 48,            // Proxies add a few
//!             body_size: 8 * 1024 * 1024,  // 8MB uploads
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

use std::time::Duration;

/// Controls server-level concurrency, queueing, and overload behavior.
///
/// # Where a connection goes
/// ```text
///   accept ──> queue.len() < max_pending_connections ?
///                 │ yes                          │ no
///                 v                              v
///           stream queue                    error queue
///                 │                              │
///                 v                              v
///    one of `max_connections` workers    `count_503_handlers` tasks
///       (serves until the connection       (write 503, close)
///        ends or expires)
/// ```
///
/// A worker is a long-lived task spawned by [`build`](crate::ServerBuilder::build). It pops connections
/// from the shared queue and runs each one through the
/// [`App`](crate::App) until the connection ends.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of workers, i.e. connections served at the same time (default: `100`).
    pub max_connections: usize,

    /// Maximum number of accepted connections waiting for a worker (default: `250`).
    ///
    /// When the queue is full, new connections get an immediate
    /// [503](crate::StatusCode::ServiceUnavailable).
    pub max_pending_connections: usize,

    /// How idle workers wait for the queue (default: `Sleep(50μs)`).
    pub wait_strategy: WaitStrategy,

    /// Dedicated tasks answering queue overflow with `503` (default: `1`).
    ///
    /// Set to 0 to silently close overflowing connections.
    pub count_503_handlers: usize,

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
            count_503_handlers: 1,

            _priv: (),
        }
    }
}

/// How an idle worker waits for the next queued connection.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitStrategy {
    /// Spin with [`tokio::task::yield_now()`]. Lowest latency, burns a core.
    Yield,
    /// Poll with [`tokio::time::sleep()`] between attempts.
    Sleep(Duration),
}

/// Per-connection timeouts and budgets.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum duration to wait for data from the socket (default: `2 seconds`)
    ///
    /// Applies to every read, so it also bounds the idle time between two
    /// keep-alive requests.
    pub socket_read_timeout: Duration,

    /// Maximum duration of writing one response (default: `3 seconds`)
    pub socket_write_timeout: Duration,

    /// Requests served before the connection is closed (default: `100`)
    pub max_requests_per_connection: usize,

    /// Maximum lifetime of a connection (default: `2 minutes`)
    ///
    /// Checked between requests; a request in flight is never cut.
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
            connection_lifetime: Duration::from_secs(120),
            max_requests_per_connection: 100,

            _priv: (),
        }
    }
}

/// HTTP request size limits
///
/// ⚠️ **SECURITY-FIRST DEFAULTS**
///
/// 🔧 **You MAY need to increase these if you see:**
/// - `413 Payload Too Large` for legitimate uploads
/// - `431 Request Header Fields Too Large`
/// - `400 Bad Request` mentioning the query parameter limit
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Maximum size of the head (start line, headers and the empty line) in bytes
    /// (default: `8 KB`)
    pub head_size: usize,

    /// Maximum number of header lines (default: `32`)
    pub header_count: usize,

    /// Maximum body size in bytes, taken from `content-length` (default: `1 MB`)
    ///
    /// Multipart uploads are read whole before being split, so this bounds
    /// the upload size too.
    pub body_size: usize,

    /// Maximum number of `key=value` pairs in each of the query string, the
    /// cookie header and a URL-encoded body (default: `64`)
    pub query_params: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            head_size: 8 * 1024, // Start line + ~30 ordinary headers
            header_count: 32,    // Typical: 10-12 browser headers + custom ones
            body_size: 1024 * 1024,
            query_params: 64,

            _priv: (),
        }
    }
}
