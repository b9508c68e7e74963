//! relay_web - Request-processing core for a custom HTTP/1.x stack
//!
//! Three parts, usable on their own or wired together by [`App`]:
//!
//! - **Protocol codec** - [`Codec`] turns raw bytes into a [`Request`] (headers,
//!   cookies, query string, JSON / URL-encoded / multipart bodies, uploaded
//!   files in temp storage) and a [`Response`] back into bytes.
//! - **Routing engine** - [`Rule`]s are normalized and validated on
//!   construction, then stored by [`Router`] in a segment trie keyed by method
//!   and path segment, with `:name` placeholders as wildcards. Exact segments
//!   win over wildcards.
//! - **Request pipeline** - [`Handler`] runs a rule's [`Processor`]s in onion
//!   order around its target [`Action`]; any processor may short-circuit.
//!
//! [`Server`] puts an [`App`] behind a Tokio TCP listener with a fixed pool of
//! worker tasks.
//!
//! # Examples
//!
//! Without any socket:
//! ```
//! use relay_web::{App, BoundArgs, Registry, Request, Response, RouteTable, Router};
//! use std::sync::Arc;
//!
//! let registry = Registry::new().with_action("Users", "show", |req: &mut Request, args: &BoundArgs| {
//!     let mut resp = Response::new();
//!     let tab = req.query_param("tab").and_then(|tab| tab.as_str()).unwrap_or("profile");
//!     resp.body(format!("user {} {}", args["id"], tab));
//!     resp
//! });
//!
//! let table = RouteTable::from_toml(r#"
//!     [[routes]]
//!     path = "/users/:id"
//!     methods = ["GET"]
//!     controller = "Users"
//!     action = "show"
//! "#).unwrap();
//!
//! let mut router = Router::new();
//! table.register(&mut router, &registry).unwrap();
//!
//! let app = App::new(router, Arc::new(registry));
//! let resp = app.respond(b"GET /users/7?tab=posts HTTP/1.1\r\n\r\n", Default::default());
//!
//! assert_eq!(resp.code(), 200);
//! assert_eq!(resp.content(), b"user 7 posts");
//! ```
//! Over TCP:
//! ```no_run
//! use relay_web::{limits::ReqLimits, App, Registry, Router, Server};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = App::new(Router::new(), Arc::new(Registry::new()));
//!
//!     Server::builder()
//!         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
//!         .app(app)
//!         .request_limits(ReqLimits {
//!             body_size: 16 * 1024 * 1024, // 16MB uploads
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```
//!
//! # Features
//!
//! - `log` (default): diagnostics through the [`log`](https://docs.rs/log) facade,
//!   under the `relay_web` target.

pub(crate) mod http {
    pub(crate) mod codec;
    pub(crate) mod multipart;
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
    pub(crate) mod upload;
}
pub(crate) mod routing {
    pub(crate) mod router;
    pub(crate) mod rule;
    pub(crate) mod table;
    pub(crate) mod tree;
}
pub(crate) mod pipeline {
    pub(crate) mod handler;
    pub(crate) mod processor;
    pub(crate) mod registry;
}
pub(crate) mod server {
    pub(crate) mod app;
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub(crate) mod errors;
pub mod limits;
mod log;

pub use crate::{
    errors::Error,
    http::{
        codec::Codec,
        query,
        request::{Env, Request},
        response::{BodyWriter, Response, WriteBuffer},
        types::{HeaderMap, StatusCode},
        upload::{Files, UploadError, UploadedFile},
    },
    pipeline::{
        handler::Handler,
        processor::{Action, Processor},
        registry::{Registry, Resolver},
    },
    routing::{
        router::Router,
        rule::{BoundArgs, Rule, Target},
        table::{GroupEntry, RouteEntry, RouteTable},
    },
    server::{
        app::App,
        connection::{serve, Connection, TcpConnection},
        server_impl::{Server, ServerBuilder},
    },
};

#[cfg(test)]
pub(crate) mod tools {
    use crate::{BoundArgs, Processor, Registry, Request, Response};

    /// Processor with pass-through hooks.
    pub struct Noop;

    impl Processor for Noop {}

    /// `auth` and `trace` processors, `Users::show` and `Users::list` actions.
    pub fn registry() -> Registry {
        let empty = |_: &mut Request, _: &BoundArgs| Response::new();

        Registry::new()
            .with_processor("auth", Noop)
            .with_processor("trace", Noop)
            .with_action("Users", "show", empty)
            .with_action("Users", "list", empty)
    }
}
