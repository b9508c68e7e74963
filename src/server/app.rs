use crate::{
    errors::Error,
    http::{
        codec::Codec,
        request::{Env, Request},
        response::Response,
    },
    log,
    pipeline::{handler::Handler, registry::Resolver},
    routing::router::Router,
};
use std::sync::Arc;

/// Request processing core: bytes in, response out.
///
/// ```text
/// raw ─> Codec::decode ─> Router::parse ─> Handler::handle ─> Response
/// ```
///
/// Shared read-only by every worker once built.
///
/// # Examples
/// ```
/// use relay_web::{App, BoundArgs, Registry, Request, Response, Router, Rule, Target};
/// use std::sync::Arc;
///
/// let registry = Registry::new().with_action("Users", "show", |_: &mut Request, args: &BoundArgs| {
///     let mut resp = Response::new();
///     resp.body(format!("user {}", args["id"]));
///     resp
/// });
///
/// let mut router = Router::new();
/// router.register(
///     Rule::new("/users/:id", ["GET"], Vec::<String>::new(), Target::new("Users", "show"), &registry)
///         .unwrap(),
/// );
///
/// let app = App::new(router, Arc::new(registry));
/// let resp = app.respond(b"GET /users/42 HTTP/1.1\r\n\r\n", Default::default());
///
/// assert_eq!(resp.content(), b"user 42");
/// ```
pub struct App {
    router: Router,
    resolver: Arc<dyn Resolver>,
    codec: Codec,
}

impl App {
    #[inline]
    pub fn new(router: Router, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            router,
            resolver,
            codec: Codec::new(),
        }
    }

    #[inline]
    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    #[inline]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[inline]
    pub(crate) fn get_codec(&self) -> &Codec {
        &self.codec
    }

    /// Routes a decoded request and runs its pipeline.
    ///
    /// Bound path arguments are also stored as request attributes under
    /// their placeholder names.
    pub fn dispatch(&self, request: &mut Request) -> Result<Response, Error> {
        let rule = self.router.parse(request.method(), request.path())?;

        for (name, value) in rule.args() {
            request.set_attribute(name.as_str(), value.as_str());
        }

        Ok(Handler::new(&rule, self.resolver.as_ref()).handle(request))
    }

    /// Decodes `raw`, dispatches it and returns the response to send.
    ///
    /// Errors become responses with the status of [`Error::status`]. The
    /// response is marked to [`close`](Response::close) the connection when
    /// the request can't be decoded or doesn't ask for keep-alive.
    pub fn respond(&self, raw: &[u8], env: Env) -> Response {
        let mut request = match self.codec.decode(raw, env) {
            Ok(request) => request,
            Err(err) => {
                log::debug!("undecodable request: {}", err);
                let mut response = error_response(&err);
                response.close();
                return response;
            }
        };

        let mut response = match self.dispatch(&mut request) {
            Ok(response) => response,
            Err(err) => error_response(&err),
        };

        if matches!(request.version(), "1.0" | "1.1") {
            response.set_version(request.version());
        }
        if !request.is_keep_alive() {
            response.close();
        }

        response
    }

    /// [`respond`](App::respond), encoded.
    #[inline]
    pub fn respond_raw(&self, raw: &[u8], env: Env) -> Vec<u8> {
        self.codec.encode(&self.respond(raw, env))
    }
}

/// `{"error": "...", "code": 404}` with the error's status.
pub(crate) fn error_response(error: &Error) -> Response {
    let status = error.status();
    let mut response = Response::with_status(status);

    let body = serde_json::json!({
        "error": error.to_string(),
        "code": status.as_u16(),
    });
    if response.json(&body).is_err() {
        response.body(status.reason());
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::registry::Registry,
        routing::rule::{BoundArgs, Rule, Target},
        StatusCode,
    };
    use serde_json::{json, Value};

    fn app() -> App {
        let registry = Registry::new()
            .with_action("UserController", "show", |req: &mut Request, args: &BoundArgs| {
                let mut resp = Response::new();
                resp.json(&json!({
                    "args": args,
                    "query": req.query(),
                    "attr": req.attribute("id"),
                }))
                .unwrap();
                resp
            })
            .with_action("UserController", "create", |req: &mut Request, _: &BoundArgs| {
                let mut resp = Response::new();
                resp.status(StatusCode::Created).json(req.parsed_body()).unwrap();
                resp
            });

        let mut router = Router::new();
        for (path, method, action) in [("/users/:id", "GET", "show"), ("/users", "POST", "create")] {
            let target = Target::new("UserController", action);
            router.register(Rule::new(path, [method], Vec::<String>::new(), target, &registry).unwrap());
        }

        App::new(router, Arc::new(registry))
    }

    fn json_body(resp: &Response) -> Value {
        serde_json::from_slice(resp.content()).unwrap()
    }

    #[test]
    fn end_to_end() {
        let resp = app().respond(b"GET /users/42?active=1 HTTP/1.1\r\nHost: x\r\n\r\n", Env::new());

        assert_eq!(resp.code(), 200);
        assert_eq!(
            json_body(&resp),
            json!({"args": {"id": "42"}, "query": {"active": "1"}, "attr": "42"})
        );
        assert!(resp.is_keep_alive());
    }

    #[test]
    fn posted_json() {
        let raw = b"POST /users HTTP/1.0\r\ncontent-type: application/json\r\n\r\n{\"name\":\"ann\"}";
        let resp = app().respond(raw, Env::new());

        assert_eq!(resp.code(), 201);
        assert_eq!(resp.version(), "1.0");
        assert_eq!(json_body(&resp), json!({"name": "ann"}));
        assert!(!resp.is_keep_alive());
    }

    #[test]
    fn errors_become_responses() {
        #[rustfmt::skip]
        let cases: [(&[u8], u16, bool); 4] = [
            (b"GET /nope HTTP/1.1\r\n\r\n",        404, true),
            (b"DELETE /users/1 HTTP/1.1\r\n\r\n",  404, true),
            (b" / HTTP/1.1\r\n\r\n",               400, false),
            (b"GET / HTTP/1.1",                    400, false),
        ];

        for (raw, code, keep_alive) in cases {
            let resp = app().respond(raw, Env::new());

            assert_eq!(resp.code(), code, "{}", String::from_utf8_lossy(raw));
            assert_eq!(resp.is_keep_alive(), keep_alive);
            assert_eq!(json_body(&resp)["code"], code);
        }
    }

    #[test]
    fn connection_close_requested() {
        let raw = b"GET /users/1 HTTP/1.1\r\nConnection: close\r\n\r\n";
        let encoded = app().respond_raw(raw, Env::new());
        let text = String::from_utf8_lossy(&encoded);

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("\r\nconnection: close\r\n"));
    }
}
