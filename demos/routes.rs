use relay_web::{
    limits::{ConnLimits, ReqLimits},
    App, BoundArgs, Codec, Processor, Registry, Request, Response, RouteTable, Router, Server,
    StatusCode,
};
use serde_json::{json, Value};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::net::TcpListener;

const ROUTES: &str = r#"
[[routes]]
path = "/"
methods = ["GET"]
controller = "Pages"
action = "index"

[[groups]]
prefix = "/users"
middlewares = ["timing"]
controller = "Users"

  [[groups.routes]]
  path = ":id"
  methods = ["GET"]
  action = "show"

  [[groups.routes]]
  path = ":id/avatar"
  methods = ["POST"]
  middlewares = ["token"]
  action = "upload"
"#;

/// Adds `x-elapsed-us` to every response.
struct Timing;

fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_micros() as u64)
}

impl Processor for Timing {
    fn before(&self, req: &mut Request) -> Option<Response> {
        req.set_attribute("started_us", now_us());
        None
    }

    fn after(&self, req: &Request, mut resp: Response) -> Response {
        let started = req.attribute("started_us").and_then(Value::as_u64).unwrap_or(0);
        let _ = resp.set_header("x-elapsed-us", now_us().saturating_sub(started).to_string());
        resp
    }
}

/// Rejects requests without `authorization: Bearer demo`.
struct Token;

impl Processor for Token {
    fn before(&self, req: &mut Request) -> Option<Response> {
        if req.header_line("authorization").as_deref() == Some("Bearer demo") {
            return None;
        }

        let mut resp = Response::new();
        resp.status(StatusCode::Unauthorized).body("missing token");
        Some(resp)
    }
}

fn index(_: &mut Request, _: &BoundArgs) -> Response {
    let mut resp = Response::new();
    resp.body("Try GET /users/42 or POST a multipart `avatar` to /users/42/avatar");
    resp
}

fn show(req: &mut Request, args: &BoundArgs) -> Response {
    let mut resp = Response::new();
    let _ = resp.json(&json!({
        "id": args["id"],
        "query": req.query(),
        "from": req.server_param("remote_addr"),
    }));
    resp
}

fn upload(req: &mut Request, args: &BoundArgs) -> Response {
    let mut resp = Response::new();

    let Some(file) = req.file_mut("avatar") else {
        resp.status(StatusCode::BadRequest).body("no `avatar` file");
        return resp;
    };

    let target = std::env::temp_dir().join(format!("avatar-{}", args["id"]));
    let summary = json!({
        "filename": file.client_filename(),
        "type": file.client_media_type(),
        "size": file.size(),
        "error": file.error().name(),
    });

    match file.move_to(&target) {
        Ok(()) => {
            let _ = resp.status(StatusCode::Created).json(&summary);
        }
        Err(err) => {
            resp.status(StatusCode::UnprocessableEntity).body(err.to_string());
        }
    }
    resp
}

#[tokio::main]
async fn main() {
    let registry = Registry::new()
        .with_processor("timing", Timing)
        .with_processor("token", Token)
        .with_action("Pages", "index", index)
        .with_action("Users", "show", show)
        .with_action("Users", "upload", upload);

    let mut router = Router::new();
    let count = RouteTable::from_toml(ROUTES)
        .and_then(|table| table.register(&mut router, &registry))
        .unwrap_or_else(|err| panic!("invalid route table: {err}"));
    println!("{count} routes registered");

    let req_limits = ReqLimits {
        body_size: 4 * 1024 * 1024,
        ..ReqLimits::default()
    };
    let app = App::new(router, Arc::new(registry)).codec(Codec::new().limits(req_limits.clone()));

    Server::builder()
        .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
        .app(app)
        .connection_limits(ConnLimits {
            max_requests_per_connection: 1000,
            ..ConnLimits::default()
        })
        .request_limits(req_limits)
        .build()
        .launch()
        .await;
}
