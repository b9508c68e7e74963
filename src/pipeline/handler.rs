use crate::{
    http::{request::Request, response::Response},
    log,
    pipeline::registry::Resolver,
    routing::rule::{BoundArgs, Rule, Target},
};

/// Runs one request through the middleware chain of a matched [`Rule`].
///
/// The handler owns its cursor into the middleware list and is used for a
/// single request only. Middleware registered first wraps outermost: its
/// `before` runs first and its `after` runs last.
///
/// ```text
/// handle ─> [auth].before ─> [trace].before ─> action
///                                                │
///           [auth].after  <─ [trace].after  <────┘
/// ```
///
/// # Examples
/// ```
/// use relay_web::{BoundArgs, Handler, Registry, Request, Response, Router, Rule, Target};
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
/// let rule = router.parse("GET", "/users/42").unwrap();
/// let resp = Handler::new(&rule, &registry).handle(&mut Request::new("GET", "/users/42"));
///
/// assert_eq!(resp.content(), b"user 42");
/// ```
pub struct Handler<'r> {
    middlewares: &'r [String],
    cursor: usize,
    target: &'r Target,
    args: &'r BoundArgs,
    resolver: &'r dyn Resolver,
}

impl<'r> Handler<'r> {
    #[inline]
    pub fn new(rule: &'r Rule, resolver: &'r dyn Resolver) -> Self {
        Self {
            middlewares: rule.middlewares(),
            cursor: 0,
            target: rule.target(),
            args: rule.args(),
            resolver,
        }
    }

    /// Advances to the next middleware, or calls the target action once
    /// the chain is exhausted.
    ///
    /// Each layer's `before` runs first; a response from it is returned
    /// as is. Otherwise the inner layers run and the layer's `after` gets
    /// their response. Middleware that can't be resolved is skipped. A
    /// target that can't be resolved yields an empty `200 OK`.
    pub fn handle(&mut self, request: &mut Request) -> Response {
        let middlewares = self.middlewares;

        while let Some(id) = middlewares.get(self.cursor) {
            self.cursor += 1;

            match self.resolver.processor(id) {
                Some(processor) => {
                    if let Some(response) = processor.before(request) {
                        return response;
                    }

                    let response = self.handle(request);
                    return processor.after(request, response);
                }
                None => {
                    log::warning!("middleware {} is not resolvable, skipped", id);
                }
            }
        }

        match self.resolver.action(self.target) {
            Some(action) => action.call(request, self.args),
            None => {
                log::warning!("action {} is not resolvable", self.target);
                Response::new()
            }
        }
    }

    /// Number of middleware layers entered so far.
    #[inline]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pipeline::{processor::Processor, registry::Registry},
        StatusCode,
    };
    use std::sync::{Arc, Mutex};

    type Trace = Arc<Mutex<Vec<String>>>;

    struct Layer {
        name: &'static str,
        trace: Trace,
        stop: bool,
    }

    impl Processor for Layer {
        fn before(&self, _: &mut Request) -> Option<Response> {
            self.trace.lock().unwrap().push(format!("{}.before", self.name));

            self.stop.then(|| {
                let mut resp = Response::new();
                resp.status(StatusCode::Forbidden).body(self.name);
                resp
            })
        }

        fn after(&self, _: &Request, mut response: Response) -> Response {
            self.trace.lock().unwrap().push(format!("{}.after", self.name));
            response.append_header("x-layers", self.name).unwrap();
            response
        }
    }

    fn setup(stop: &[&'static str]) -> (Registry, Trace) {
        let trace = Trace::default();
        let mut registry = Registry::new();

        for name in ["a", "b", "c"] {
            let layer = Layer {
                name,
                trace: trace.clone(),
                stop: stop.contains(&name),
            };
            registry.insert_processor(name, Arc::new(layer));
        }

        let action_trace = trace.clone();
        let registry = registry.with_action("Users", "show", move |req: &mut Request, args: &BoundArgs| {
            action_trace.lock().unwrap().push("action".to_string());
            req.set_attribute("seen", true);

            let mut resp = Response::new();
            resp.body(args.get("id").map_or("-", String::as_str));
            resp
        });

        (registry, trace)
    }

    fn rule(middlewares: &[&str], registry: &Registry, target: Target) -> Rule {
        let rule = Rule::new("/users/:id", ["GET"], middlewares.iter().copied(), target, registry);
        rule.unwrap()
            .with_args(BoundArgs::from([("id".to_string(), "42".to_string())]))
    }

    #[test]
    fn onion_order() {
        let (registry, trace) = setup(&[]);
        let rule = rule(&["a", "b", "c"], &registry, Target::new("Users", "show"));

        let mut req = Request::new("GET", "/users/42");
        let mut handler = Handler::new(&rule, &registry);
        let resp = handler.handle(&mut req);

        assert_eq!(
            *trace.lock().unwrap(),
            ["a.before", "b.before", "c.before", "action", "c.after", "b.after", "a.after"]
        );
        assert_eq!(resp.content(), b"42");
        assert_eq!(resp.headers().line("x-layers").as_deref(), Some("c, b, a"));
        assert_eq!(req.attribute("seen"), Some(&serde_json::Value::Bool(true)));
        assert_eq!(handler.cursor(), 3);
    }

    #[test]
    fn short_circuit() {
        #[rustfmt::skip]
        let cases: [(&[&str], &[&str], u16, &[u8]); 3] = [
            (&["a"], &["a.before"],                                  403, b"a"),
            (&["b"], &["a.before", "b.before", "a.after"],           403, b"b"),
            (&["c"], &["a.before", "b.before", "c.before", "b.after", "a.after"], 403, b"c"),
        ];

        for (stop, expected, code, body) in cases {
            let (registry, trace) = setup(stop);
            let rule = rule(&["a", "b", "c"], &registry, Target::new("Users", "show"));

            let resp = Handler::new(&rule, &registry).handle(&mut Request::new("GET", "/"));

            assert_eq!(*trace.lock().unwrap(), expected, "stop at {stop:?}");
            assert_eq!((resp.code(), resp.content()), (code, body));
        }
    }

    #[test]
    fn default_hooks_pass_through() {
        let (mut registry, trace) = setup(&[]);
        registry.insert_processor("noop", Arc::new(crate::tools::Noop));
        let rule = rule(&["a", "noop", "b"], &registry, Target::new("Users", "show"));

        let mut handler = Handler::new(&rule, &registry);
        let resp = handler.handle(&mut Request::new("GET", "/users/42"));

        assert_eq!(
            *trace.lock().unwrap(),
            ["a.before", "b.before", "action", "b.after", "a.after"]
        );
        assert_eq!(resp.content(), b"42");
        assert_eq!(resp.headers().line("x-layers").as_deref(), Some("b, a"));
        assert_eq!(handler.cursor(), 3);
    }

    #[test]
    fn no_middleware() {
        let (registry, trace) = setup(&[]);
        let rule = rule(&[], &registry, Target::new("Users", "show"));

        let resp = Handler::new(&rule, &registry).handle(&mut Request::new("GET", "/users/42"));

        assert_eq!(*trace.lock().unwrap(), ["action"]);
        assert_eq!(resp.content(), b"42");
        assert!(resp.headers().is_empty());
    }

    #[test]
    fn unresolvable_at_request_time() {
        let (registry, trace) = setup(&[]);
        let rule = rule(&["a", "b"], &registry, Target::new("Users", "show"));

        // Validation happened against the full registry, serving against a smaller one
        let mut reduced = Registry::new();
        reduced.insert_processor(
            "b",
            Arc::new(Layer {
                name: "b",
                trace: trace.clone(),
                stop: false,
            }),
        );

        let resp = Handler::new(&rule, &reduced).handle(&mut Request::new("GET", "/"));

        assert_eq!(*trace.lock().unwrap(), ["b.before", "b.after"]);
        assert_eq!(resp.code(), 200);
        assert!(resp.content().is_empty());
        assert_eq!(resp.headers().line("x-layers").as_deref(), Some("b"));
    }
}
