use crate::{
    errors::Error,
    log,
    routing::{
        rule::{BoundArgs, Rule},
        tree::{RouteTree, Segment},
    },
};
use std::sync::Arc;

/// Method + path router over a segment trie.
///
/// Rules are registered during startup; afterwards the router is only read
/// and can be shared between any number of tasks.
///
/// # Examples
/// ```
/// use relay_web::{BoundArgs, Registry, Request, Response, Router, Rule, Target};
///
/// let registry = Registry::new()
///     .with_action("Users", "show", |_: &mut Request, _: &BoundArgs| Response::new());
///
/// let mut router = Router::new();
/// router.register(
///     Rule::new("/users/:id", ["GET"], Vec::<String>::new(), Target::new("Users", "show"), &registry)
///         .unwrap(),
/// );
///
/// let rule = router.parse("GET", "/users/42").unwrap();
/// assert_eq!(rule.args()["id"], "42");
///
/// assert!(router.parse("DELETE", "/users/42").is_err());
/// ```
#[derive(Debug, Default)]
pub struct Router {
    root: RouteTree,
    rules: Vec<Arc<Rule>>,
}

impl Router {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `rule` once for every method it allows.
    ///
    /// Placeholder segments (`:name`) are indexed as a wildcard. A rule
    /// whose index equals an earlier one replaces it.
    pub fn register(&mut self, rule: Rule) {
        let rule = Arc::new(rule);
        let segments = split_path(rule.path());

        for method in rule.methods() {
            let index = std::iter::once(Segment::Literal(method.clone()))
                .chain(segments.iter().map(|segment| Segment::from_pattern(segment)))
                .collect::<Vec<_>>();

            match self.root.insert(&index, rule.clone()) {
                Some(previous) => {
                    log::debug!(
                        "{} {} replaces {} {}",
                        method,
                        rule.path(),
                        method,
                        previous.path()
                    );
                }
                None => {
                    log::debug!("{} {} -> {}", method, rule.path(), rule.target());
                }
            }
        }

        self.rules.push(rule);
    }

    /// Matches a request method and path.
    ///
    /// Returns a copy of the matched rule with the placeholder values bound,
    /// or [`Error::NotFound`].
    pub fn parse(&self, method: &str, path: &str) -> Result<Rule, Error> {
        let method = method.to_ascii_uppercase();
        let segments = split_path(path);

        let mut index = Vec::with_capacity(segments.len() + 1);
        index.push(method.as_str());
        index.extend_from_slice(&segments);

        let Some(rule) = self.root.get(&index) else {
            log::debug!("no route for {} {}", method, path);
            return Err(Error::NotFound {
                method,
                path: path.to_string(),
            });
        };

        let args = split_path(rule.path())
            .into_iter()
            .zip(segments)
            .filter_map(|(pattern, value)| {
                let name = pattern.strip_prefix(':')?;
                Some((name.to_string(), value.to_string()))
            })
            .collect::<BoundArgs>();

        Ok(rule.with_args(args))
    }

    /// Every registered rule, in registration order.
    #[inline]
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(Arc::as_ref)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// "/users/42/" -> ["users", "42"], "/" -> [""]
fn split_path(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tools::registry, Target};

    fn router(rules: &[(&str, &[&str], &str)]) -> Router {
        let registry = registry();
        let mut router = Router::new();

        for (path, methods, action) in rules {
            let target = Target::new("Users", *action);
            let rule = Rule::new(path, methods.iter().copied(), Vec::<String>::new(), target, &registry);
            router.register(rule.unwrap());
        }

        router
    }

    #[test]
    fn split() {
        #[rustfmt::skip]
        let cases: [(&str, &[&str]); 5] = [
            ("/",           &[""]),
            ("",            &[""]),
            ("/users",      &["users"]),
            ("/users/42/",  &["users", "42"]),
            ("users//42",   &["users", "", "42"]),
        ];

        for (path, expected) in cases {
            assert_eq!(split_path(path), expected);
        }
    }

    #[test]
    fn bound_args() {
        let router = router(&[
            ("/users/:id", &["GET"], "show"),
            ("/users/:user/posts/:post", &["GET"], "show"),
            ("/", &["GET"], "show"),
        ]);

        #[rustfmt::skip]
        let cases: [(&str, &str, &[(&str, &str)]); 5] = [
            ("/users/42",          "/users/:id",               &[("id", "42")]),
            ("/users/42/",         "/users/:id",               &[("id", "42")]),
            ("/users/7/posts/x-1", "/users/:user/posts/:post", &[("user", "7"), ("post", "x-1")]),
            ("/",                  "/",                        &[]),
            ("",                   "/",                        &[]),
        ];

        for (path, pattern, args) in cases {
            let rule = router.parse("get", path).unwrap();
            let expected: BoundArgs = args
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();

            assert_eq!(rule.path(), pattern, "{path}");
            assert_eq!(rule.args(), &expected, "{path}");
        }
    }

    #[test]
    fn exact_segment_wins_at_every_depth() {
        let router = router(&[
            ("/a/:x/c", &["GET"], "show"),
            ("/a/b/:y", &["GET"], "show"),
            ("/:p/b/c", &["GET"], "show"),
        ]);

        #[rustfmt::skip]
        let cases = [
            ("/a/b/c",  "/a/b/:y"),
            ("/a/z/c",  "/a/:x/c"),
            ("/q/b/c",  "/:p/b/c"),
        ];

        for (path, pattern) in cases {
            assert_eq!(router.parse("GET", path).unwrap().path(), pattern, "{path}");
        }
    }

    #[test]
    fn not_found() {
        let router = router(&[("/users/:id", &["GET", "POST"], "show")]);

        #[rustfmt::skip]
        let cases = [
            ("DELETE", "/users/1"),
            ("GET",    "/users"),
            ("GET",    "/users/1/2"),
            ("GET",    "/"),
            ("PUT",    "/"),
        ];

        for (method, path) in cases {
            match router.parse(method, path) {
                Err(Error::NotFound { method: m, path: p }) => {
                    assert_eq!((m.as_str(), p.as_str()), (method, path));
                }
                other => panic!("{method} {path}: {other:?}"),
            }
        }

        assert!(router.parse("post", "/users/1").is_ok());
    }

    #[test]
    fn one_rule_per_method() {
        let router = router(&[("/items", &["GET", "POST"], "show")]);

        assert_eq!(router.len(), 1);
        assert!(router.parse("GET", "/items").is_ok());
        assert!(router.parse("POST", "/items").is_ok());
        assert!(router.parse("PATCH", "/items").is_err());
    }

    #[test]
    fn last_registration_wins() {
        let router = router(&[
            ("/users/:id", &["GET"], "show"),
            ("/users/:name", &["GET"], "list"),
        ]);

        let rule = router.parse("GET", "/users/bob").unwrap();

        assert_eq!(rule.target().action, "list");
        assert_eq!(rule.args()["name"], "bob");
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn registered_rule_is_not_mutated() {
        let router = router(&[("/users/:id", &["GET"], "show")]);

        let _ = router.parse("GET", "/users/1").unwrap();
        assert!(router.rules().all(|rule| rule.args().is_empty()));
    }
}
