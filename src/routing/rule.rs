use crate::{errors::Error, pipeline::registry::Resolver};
use std::{collections::HashMap, fmt};

/// Placeholder name -> literal path segment captured by a match.
pub type BoundArgs = HashMap<String, String>;

/// The action a rule dispatches to: a controller and one of its actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub controller: String,
    pub action: String,
}

impl Target {
    #[inline]
    pub fn new<C: Into<String>, A: Into<String>>(controller: C, action: A) -> Self {
        Self {
            controller: controller.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.controller, self.action)
    }
}

/// A normalized route rule.
///
/// Built once at registration and never changed afterwards; a match hands
/// out a clone carrying the [bound arguments](Rule::args).
///
/// Normalization:
/// - the path gets a leading `/`, spaces are removed and runs of `/` collapse;
/// - methods are upper-cased.
///
/// Path segments starting with `:` are placeholders, e.g. `/users/:id`.
///
/// # Examples
/// ```
/// use relay_web::{BoundArgs, Registry, Request, Response, Rule, Target};
///
/// let registry = Registry::new()
///     .with_action("Users", "show", |_: &mut Request, _: &BoundArgs| Response::new());
///
/// let rule = Rule::new(
///     "users // :id",
///     ["get", "Head"],
///     Vec::<String>::new(),
///     Target::new("Users", "show"),
///     &registry,
/// )
/// .unwrap();
///
/// assert_eq!(rule.path(), "/users/:id");
/// assert_eq!(rule.methods(), ["GET", "HEAD"]);
///
/// // Unknown identifiers are refused at once
/// let missing = Rule::new("/", ["GET"], ["auth"], Target::new("Users", "show"), &registry);
/// assert!(missing.is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    path: String,
    methods: Vec<String>,
    middlewares: Vec<String>,
    target: Target,
    args: BoundArgs,
}

impl Rule {
    /// Normalizes the input and checks every middleware identifier and the
    /// target against `resolver`.
    ///
    /// Fails with [`Error::InvalidArgument`] for an empty method list, a
    /// blank method, controller or action, or an identifier the resolver
    /// doesn't know.
    pub fn new<M, MS, W, WS>(
        path: &str,
        methods: M,
        middlewares: W,
        target: Target,
        resolver: &dyn Resolver,
    ) -> Result<Self, Error>
    where
        M: IntoIterator<Item = MS>,
        MS: AsRef<str>,
        W: IntoIterator<Item = WS>,
        WS: Into<String>,
    {
        let path = normalize_path(path);

        let methods = methods
            .into_iter()
            .map(|method| method.as_ref().trim().to_ascii_uppercase())
            .collect::<Vec<_>>();
        if methods.is_empty() || methods.iter().any(String::is_empty) {
            return Err(Error::invalid(format!("rule {path} needs non-empty methods")));
        }

        let middlewares = middlewares.into_iter().map(Into::into).collect::<Vec<_>>();
        for middleware in &middlewares {
            if resolver.processor(middleware).is_none() {
                return Err(Error::invalid(format!(
                    "middleware {middleware} does not exist"
                )));
            }
        }

        if target.controller.is_empty() || target.action.is_empty() {
            return Err(Error::invalid(format!("rule {path} has an incomplete target")));
        }
        if !resolver.has_controller(&target.controller) {
            return Err(Error::invalid(format!(
                "controller {} does not exist",
                target.controller
            )));
        }
        if resolver.action(&target).is_none() {
            return Err(Error::invalid(format!(
                "action {} does not exist in controller {}",
                target.action, target.controller
            )));
        }

        Ok(Self {
            path,
            methods,
            middlewares,
            target,
            args: BoundArgs::new(),
        })
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    /// Middleware identifiers, outermost first.
    #[inline]
    pub fn middlewares(&self) -> &[String] {
        &self.middlewares
    }

    #[inline]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    /// Arguments bound by the match this rule came from; empty on a
    /// registered rule.
    #[inline]
    pub const fn args(&self) -> &BoundArgs {
        &self.args
    }

    #[inline]
    pub(crate) fn with_args(&self, args: BoundArgs) -> Self {
        Self {
            args,
            ..self.clone()
        }
    }
}

fn normalize_path(raw: &str) -> String {
    let mut path = String::with_capacity(raw.len() + 1);
    path.push('/');

    for ch in raw.chars().filter(|&ch| ch != ' ') {
        if ch == '/' && path.ends_with('/') {
            continue;
        }
        path.push(ch);
    }

    path
}
