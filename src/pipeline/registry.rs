use crate::{
    pipeline::processor::{Action, Processor},
    routing::rule::Target,
};
use std::{collections::HashMap, fmt, sync::Arc};

/// Turns identifiers into callable instances.
///
/// Consulted once per rule at registration, to refuse unknown identifiers,
/// and again per request by the [`Handler`](crate::Handler).
pub trait Resolver: Send + Sync {
    fn processor(&self, id: &str) -> Option<Arc<dyn Processor>>;

    fn action(&self, target: &Target) -> Option<Arc<dyn Action>>;

    /// Whether any action is known under `controller`.
    #[inline]
    fn has_controller(&self, controller: &str) -> bool {
        let _ = controller;
        true
    }
}

/// Table-backed [`Resolver`].
///
/// # Examples
/// ```
/// use relay_web::{BoundArgs, Registry, Request, Resolver, Response, Target};
///
/// let registry = Registry::new().with_action("Users", "show", |_: &mut Request, args: &BoundArgs| {
///     let mut resp = Response::new();
///     resp.body(format!("user {}", args["id"]));
///     resp
/// });
///
/// assert!(registry.action(&Target::new("Users", "show")).is_some());
/// assert!(registry.action(&Target::new("Users", "edit")).is_none());
/// ```
#[derive(Default, Clone)]
pub struct Registry {
    processors: HashMap<String, Arc<dyn Processor>>,
    controllers: HashMap<String, HashMap<String, Arc<dyn Action>>>,
}

impl Registry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a processor under `id`, replacing any previous one.
    #[inline]
    pub fn with_processor<P: Processor + 'static>(mut self, id: &str, processor: P) -> Self {
        self.insert_processor(id, Arc::new(processor));
        self
    }

    /// Adds an action of `controller`, replacing any previous one.
    #[inline]
    pub fn with_action<A: Action + 'static>(
        mut self,
        controller: &str,
        action: &str,
        call: A,
    ) -> Self {
        self.insert_action(controller, action, Arc::new(call));
        self
    }

    #[inline]
    pub fn insert_processor(&mut self, id: &str, processor: Arc<dyn Processor>) {
        self.processors.insert(id.to_string(), processor);
    }

    #[inline]
    pub fn insert_action(&mut self, controller: &str, action: &str, call: Arc<dyn Action>) {
        self.controllers
            .entry(controller.to_string())
            .or_default()
            .insert(action.to_string(), call);
    }
}

impl Resolver for Registry {
    #[inline]
    fn processor(&self, id: &str) -> Option<Arc<dyn Processor>> {
        self.processors.get(id).cloned()
    }

    #[inline]
    fn action(&self, target: &Target) -> Option<Arc<dyn Action>> {
        self.controllers
            .get(&target.controller)?
            .get(&target.action)
            .cloned()
    }

    #[inline]
    fn has_controller(&self, controller: &str) -> bool {
        self.controllers.contains_key(controller)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut processors: Vec<_> = self.processors.keys().collect();
        processors.sort();

        let mut actions: Vec<_> = self
            .controllers
            .iter()
            .flat_map(|(controller, actions)| {
                actions.keys().map(move |action| format!("{controller}::{action}"))
            })
            .collect();
        actions.sort();

        f.debug_struct("Registry")
            .field("processors", &processors)
            .field("actions", &actions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{registry, Noop};

    #[test]
    fn lookups() {
        let registry = registry();

        #[rustfmt::skip]
        let cases = [
            (Target::new("Users", "show"), true),
            (Target::new("Users", "list"), true),
            (Target::new("Users", "nope"), false),
            (Target::new("Posts", "show"), false),
        ];

        for (target, found) in cases {
            assert_eq!(registry.action(&target).is_some(), found, "{target}");
        }

        assert!(registry.has_controller("Users"));
        assert!(!registry.has_controller("Posts"));
        assert!(registry.processor("auth").is_some());
        assert!(registry.processor("missing").is_none());
    }

    #[test]
    fn builders_replace_entries() {
        let first = |_: &mut crate::Request, _: &crate::BoundArgs| crate::Response::new();
        let second = |_: &mut crate::Request, _: &crate::BoundArgs| {
            let mut resp = crate::Response::new();
            resp.body("second");
            resp
        };

        let registry = Registry::new()
            .with_processor("auth", Noop)
            .with_processor("auth", Noop)
            .with_action("Users", "show", first)
            .with_action("Users", "show", second);

        assert!(registry.processor("auth").is_some());
        assert_eq!(registry.processors.len(), 1);

        let action = registry.action(&Target::new("Users", "show")).unwrap();
        let resp = action.call(&mut crate::Request::new("GET", "/"), &crate::BoundArgs::new());
        assert_eq!(resp.content(), b"second");
    }

    #[test]
    fn debug_lists_identifiers() {
        let registry = Registry::new()
            .with_processor("b", Noop)
            .with_processor("a", Noop)
            .with_action("X", "y", |_: &mut crate::Request, _: &crate::BoundArgs| {
                crate::Response::new()
            });

        assert_eq!(
            format!("{registry:?}"),
            r#"Registry { processors: ["a", "b"], actions: ["X::y"] }"#
        );
    }
}
