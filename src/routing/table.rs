//! Declarative route table.
//!
//! ```toml
//! [[routes]]
//! path = "/health"
//! methods = ["GET"]
//! controller = "System"
//! action = "health"
//!
//! [[groups]]
//! prefix = "/users"
//! middlewares = ["auth"]
//! controller = "Users"
//!
//!   [[groups.routes]]
//!   path = ":id"
//!   methods = ["GET"]
//!   action = "show"
//!
//!   [[groups.routes]]
//!   path = ":id"
//!   methods = ["PUT", "PATCH"]
//!   middlewares = ["csrf"]
//!   action = "update"
//! ```
//!
//! A grouped route is merged with its group: the paths are joined, methods
//! are combined, group middlewares run before the route's own, and the
//! route's controller (if any) overrides the group's.

use crate::{
    errors::Error,
    pipeline::registry::Resolver,
    routing::{
        router::Router,
        rule::{Rule, Target},
    },
};
use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RouteTable {
    pub routes: Vec<RouteEntry>,
    pub groups: Vec<GroupEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RouteEntry {
    pub path: String,
    pub methods: Vec<String>,
    pub middlewares: Vec<String>,
    pub controller: Option<String>,
    pub action: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroupEntry {
    pub prefix: String,
    pub methods: Vec<String>,
    pub middlewares: Vec<String>,
    pub controller: Option<String>,
    pub routes: Vec<RouteEntry>,
}

impl RouteTable {
    #[inline]
    pub fn from_toml(source: &str) -> Result<Self, Error> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let source = fs::read_to_string(path)?;
        Self::from_toml(&source)
    }

    /// Builds and validates every rule of the table.
    pub fn rules(&self, resolver: &dyn Resolver) -> Result<Vec<Rule>, Error> {
        let top = self.routes.iter().map(|route| {
            let controller = route.controller.as_deref().ok_or_else(|| {
                Error::invalid(format!("route {:?} names no controller", route.path))
            })?;

            Rule::new(
                &route.path,
                &route.methods,
                route.middlewares.iter().cloned(),
                Target::new(controller, route.action.as_str()),
                resolver,
            )
        });

        let grouped = self.groups.iter().flat_map(move |group| {
            group.routes.iter().map(move |route| group.merge(route, resolver))
        });

        top.chain(grouped).collect()
    }

    /// Registers every rule of the table, or none if any rule is invalid.
    /// Returns the number of registered rules.
    pub fn register(&self, router: &mut Router, resolver: &dyn Resolver) -> Result<usize, Error> {
        let rules = self.rules(resolver)?;
        let count = rules.len();

        for rule in rules {
            router.register(rule);
        }
        Ok(count)
    }
}

impl GroupEntry {
    fn merge(&self, route: &RouteEntry, resolver: &dyn Resolver) -> Result<Rule, Error> {
        let path = format!("{}/{}", self.prefix, route.path);

        let mut methods = self.methods.clone();
        for method in &route.methods {
            if !methods.iter().any(|known| known.eq_ignore_ascii_case(method)) {
                methods.push(method.clone());
            }
        }

        let middlewares = self.middlewares.iter().chain(&route.middlewares).cloned();

        let controller = route
            .controller
            .as_deref()
            .or(self.controller.as_deref())
            .ok_or_else(|| Error::invalid(format!("route {path:?} names no controller")))?;

        Rule::new(
            &path,
            &methods,
            middlewares,
            Target::new(controller, route.action.as_str()),
            resolver,
        )
    }
}
