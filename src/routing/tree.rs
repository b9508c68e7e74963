use crate::routing::rule::Rule;
use std::{collections::HashMap, sync::Arc};

/// One level of a route index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Segment {
    Literal(String),
    /// Stands for any single segment; registered in place of `:name`.
    Wildcard,
}

impl Segment {
    // `:id` -> Wildcard, anything else is literal.
    #[inline]
    pub(crate) fn from_pattern(segment: &str) -> Self {
        match segment.starts_with(':') {
            true => Segment::Wildcard,
            false => Segment::Literal(segment.to_string()),
        }
    }
}

/// Segment trie. The first level is keyed by method, deeper ones by path
/// segment.
#[derive(Debug, Default)]
pub(crate) struct RouteTree {
    literals: HashMap<String, RouteTree>,
    wildcard: Option<Box<RouteTree>>,
    rule: Option<Arc<Rule>>,
}

impl RouteTree {
    #[inline]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `rule` at the node addressed by `index`, creating missing
    /// nodes. Returns the rule previously stored there.
    pub(crate) fn insert(&mut self, index: &[Segment], rule: Arc<Rule>) -> Option<Arc<Rule>> {
        let Some((first, rest)) = index.split_first() else {
            return self.rule.replace(rule);
        };

        let child = match first {
            Segment::Literal(name) => self.literals.entry(name.clone()).or_default(),
            Segment::Wildcard => self.wildcard.get_or_insert_with(Default::default),
        };
        child.insert(rest, rule)
    }

    /// Walks literal request segments.
    ///
    /// At every level an exact child is taken when present, otherwise the
    /// wildcard child. There is no backtracking: once the exact child is
    /// chosen, a dead end below it is a miss even if the wildcard branch
    /// would have matched.
    pub(crate) fn get(&self, index: &[&str]) -> Option<&Arc<Rule>> {
        let Some((first, rest)) = index.split_first() else {
            return self.rule.as_ref();
        };

        match (self.literals.get(*first), &self.wildcard) {
            (Some(child), _) => child.get(rest),
            (None, Some(child)) => child.get(rest),
            (None, None) => None,
        }
    }
}
