mod trie;

use crate::context::Context;
use crate::error::RouteError;
use crate::handler::HandlerFunc;
use crate::http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use trie::Node;

/// Splits a pattern or request path into its non-empty segments, stopping
/// right after the first `*` segment.
pub fn parse_pattern(pattern: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    for item in pattern.split('/').filter(|s| !s.is_empty()) {
        parts.push(item);
        if item.starts_with('*') {
            break;
        }
    }
    parts
}

/// Registration-time checks that [`parse_pattern`] does not perform.
pub fn validate_pattern(pattern: &str) -> Result<(), RouteError> {
    let mut segments = pattern.split('/').filter(|s| !s.is_empty());
    while let Some(segment) = segments.next() {
        if segment == ":" || segment == "*" {
            return Err(RouteError::EmptyWildcardName {
                pattern: pattern.to_string(),
                segment: segment.to_string(),
            });
        }
        if segment.starts_with('*') && segments.next().is_some() {
            return Err(RouteError::CatchAllNotLast {
                pattern: pattern.to_string(),
                segment: segment.to_string(),
            });
        }
    }
    Ok(())
}

/// A resolved route: the registered pattern and the values bound to its
/// wildcard segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'r> {
    pub pattern: &'r str,
    pub params: HashMap<String, String>,
}

#[derive(Default)]
pub struct Router {
    roots: HashMap<Method, Node>,
    handlers: HashMap<String, HandlerFunc>,
}

fn handler_key(method: Method, pattern: &str) -> String {
    format!("{}-{}", method, pattern)
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` and `pattern`. Registering the same
    /// pair again replaces the earlier handler.
    pub fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        handler: HandlerFunc,
    ) -> Result<(), RouteError> {
        validate_pattern(pattern)?;
        let parts = parse_pattern(pattern);

        self.roots
            .entry(method)
            .or_default()
            .insert(pattern, &parts, 0);
        let replaced = self
            .handlers
            .insert(handler_key(method, pattern), handler)
            .is_some();

        debug!(method = %method, pattern, replaced, "route registered");
        Ok(())
    }

    pub fn resolve(&self, method: Method, path: &str) -> Result<RouteMatch<'_>, RouteError> {
        let not_found = || RouteError::NotFound {
            method,
            path: path.to_string(),
        };

        let search_parts = parse_pattern(path);
        let root = self.roots.get(&method).ok_or_else(not_found)?;
        let pattern = root
            .search(&search_parts, 0)
            .and_then(|node| node.pattern())
            .ok_or_else(not_found)?;

        let mut params = HashMap::new();
        for (index, part) in parse_pattern(pattern).into_iter().enumerate() {
            if let Some(name) = part.strip_prefix(':') {
                params.insert(name.to_string(), search_parts[index].to_string());
            }
            if let Some(name) = part.strip_prefix('*') {
                params.insert(name.to_string(), search_parts[index..].join("/"));
                break;
            }
        }

        Ok(RouteMatch { pattern, params })
    }

    /// Appends the terminal handler for the context's request (or the
    /// not-found handler) to its chain and starts the chain.
    pub(crate) fn handle(&self, c: &mut Context) {
        let handler = match self.resolve(c.method(), c.path()) {
            Ok(found) => {
                let handler = self.handlers.get(&handler_key(c.method(), found.pattern));
                c.params = found.params;
                handler.cloned()
            }
            Err(err) => {
                debug!(error = %err, "no matching route");
                None
            }
        };

        let handler = handler.unwrap_or_else(|| Arc::new(not_found) as HandlerFunc);
        c.handlers.push(handler);
        c.next();
    }

    /// Registered `(method, pattern)` pairs, ordered by method then by trie
    /// position.
    pub fn routes(&self) -> Vec<(Method, &str)> {
        let mut methods: Vec<&Method> = self.roots.keys().collect();
        methods.sort();

        let mut routes = Vec::new();
        for method in methods {
            let mut nodes = Vec::new();
            self.roots[method].travel(&mut nodes);
            routes.extend(nodes.into_iter().filter_map(|n| n.pattern()).map(|p| (*method, p)));
        }
        routes
    }
}

fn not_found(c: &mut Context) {
    let body = format!("404 NOT FOUND: {}\n", c.path());
    c.string(404, body);
}
