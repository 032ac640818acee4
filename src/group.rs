//! Route groups: a path prefix plus the middleware attached to it.
//!
//! Groups live in the engine's flat, registration-ordered list. At dispatch
//! time every group whose prefix is a string prefix of the request path
//! contributes its middleware, in that order. Whether a group is an ancestor
//! of the matched route plays no part, so `/v1` and `/v1beta` groups both
//! apply to `/v1beta/x`.

use crate::app::Engine;
use crate::context::Context;
use crate::error::RouteError;
use crate::handler::{Handler, HandlerFunc};
use crate::http::Method;
use std::sync::Arc;

/// Stable handle to a group, usable with [`Engine::group_mut`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub(crate) usize);

pub(crate) struct GroupData {
    pub(crate) prefix: String,
    pub(crate) middlewares: Vec<HandlerFunc>,
    pub(crate) parent: Option<GroupId>,
}

impl GroupData {
    pub(crate) fn root() -> GroupData {
        GroupData {
            prefix: String::new(),
            middlewares: Vec::new(),
            parent: None,
        }
    }
}

/// Registration handle for one group. Borrows the engine mutably, so a
/// nested group must be finished with before its parent is used again.
pub struct RouterGroup<'e> {
    engine: &'e mut Engine,
    id: GroupId,
}

impl<'e> RouterGroup<'e> {
    pub(crate) fn new(engine: &'e mut Engine, id: GroupId) -> Self {
        Self { engine, id }
    }

    fn data(&self) -> &GroupData {
        &self.engine.groups[self.id.0]
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn prefix(&self) -> &str {
        &self.data().prefix
    }

    pub fn parent(&self) -> Option<GroupId> {
        self.data().parent
    }

    /// Creates a child group whose prefix is this group's prefix followed
    /// by `prefix`.
    pub fn group(&mut self, prefix: &str) -> RouterGroup<'_> {
        let id = self.engine.new_group(self.id, prefix);
        RouterGroup::new(&mut *self.engine, id)
    }

    /// Appends to this group's middleware. Groups created earlier are not
    /// affected; each group's list is read as-is at dispatch time.
    pub fn middleware(&mut self, handler: impl Handler) -> &mut Self {
        self.engine.groups[self.id.0]
            .middlewares
            .push(Arc::new(handler));
        self
    }

    pub fn add_route(
        &mut self,
        method: Method,
        comp: &str,
        handler: impl Handler,
    ) -> Result<&mut Self, RouteError> {
        let pattern = format!("{}{}", self.prefix(), comp);
        self.engine
            .router
            .add_route(method, &pattern, Arc::new(handler))?;
        Ok(self)
    }

    pub fn get<F>(&mut self, comp: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::GET, comp, handler)
    }

    pub fn post<F>(&mut self, comp: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::POST, comp, handler)
    }

    pub fn put<F>(&mut self, comp: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::PUT, comp, handler)
    }

    pub fn patch<F>(&mut self, comp: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::PATCH, comp, handler)
    }

    pub fn delete<F>(&mut self, comp: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::DELETE, comp, handler)
    }

    pub fn head<F>(&mut self, comp: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::HEAD, comp, handler)
    }

    pub fn options<F>(&mut self, comp: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::OPTIONS, comp, handler)
    }
}
