use crate::context::Context;
use std::sync::Arc;

/// A step in a request's handler chain.
///
/// Middleware and route handlers share this contract: they receive the
/// request [`Context`] and act on it only through its methods. A middleware
/// calls [`Context::next`] to run the rest of the chain and regains control
/// once that call returns.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, c: &mut Context);
}

impl<F> Handler for F
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    fn call(&self, c: &mut Context) {
        (self)(c)
    }
}

/// Shared handle to a registered handler; chains hold clones of these.
pub type HandlerFunc = Arc<dyn Handler>;
