use crate::context::Context;
use crate::handler::Handler;
use std::time::Instant;
use tracing::info;

/// Logs status, method, path and latency once the rest of the chain has run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

impl Handler for Logger {
    fn call(&self, c: &mut Context) {
        let start = Instant::now();
        c.next();
        info!(
            status = c.status_code(),
            method = %c.method(),
            path = %c.path(),
            elapsed = ?start.elapsed(),
            "request completed"
        );
    }
}
