//! Per-request state: the parsed request, bound route parameters, the
//! resolved handler chain with its cursor, and the response being written.

use crate::handler::HandlerFunc;
use crate::http::{Method, Request, Response};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, warn};

pub struct Context {
    req: Request,
    pub(crate) params: HashMap<String, String>,
    pub(crate) handlers: Vec<HandlerFunc>,
    index: isize,
    response: Response,
    committed: bool,
}

impl Context {
    pub fn new(req: Request) -> Context {
        Context {
            req,
            params: HashMap::new(),
            handlers: Vec::new(),
            index: -1,
            response: Response::new(200),
            committed: false,
        }
    }

    pub fn request(&self) -> &Request {
        &self.req
    }

    pub fn path(&self) -> &str {
        &self.req.path
    }

    pub fn method(&self) -> Method {
        self.req.method
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.req.query.get(key).map(String::as_str)
    }

    pub fn post_form(&self, key: &str) -> Option<String> {
        self.req.body.form_fields().remove(key)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.req.get_header(name)
    }

    /// Position of the handler currently running; `-1` before the chain
    /// starts, at least the chain length once it has finished or failed.
    pub fn index(&self) -> isize {
        self.index
    }

    /// Runs the next handler in the chain.
    ///
    /// Called by a middleware to hand control to the rest of the chain; the
    /// call returns once that handler (and whatever it chains into) is done,
    /// so code after `next()` runs on the way back out. A handler that does
    /// not call `next()` ends the chain at that point.
    pub fn next(&mut self) {
        self.index += 1;
        let current = usize::try_from(self.index)
            .ok()
            .and_then(|index| self.handlers.get(index))
            .cloned();
        if let Some(handler) = current {
            handler.call(self);
        }
    }

    /// Ends the chain and writes `{"message": message}` with `code`.
    ///
    /// Middleware already inside a `next()` call still run their remaining
    /// code when it returns; only handlers not yet started are skipped.
    pub fn fail(&mut self, code: u16, message: &str) {
        self.index = self.handlers.len() as isize;
        self.json(code, &serde_json::json!({ "message": message }));
    }

    pub fn status_code(&self) -> u16 {
        self.response.status
    }

    pub fn status(&mut self, code: u16) {
        if self.committed {
            warn!(
                path = %self.req.path,
                current = self.response.status,
                ignored = code,
                "status change after the body was written"
            );
            return;
        }
        self.response.status = code;
    }

    pub fn set_header(&mut self, key: &str, value: &str) {
        if self.committed {
            warn!(path = %self.req.path, header = key, "header set after the body was written");
            return;
        }
        self.response.header(key, value);
    }

    /// Appends to the response body. The first write fixes the status and
    /// headers.
    pub fn write(&mut self, bytes: &[u8]) {
        self.committed = true;
        self.response.body.extend_from_slice(bytes);
    }

    pub fn string<T: AsRef<str>>(&mut self, code: u16, text: T) {
        self.set_header("Content-Type", "text/plain");
        self.status(code);
        self.write(text.as_ref().as_bytes());
    }

    pub fn json<T: Serialize>(&mut self, code: u16, value: &T) {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.set_header("Content-Type", "application/json");
                self.status(code);
                self.write(&body);
            }
            Err(err) => {
                error!(path = %self.req.path, error = %err, "failed to encode JSON response");
                self.set_header("Content-Type", "text/plain");
                self.status(500);
                self.write(err.to_string().as_bytes());
            }
        }
    }

    pub fn data(&mut self, code: u16, bytes: &[u8]) {
        self.status(code);
        self.write(bytes);
    }

    pub fn html<T: AsRef<str>>(&mut self, code: u16, html: T) {
        self.set_header("Content-Type", "text/html");
        self.status(code);
        self.write(html.as_ref().as_bytes());
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}
