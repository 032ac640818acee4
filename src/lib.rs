//! # Sprig
//!
//! A small HTTP framework built around a segment trie router, nested route
//! groups and cooperative middleware chains.
//!
//! ## Features
//!
//! - Per-method trie routing with `:name` and `*name` segments
//! - Exact segments win over parameters, parameters over catch-alls
//! - Route groups with prefix-scoped middleware
//! - Middleware that wraps the rest of the chain through `Context::next`
//! - Panic recovery and request logging middleware
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sprig::Engine;
//!
//! let mut engine = Engine::default_stack();
//!
//! engine.get("/p/:lang/doc", |c| {
//!     let lang = c.param("lang").unwrap_or_default().to_string();
//!     c.json(200, &sprig::json!({ "lang": lang }));
//! })?;
//! engine.get("/assets/*filepath", |c| {
//!     let file = c.param("filepath").unwrap_or_default().to_string();
//!     c.string(200, file);
//! })?;
//!
//! engine.listen("127.0.0.1:9999")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Middleware Usage
//!
//! ```rust
//! use sprig::{Context, Engine, Method, Request};
//!
//! let mut engine = Engine::new();
//! engine
//!     .group("/admin")
//!     .middleware(|c: &mut Context| {
//!         if c.header("authorization").is_some() {
//!             c.next();
//!         } else {
//!             c.fail(401, "unauthorized");
//!         }
//!     })
//!     .get("/stats", |c| c.string(200, "ok"))
//!     .unwrap();
//!
//! let app = engine.build();
//! let response = app.handle(Request::new(Method::GET, "/admin/stats"));
//! assert_eq!(response.status, 401);
//! ```

pub mod app;
pub mod config;
pub mod context;
pub mod error;
pub mod group;
pub mod handler;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod router;
pub extern crate serde_json;

pub use serde_json::{json, Value};

pub use app::{Application, Engine};
pub use config::ServerConfig;
pub use context::Context;
pub use error::{RouteError, ServerError, ServerResult};
pub use group::{GroupId, RouterGroup};
pub use handler::{Handler, HandlerFunc};
pub use http::{Body, Method, Request, Response};
pub use middleware::{Logger, Recovery};
pub use router::{RouteMatch, Router};
