//! The engine builder and the frozen application it produces.
//!
//! Routes, groups and middleware are registered on an [`Engine`]. Calling
//! [`Engine::build`] consumes it and returns an [`Application`], which can
//! only serve: the route table and group list are shared read-only between
//! every in-flight request.
//!
//! # Examples
//!
//! ```rust,no_run
//! use sprig::{Engine, Logger, Recovery};
//!
//! let mut engine = Engine::new();
//! engine.middleware(Logger).middleware(Recovery);
//!
//! engine.get("/", |c| c.html(200, "<h1>Hello</h1>"))?;
//!
//! let mut v1 = engine.group("/v1");
//! v1.get("/hello/:name", |c| {
//!     let name = c.param("name").unwrap_or_default().to_string();
//!     c.string(200, format!("hello {name}"));
//! })?;
//!
//! engine.listen("127.0.0.1:9999")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::ServerConfig;
use crate::context::Context;
use crate::error::{RouteError, ServerError, ServerResult};
use crate::group::{GroupData, GroupId, RouterGroup};
use crate::handler::{Handler, HandlerFunc};
use crate::http::{Body, Method, Request, Response};
use crate::logging;
use crate::middleware::{panic_message, Logger, Recovery};
use crate::router::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, Take,
};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Registration-phase builder. Also acts as the root group (prefix `""`).
pub struct Engine {
    pub(crate) router: Router,
    pub(crate) groups: Vec<GroupData>,
    config: ServerConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            groups: vec![GroupData::root()],
            config: ServerConfig::default(),
        }
    }

    /// An engine with [`Logger`] and [`Recovery`] installed on the root group.
    pub fn default_stack() -> Self {
        let mut engine = Self::new();
        engine.middleware(Logger).middleware(Recovery);
        engine
    }

    pub fn config(&mut self, config: ServerConfig) -> &mut Self {
        self.config = config;
        self
    }

    fn root(&mut self) -> RouterGroup<'_> {
        RouterGroup::new(self, GroupId(0))
    }

    pub(crate) fn new_group(&mut self, parent: GroupId, prefix: &str) -> GroupId {
        let prefix = format!("{}{}", self.groups[parent.0].prefix, prefix);
        debug!(prefix = %prefix, parent = parent.0, "group created");
        self.groups.push(GroupData {
            prefix,
            middlewares: Vec::new(),
            parent: Some(parent),
        });
        GroupId(self.groups.len() - 1)
    }

    /// Creates a group under the root group.
    pub fn group(&mut self, prefix: &str) -> RouterGroup<'_> {
        let id = self.new_group(GroupId(0), prefix);
        RouterGroup::new(self, id)
    }

    /// Reopens a group created earlier.
    pub fn group_mut(&mut self, id: GroupId) -> Option<RouterGroup<'_>> {
        if id.0 < self.groups.len() {
            Some(RouterGroup::new(self, id))
        } else {
            None
        }
    }

    pub fn middleware(&mut self, handler: impl Handler) -> &mut Self {
        self.root().middleware(handler);
        self
    }

    pub fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
    ) -> Result<&mut Self, RouteError> {
        self.root().add_route(method, pattern, handler)?;
        Ok(self)
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::GET, pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::POST, pattern, handler)
    }

    pub fn put<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::PUT, pattern, handler)
    }

    pub fn patch<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::PATCH, pattern, handler)
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::DELETE, pattern, handler)
    }

    pub fn head<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::HEAD, pattern, handler)
    }

    pub fn options<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        self.add_route(Method::OPTIONS, pattern, handler)
    }

    pub fn routes(&self) -> Vec<(Method, &str)> {
        self.router.routes()
    }

    /// Freezes the registration and returns the serving half.
    pub fn build(self) -> Application {
        Application {
            inner: Arc::new(Shared {
                router: self.router,
                groups: self.groups,
                config: self.config,
            }),
        }
    }

    /// Shorthand for `build()` followed by [`Application::listen`].
    pub fn listen(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.build().listen(addr)
    }
}

struct Shared {
    router: Router,
    groups: Vec<GroupData>,
    config: ServerConfig,
}

#[derive(Clone)]
pub struct Application {
    inner: Arc<Shared>,
}

impl Application {
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn routes(&self) -> Vec<(Method, &str)> {
        self.inner.router.routes()
    }

    /// Middleware of every group whose prefix starts `path`, in group
    /// registration order.
    fn middlewares_for(&self, path: &str) -> Vec<HandlerFunc> {
        self.inner
            .groups
            .iter()
            .filter(|group| path.starts_with(&group.prefix))
            .flat_map(|group| group.middlewares.iter().cloned())
            .collect()
    }

    /// Runs one request through its handler chain and returns the response.
    ///
    /// Executes synchronously on the calling thread. A panic is only
    /// contained if a [`Recovery`] middleware is part of the chain.
    pub fn handle(&self, req: Request) -> Response {
        let handlers = self.middlewares_for(&req.path);
        let mut c = Context::new(req);
        c.handlers = handlers;
        self.inner.router.handle(&mut c);
        c.into_response()
    }

    /// Binds `addr` on a fresh tokio runtime and serves until the process
    /// exits.
    pub fn listen(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        logging::init(&self.inner.config.log_filter);
        let runtime = Runtime::new()?;
        runtime.block_on(async {
            let listener = TcpListener::bind(addr).await?;
            self.serve(listener).await?;
            Ok::<(), Box<dyn std::error::Error>>(())
        })
    }

    /// Accepts connections on `listener`, one request per connection.
    pub async fn serve(self, listener: TcpListener) -> ServerResult<()> {
        let limit = Arc::new(Semaphore::new(self.inner.config.max_connections));
        info!(
            address = %listener.local_addr()?,
            max_connections = self.inner.config.max_connections,
            "server listening"
        );
        for (method, pattern) in self.routes() {
            debug!(method = %method, pattern, "route");
        }

        loop {
            let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
                return Ok(());
            };

            match listener.accept().await {
                Ok((stream, peer)) => {
                    let app = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = app.handle_connection(stream).await {
                            warn!(peer = %peer, error = %e, "connection error");
                        }
                        drop(permit);
                    });
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }

    async fn handle_connection<S>(&self, mut stream: S) -> ServerResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let response = match self.read_request(&mut stream).await {
            Ok(Some(request)) => self.dispatch(request).await,
            Ok(None) => return Ok(()),
            Err(ServerError::Io(e)) => return Err(ServerError::Io(e)),
            Err(err) => {
                debug!(error = %err, "rejecting request");
                Response::error(err)
            }
        };

        stream.write_all(&response.to_bytes()).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }

    /// Runs the chain on a blocking worker so slow handlers do not stall the
    /// accept loop. A panic that escapes the chain becomes a 500.
    async fn dispatch(&self, request: Request) -> Response {
        let app = self.clone();
        let method = request.method;
        let path = request.path.clone();
        match tokio::task::spawn_blocking(move || app.handle(request)).await {
            Ok(response) => response,
            Err(join_err) => {
                let message = match join_err.try_into_panic() {
                    Ok(payload) => panic_message(payload.as_ref()),
                    Err(join_err) => join_err.to_string(),
                };
                error!(method = %method, path = %path, panic_message = %message, "request task failed");
                Response::error(ServerError::Panic(message))
            }
        }
    }

    async fn read_request<S>(&self, stream: &mut S) -> ServerResult<Option<Request>>
    where
        S: AsyncRead + Unpin,
    {
        let mut buf_reader = BufReader::new(stream);
        let (method, target, headers) = {
            let mut head = (&mut buf_reader).take(self.inner.config.max_head_bytes as u64);

            let mut request_line = String::new();
            read_head_line(&mut head, &mut request_line).await?;
            if request_line.trim().is_empty() {
                return Ok(None);
            }

            let mut parts = request_line.split_whitespace();
            let method: Method = parts
                .next()
                .ok_or_else(|| ServerError::BadRequest("missing method".to_string()))?
                .parse()?;
            let target = parts
                .next()
                .ok_or_else(|| ServerError::BadRequest("missing request target".to_string()))?
                .to_string();

            let mut headers = HashMap::new();
            loop {
                let mut line = String::new();
                if read_head_line(&mut head, &mut line).await? == 0 {
                    break;
                }
                let line = line.trim();
                if line.is_empty() {
                    break;
                }
                if let Some((key, value)) = line.split_once(':') {
                    headers.insert(key.trim().to_lowercase(), value.trim().to_string());
                }
            }
            (method, target, headers)
        };

        let mut data = Vec::new();
        if let Some(content_length) = headers.get("content-length") {
            let length: usize = content_length
                .parse()
                .map_err(|_| ServerError::BadRequest(format!("invalid content-length {content_length:?}")))?;
            if length > self.inner.config.max_body_bytes {
                return Err(ServerError::PayloadTooLarge(length));
            }
            data = vec![0; length];
            buf_reader.read_exact(&mut data).await?;
        }

        let mut request = Request::new(method, &target);
        request.body = Body {
            content_type: headers.get("content-type").cloned().unwrap_or_default(),
            data,
        };
        request.headers = headers;
        Ok(Some(request))
    }
}

/// Reads one line of the request head. A line cut off by the head limit
/// means the client sent more than the server accepts.
async fn read_head_line<R>(head: &mut Take<R>, line: &mut String) -> ServerResult<usize>
where
    R: AsyncBufRead + Unpin,
{
    let n = head.read_line(line).await?;
    if !line.ends_with('\n') && head.limit() == 0 {
        return Err(ServerError::BadRequest("request head too large".to_string()));
    }
    Ok(n)
}
