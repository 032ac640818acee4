//! End-to-end dispatch through `Application::handle`.

use sprig::{Context, Engine, Logger, Method, Recovery, Request};
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

type Trace = Arc<Mutex<Vec<String>>>;

/// Collects formatted log lines from a scoped subscriber.
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    fn output(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn tracer(trace: &Trace, name: &'static str) -> impl Fn(&mut Context) + Send + Sync + 'static {
    let trace = trace.clone();
    move |c: &mut Context| {
        trace.lock().unwrap().push(format!("{name} before"));
        c.next();
        trace.lock().unwrap().push(format!("{name} after"));
    }
}

fn get(engine: Engine, path: &str) -> sprig::Response {
    engine.build().handle(Request::new(Method::GET, path))
}

#[test]
fn test_params_reach_the_handler() {
    let mut engine = Engine::new();
    engine
        .get("/p/:lang/doc", |c| {
            let lang = c.param("lang").unwrap_or_default().to_string();
            c.string(200, format!("lang={lang}"));
        })
        .unwrap()
        .get("/static/*filepath", |c| {
            let path = c.param("filepath").unwrap_or_default().to_string();
            c.string(200, path);
        })
        .unwrap();
    let app = engine.build();

    let response = app.handle(Request::new(Method::GET, "/p/go/doc"));
    assert_eq!(response.body_string(), "lang=go");

    let response = app.handle(Request::new(Method::GET, "/static/css/a.css"));
    assert_eq!(response.body_string(), "css/a.css");
}

#[test]
fn test_percent_encoded_paths_are_decoded_before_routing() {
    let mut engine = Engine::new();
    engine
        .get("/p/:lang/doc", |c| {
            let lang = c.param("lang").unwrap_or_default().to_string();
            c.string(200, lang);
        })
        .unwrap()
        .get("/a b", |c| c.string(200, "spaced"))
        .unwrap();
    let app = engine.build();

    let response = app.handle(Request::new(Method::GET, "/p/hello%20world/doc"));
    assert_eq!(response.body_string(), "hello world");

    let response = app.handle(Request::new(Method::GET, "/a%20b"));
    assert_eq!(response.status, 200);
    assert_eq!(response.body_string(), "spaced");
}

#[test]
fn test_not_found_names_the_path() {
    let mut engine = Engine::new();
    engine.post("/login", |c| c.string(200, "welcome")).unwrap();
    let app = engine.build();

    let response = app.handle(Request::new(Method::GET, "/login"));
    assert_eq!(response.status, 404);
    assert_eq!(response.get_header("Content-Type"), Some("text/plain"));
    assert!(response.body_string().contains("/login"));

    let response = app.handle(Request::new(Method::POST, "/nowhere?x=1"));
    assert_eq!(response.status, 404);
    assert_eq!(response.body_string(), "404 NOT FOUND: /nowhere\n");
}

#[test]
fn test_not_found_still_runs_middleware() {
    let trace = Trace::default();
    let mut engine = Engine::new();
    engine.middleware(tracer(&trace, "root"));

    let response = get(engine, "/missing");
    assert_eq!(response.status, 404);
    assert_eq!(*trace.lock().unwrap(), vec!["root before", "root after"]);
}

#[test]
fn test_middleware_without_next_stops_the_chain() {
    let trace = Trace::default();
    let mut engine = Engine::new();

    let a = trace.clone();
    engine.middleware(move |c: &mut Context| {
        a.lock().unwrap().push("A".to_string());
        c.string(403, "blocked");
    });
    engine.middleware(tracer(&trace, "B"));
    let terminal = trace.clone();
    engine
        .get("/hello", move |c| {
            terminal.lock().unwrap().push("terminal".to_string());
            c.string(200, "hello");
        })
        .unwrap();

    let response = get(engine, "/hello");
    assert_eq!(*trace.lock().unwrap(), vec!["A"]);
    assert_eq!(response.status, 403);
    assert_eq!(response.body_string(), "blocked");
}

#[test]
fn test_fail_in_terminal_handler_is_seen_by_logger_post_processing() {
    let logged = Arc::new(Mutex::new(None));
    let mut engine = Engine::new();

    let seen = logged.clone();
    engine.middleware(move |c: &mut Context| {
        c.next();
        *seen.lock().unwrap() = Some(c.status_code());
    });
    engine
        .get("/fail", |c| c.fail(503, "maintenance"))
        .unwrap();

    let response = get(engine, "/fail");
    assert_eq!(*logged.lock().unwrap(), Some(503));
    assert_eq!(response.status, 503);
    assert_eq!(response.get_header("Content-Type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["message"], "maintenance");
}

#[test]
fn test_logger_records_status_set_by_fail() {
    let mut engine = Engine::new();
    engine.middleware(Logger);
    engine
        .get("/fail", |c| c.fail(503, "maintenance"))
        .unwrap();
    let app = engine.build();

    let logs = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let response = tracing::subscriber::with_default(subscriber, || {
        app.handle(Request::new(Method::GET, "/fail"))
    });

    assert_eq!(response.status, 503);
    let output = logs.output();
    assert!(output.contains("request completed"));
    assert!(output.contains("status=503"));
    assert!(output.contains("method=GET"));
    assert!(output.contains("path=/fail"));
}

#[test]
fn test_fail_in_middleware_skips_the_terminal_handler() {
    let trace = Trace::default();
    let mut engine = Engine::new();
    engine.middleware(tracer(&trace, "outer"));
    engine.middleware(|c: &mut Context| c.fail(401, "no token"));
    let terminal = trace.clone();
    engine
        .get("/secret", move |c| {
            terminal.lock().unwrap().push("terminal".to_string());
            c.string(200, "secret");
        })
        .unwrap();

    let response = get(engine, "/secret");
    assert_eq!(response.status, 401);
    assert_eq!(*trace.lock().unwrap(), vec!["outer before", "outer after"]);
}

#[test]
fn test_panic_is_recovered_and_serving_continues() {
    let mut engine = Engine::new();
    engine.middleware(Recovery);
    engine
        .get("/panic", |c| {
            let names = vec!["geektutu"];
            let name = names[names.len()];
            c.string(200, name);
        })
        .unwrap()
        .get("/ok", |c| c.string(200, "still here"))
        .unwrap();
    let app = engine.build();

    let response = app.handle(Request::new(Method::GET, "/panic"));
    assert_eq!(response.status, 500);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["message"], "Internal Server Error");

    let response = app.handle(Request::new(Method::GET, "/ok"));
    assert_eq!(response.status, 200);
    assert_eq!(response.body_string(), "still here");
}

#[test]
fn test_logger_sees_recovered_status() {
    let mut engine = Engine::new();
    let status = Arc::new(Mutex::new(0));
    let seen = status.clone();
    engine.middleware(move |c: &mut Context| {
        c.next();
        *seen.lock().unwrap() = c.status_code();
    });
    engine.middleware(Logger).middleware(Recovery);
    engine.get("/boom", |_c| panic!("boom")).unwrap();

    let response = get(engine, "/boom");
    assert_eq!(response.status, 500);
    assert_eq!(*status.lock().unwrap(), 500);
}

#[test]
fn test_nested_groups_contribute_middleware_in_registration_order() {
    let trace = Trace::default();
    let mut engine = Engine::new();
    engine.middleware(tracer(&trace, "root"));
    {
        let mut v1 = engine.group("/v1");
        v1.middleware(tracer(&trace, "v1"));
        let mut v2 = v1.group("/v2");
        v2.middleware(tracer(&trace, "v2"));
        let terminal = trace.clone();
        v2.get("/x", move |c| {
            terminal.lock().unwrap().push("terminal".to_string());
            c.string(200, "x");
        })
        .unwrap();
    }

    let response = get(engine, "/v1/v2/x");
    assert_eq!(response.body_string(), "x");
    assert_eq!(
        *trace.lock().unwrap(),
        vec![
            "root before",
            "v1 before",
            "v2 before",
            "terminal",
            "v2 after",
            "v1 after",
            "root after",
        ]
    );
}

#[test]
fn test_middleware_added_after_child_group_still_applies() {
    let trace = Trace::default();
    let mut engine = Engine::new();
    let parent = engine.group("/api").id();
    engine
        .group_mut(parent)
        .unwrap()
        .group("/users")
        .get("/:id", |c| c.string(200, "user"))
        .unwrap();
    engine
        .group_mut(parent)
        .unwrap()
        .middleware(tracer(&trace, "api"));

    let response = get(engine, "/api/users/1");
    assert_eq!(response.status, 200);
    assert_eq!(*trace.lock().unwrap(), vec!["api before", "api after"]);
}

#[test]
fn test_sibling_group_middleware_does_not_leak() {
    let trace = Trace::default();
    let mut engine = Engine::new();
    engine
        .group("/admin")
        .middleware(tracer(&trace, "admin"))
        .get("/x", |c| c.string(200, "admin"))
        .unwrap();
    engine
        .group("/public")
        .get("/x", |c| c.string(200, "public"))
        .unwrap();

    let response = get(engine, "/public/x");
    assert_eq!(response.body_string(), "public");
    assert!(trace.lock().unwrap().is_empty());
}

#[test]
fn test_query_and_form_values() {
    let mut engine = Engine::new();
    engine
        .post("/login", |c| {
            let user = c.post_form("username").unwrap_or_default();
            let next = c.query("next").unwrap_or("/").to_string();
            c.json(200, &sprig::json!({ "username": user, "next": next }));
        })
        .unwrap();

    let request = Request::new(Method::POST, "/login?next=%2Fdash")
        .with_body(sprig::Body::form("username=geektutu&password=1234"));
    let response = engine.build().handle(request);

    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["username"], "geektutu");
    assert_eq!(body["next"], "/dash");
}
