//! Dispatch behaviour of a built router.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use http::header::LOCATION;
use http::{Method, StatusCode};
use metrics_exporter_prometheus::PrometheusBuilder;
use portcullis::prelude::*;
use portcullis_core::{fixtures, ConnectionState};
use portcullis_middleware::stages::REQUEST_ID_HEADER;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

fn ok(ctx: &mut RequestContext) -> Outcome {
    ctx.text(StatusCode::OK, "ok")
}

fn build(register: impl FnOnce(&mut Route)) -> Router {
    let mut route = Route::new();
    register(&mut route);
    route.build(Arc::new(Settings::default())).unwrap()
}

fn render_with<F: FnOnce()>(f: F) -> String {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    metrics::with_local_recorder(&recorder, f);
    handle.render()
}

#[test]
fn global_middleware_runs_before_not_found() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);

    let router = build(|r| {
        r.use_middleware(move |_: &mut RequestContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            Outcome::Continue
        });
        r.get("/", chain![ok]);
        r.not_found(chain![|ctx: &mut RequestContext| ctx.text(StatusCode::NOT_FOUND, "nothing here")]);
    });

    assert_eq!(router.handle(fixtures::request(Method::GET, "/")).status(), StatusCode::OK);
    assert_eq!(
        router.handle(fixtures::request(Method::GET, "/missing")).status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn global_halt_blocks_every_route() {
    let router = build(|r| {
        r.use_middleware(|ctx: &mut RequestContext| ctx.error(StatusCode::SERVICE_UNAVAILABLE, "maintenance"));
        r.get("/", chain![ok]);
    });

    let response = router.handle(fixtures::request(Method::GET, "/"));
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn parameters_and_route_reach_the_handler() {
    let router = build(|r| {
        r.get(
            "/{username}/{reponame}",
            chain![|ctx: &mut RequestContext| {
                let route = ctx.route().unwrap_or_default().to_string();
                let body = format!(
                    "{} {} {}",
                    ctx.param("username").unwrap_or_default(),
                    ctx.param("reponame").unwrap_or_default(),
                    route
                );
                ctx.text(StatusCode::OK, &body)
            }],
        );
    });

    let response = router.handle(fixtures::request(Method::GET, "/alice/proj"));
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-length"], "33");
}

#[test]
fn permanent_redirect_is_301() {
    let router = build(|r| {
        r.get(
            "/user/settings/social",
            chain![|ctx: &mut RequestContext| ctx.redirect_permanent("/user/settings/security")],
        );
    });

    let response = router.handle(fixtures::request(Method::GET, "/user/settings/social"));
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()[LOCATION], "/user/settings/security");
}

#[test]
fn request_id_stage_echoes_header() {
    let router = build(|r| {
        r.use_middleware(RequestIdStage::new());
        r.get("/", chain![ok]);
    });

    let response = router.handle(fixtures::request(Method::GET, "/"));
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));

    let missing = router.handle(fixtures::request(Method::GET, "/nope"));
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert!(missing.headers().contains_key(REQUEST_ID_HEADER));
}

#[test]
fn closed_connection_skips_the_handler() {
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    let connection = ConnectionState::new();
    let closer = connection.clone();

    let router = build(|r| {
        r.get(
            "/archive",
            chain![
                move |_: &mut RequestContext| {
                    closer.close();
                    Outcome::Continue
                },
                move |ctx: &mut RequestContext| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ctx.text(StatusCode::OK, "zip")
                }
            ],
        );
    });

    let _ = router.serve(fixtures::request(Method::GET, "/archive"), connection);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn metrics_use_pattern_labels() {
    let router = build(|r| {
        r.get("/{username}", chain![ok]);
    });

    let output = render_with(|| {
        router.handle(fixtures::request(Method::GET, "/alice"));
        router.handle(fixtures::request(Method::GET, "/bob"));
        router.handle(fixtures::request(Method::GET, "/alice/proj/nope"));
    });

    assert!(output.contains(r#"portcullis_requests_total{route="/{username}",status="200"} 2"#));
    assert!(output.contains(r#"portcullis_requests_total{route="<unmatched>",status="404"} 1"#));
    assert!(output.contains("portcullis_not_found_total 1"));
    assert!(output.contains("portcullis_in_flight_requests 0"));
}

#[test]
fn recovered_fault_is_counted() {
    let router = build(|r| {
        r.get("/boom", chain![|_: &mut RequestContext| -> Outcome { panic!("boom") }]);
    });

    let output = render_with(|| {
        let response = router.handle(fixtures::request(Method::GET, "/boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    });
    assert!(output.contains("portcullis_recovered_panics_total 1"));
}

/// Collects the `state` field of every event.
#[derive(Clone, Default)]
struct States(Arc<Mutex<Vec<String>>>);

impl Visit for States {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "state" {
            self.0.lock().unwrap().push(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "state" {
            self.0.lock().unwrap().push(format!("{value:?}"));
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for States {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        event.record(&mut self.clone());
    }
}

#[test]
fn request_lifecycle_is_traced_in_order() {
    let router = build(|r| {
        r.get("/", chain![ok]);
        r.get("/admin", chain![|ctx: &mut RequestContext| ctx.error(StatusCode::FORBIDDEN, "no"), ok]);
    });

    let states = States::default();
    let subscriber = tracing_subscriber::registry().with(states.clone());
    tracing::subscriber::with_default(subscriber, || {
        router.handle(fixtures::request(Method::GET, "/"));
        router.handle(fixtures::request(Method::GET, "/admin"));
    });

    let seen = states.0.lock().unwrap().clone();
    assert_eq!(
        seen,
        ["matching", "executing", "completed", "matching", "executing", "halted"]
    );
}
