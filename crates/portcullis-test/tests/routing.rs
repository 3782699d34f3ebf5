//! Routing and middleware ordering, end to end.

use std::sync::{Arc, Mutex};

use http::{Method, StatusCode};
use portcullis::prelude::*;
use portcullis_config::RouterSection;
use portcullis_test::TestClient;

/// Records which steps ran, in order.
#[derive(Clone, Default)]
struct Trail(Arc<Mutex<Vec<&'static str>>>);

impl Trail {
    fn step(&self, name: &'static str) -> BoxedHandler {
        let trail = self.clone();
        BoxedHandler::named(name, move |_: &mut RequestContext| {
            trail.0.lock().unwrap().push(name);
            Outcome::Continue
        })
    }

    fn handler(&self, name: &'static str) -> BoxedHandler {
        let trail = self.clone();
        BoxedHandler::named(name, move |ctx: &mut RequestContext| {
            trail.0.lock().unwrap().push(name);
            ctx.text(StatusCode::OK, name)
        })
    }

    fn take(&self) -> Vec<&'static str> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

fn text(body: &'static str) -> BoxedHandler {
    BoxedHandler::named(body, move |ctx: &mut RequestContext| ctx.text(StatusCode::OK, body))
}

#[tokio::test]
async fn nested_group_middleware_runs_outer_to_inner() {
    let trail = Trail::default();
    let mut route = Route::new();
    route.group("/a", vec![trail.step("a")], |r| {
        r.group("/b", vec![trail.step("b")], |r| {
            r.get("/c", vec![trail.step("c"), trail.handler("h")]);
        });
    });
    let client = TestClient::from_route(route).unwrap();

    client.get("/a/b/c").send().await.assert_status(StatusCode::OK).assert_body_eq("h");
    assert_eq!(trail.take(), ["a", "b", "c", "h"]);
}

#[tokio::test]
async fn halting_step_skips_the_rest_of_the_chain() {
    let trail = Trail::default();
    let mut route = Route::new();
    route.group(
        "/user",
        chain![|ctx: &mut RequestContext| ctx.error(StatusCode::FORBIDDEN, "closed")],
        |r| {
            r.get("/settings", vec![trail.step("gate"), trail.handler("settings")]);
        },
    );
    let client = TestClient::from_route(route).unwrap();

    client
        .get("/user/settings")
        .send()
        .await
        .assert_status(StatusCode::FORBIDDEN)
        .assert_body_eq("closed");
    assert!(trail.take().is_empty());
}

#[tokio::test]
async fn commit_sha_must_match_its_pattern() {
    let mut route = Route::new();
    route.get("/{username}/{reponame}/commit/{sha:[a-f0-9]{7,40}}", chain![
        |ctx: &mut RequestContext| {
            let sha = ctx.param("sha").unwrap_or_default().to_string();
            ctx.text(StatusCode::OK, &sha)
        }
    ]);
    let client = TestClient::from_route(route).unwrap();

    client.get("/alice/proj/commit/abc").send().await.assert_status(StatusCode::NOT_FOUND);
    client.get("/alice/proj/commit/ABCDEF0").send().await.assert_status(StatusCode::NOT_FOUND);
    client
        .get("/alice/proj/commit/abcdef0")
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_body_eq("abcdef0");
}

#[tokio::test]
async fn literal_segment_beats_parameter_in_either_order() {
    for literal_first in [true, false] {
        let mut route = Route::new();
        if literal_first {
            route.get("/explore/repos", vec![text("explore")]);
            route.get("/{username}/{reponame}", vec![text("repo")]);
        } else {
            route.get("/{username}/{reponame}", vec![text("repo")]);
            route.get("/explore/repos", vec![text("explore")]);
        }
        let client = TestClient::from_route(route).unwrap();

        client.get("/explore/repos").send().await.assert_body_eq("explore");
        client.get("/explore/other").send().await.assert_status(StatusCode::NOT_FOUND);
        client.get("/alice/proj").send().await.assert_body_eq("repo");
    }
}

#[tokio::test]
async fn method_miss_on_literal_path_is_not_served_by_parameter_route() {
    let mut route = Route::new();
    route.post("/explore/repos", vec![text("explore search")]);
    route.get("/{username}/{reponame}", vec![text("repo")]);
    let client = TestClient::from_route(route).unwrap();

    client.get("/explore/repos").send().await.assert_status(StatusCode::NOT_FOUND);
    client.post("/explore/repos").send().await.assert_body_eq("explore search");
    client.get("/alice/repos").send().await.assert_body_eq("repo");
}

#[tokio::test]
async fn first_registered_regex_sibling_wins() {
    let mut route = Route::new();
    route.get("/{username}/{id:[0-9]+}", vec![text("numeric")]);
    route.get("/{username}/{name:[a-z0-9]+}", vec![text("named")]);
    let client = TestClient::from_route(route).unwrap();

    client.get("/alice/123").send().await.assert_body_eq("numeric");
    client.get("/alice/proj1").send().await.assert_body_eq("named");

    let mut route = Route::new();
    route.get("/{username}/{name:[a-z0-9]+}", vec![text("named")]);
    route.get("/{username}/{id:[0-9]+}", vec![text("numeric")]);
    let client = TestClient::from_route(route).unwrap();

    client.get("/alice/123").send().await.assert_body_eq("named");
}

#[tokio::test]
async fn wildcard_captures_the_raw_remainder() {
    let mut route = Route::new();
    route.get("/{username}/{reponame}/raw/*", chain![|ctx: &mut RequestContext| {
        let rest = ctx.param("*").unwrap_or_default().to_string();
        ctx.text(StatusCode::OK, &rest)
    }]);
    let client = TestClient::from_route(route).unwrap();

    client.get("/alice/proj/raw/branch/main/a%20b.txt").send().await.assert_body_eq("branch/main/a%20b.txt");
    client.get("/alice/proj/raw/").send().await.assert_status(StatusCode::OK).assert_body_eq("");
}

#[tokio::test]
async fn head_is_served_by_get_without_a_body() {
    let mut route = Route::new();
    route.get("/", vec![text("home")]);
    let client = TestClient::from_route(route).unwrap();

    let response = client.head("/").send().await;
    response.assert_status(StatusCode::OK);
    assert!(response.body().is_empty());

    let mut route = Route::new();
    route.get("/", vec![text("home")]);
    let settings = Settings::builder()
        .router(RouterSection {
            head_from_get: false,
            ..RouterSection::default()
        })
        .build();
    let client = TestClient::with_settings(route, settings).unwrap();
    client.head("/").send().await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unmatched_requests_reach_not_found_after_global_middleware() {
    let trail = Trail::default();
    let mut route = Route::new();
    route.get("/explore/repos", vec![text("explore")]);
    route.use_middleware(trail.step("global"));
    route.not_found(chain![|ctx: &mut RequestContext| ctx.error(StatusCode::NOT_FOUND, "Page Not Found")]);
    let client = TestClient::from_route(route).unwrap();

    client
        .get("/nowhere")
        .send()
        .await
        .assert_status(StatusCode::NOT_FOUND)
        .assert_body_eq("Page Not Found");
    assert_eq!(trail.take(), ["global"]);

    // Wrong method is served by not_found too.
    client.post("/explore/repos").send().await.assert_body_eq("Page Not Found");
    assert_eq!(trail.take(), ["global"]);
}

#[tokio::test]
async fn mounted_router_runs_inside_the_mount_point() {
    let trail = Trail::default();

    let mut api = Route::new();
    api.use_middleware(trail.step("api_global"));
    api.get("/repos/{owner}/{repo}", vec![trail.step("local"), trail.handler("repo")]);

    let mut route = Route::new();
    route.use_middleware(trail.step("global"));
    route.group("/api", vec![trail.step("group")], |r| {
        r.mount("/v1", api);
    });
    let client = TestClient::from_route(route).unwrap();

    client.get("/api/v1/repos/alice/proj").send().await.assert_status(StatusCode::OK);
    assert_eq!(trail.take(), ["global", "group", "api_global", "local", "repo"]);
}

#[tokio::test]
async fn combo_registers_several_methods_on_one_path() {
    let mut route = Route::new();
    route
        .combo("/user/login")
        .get(vec![text("form")])
        .post(vec![text("submitted")]);
    let client = TestClient::from_route(route).unwrap();

    client.get("/user/login").send().await.assert_body_eq("form");
    client.post("/user/login").send().await.assert_body_eq("submitted");
    client.request(Method::PUT, "/user/login").send().await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn permanent_redirect() {
    let mut route = Route::new();
    route.get("/explore", chain![|ctx: &mut RequestContext| ctx.redirect_permanent("/explore/repos")]);
    let client = TestClient::from_route(route).unwrap();

    client
        .get("/explore")
        .send()
        .await
        .assert_redirect(StatusCode::MOVED_PERMANENTLY, "/explore/repos");
}

fn faulty_route() -> Route {
    let mut route = Route::new();
    route.get("/boom", chain![|ctx: &mut RequestContext| -> Outcome {
        let _ = ctx.response_mut().set_header("x-partial", "1");
        panic!("boom")
    }]);
    route.get("/late", chain![
        |ctx: &mut RequestContext| {
            let _ = ctx.text(StatusCode::OK, "partial");
            Outcome::Continue
        },
        |_: &mut RequestContext| -> Outcome { panic!("after the response") }
    ]);
    route
}

#[tokio::test]
async fn fault_produces_one_500_in_dev_mode() {
    let settings = Settings::builder().run_mode(RunMode::Dev).build();
    let client = TestClient::with_settings(faulty_route(), settings).unwrap();

    let response = client.get("/boom").send().await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().unwrap().starts_with("PANIC: boom"));
    assert!(response.header("x-partial").is_none());

    let response = client.get("/late").send().await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().unwrap().starts_with("PANIC: after the response"));
}

#[tokio::test]
async fn fault_hides_details_in_prod_mode() {
    let settings = Settings::builder().run_mode(RunMode::Prod).build();
    let client = TestClient::with_settings(faulty_route(), settings).unwrap();

    client
        .get("/boom")
        .send()
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_body_eq("Internal Server Error");
}
