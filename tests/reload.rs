//! Route file reload and hot reload.

use std::fs;
use std::thread;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use axum::http::StatusCode;

use stencil::config::RouteWatcher;
use stencil::http::Request;

mod common;

use common::{dispatcher, SiteFixture};

const ROUTES_V1: &str = r#"
[[routes]]
name = "greeting"
path = "/greet"
view = { template = "hello.html" }
"#;

const ROUTES_V2: &str = r#"
[[routes]]
name = "greeting"
path = "/greet"
view = { template = "bye.html" }

[[routes]]
name = "extra"
path = "/extra"
view = { template = "bye.html" }
"#;

fn fixture() -> SiteFixture {
    let fixture = SiteFixture::new();
    fixture.write("content/hello.html", "hello");
    fixture.write("content/bye.html", "bye");
    fixture.write("routes.toml", ROUTES_V1);
    fixture
}

fn touch_forward(path: &std::path::Path) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();
}

#[test]
fn test_reload_swaps_whole_table() {
    let fixture = fixture();
    let mut config = fixture.config("");
    config.site.routes_file = Some("routes.toml".into());
    let dispatcher = dispatcher(stencil::Site::builder(config));

    assert_eq!(dispatcher.call(Request::get("/greet")).body.as_text(), "hello");
    assert_eq!(
        dispatcher.call(Request::get("/extra")).status,
        StatusCode::NOT_FOUND
    );

    fixture.write("routes.toml", ROUTES_V2);
    assert_eq!(dispatcher.site().routes().reload().unwrap(), 2);

    assert_eq!(dispatcher.call(Request::get("/greet")).body.as_text(), "bye");
    assert_eq!(dispatcher.call(Request::get("/extra")).body.as_text(), "bye");
}

#[test]
fn test_failed_reload_keeps_previous_routes() {
    let fixture = fixture();
    let mut config = fixture.config("");
    config.site.routes_file = Some("routes.toml".into());
    let dispatcher = dispatcher(stencil::Site::builder(config));

    fixture.write("routes.toml", "[[routes]\npath = ");
    assert!(dispatcher.site().routes().reload().is_err());

    let response = dispatcher.call(Request::get("/greet"));
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_text(), "hello");
    assert_eq!(dispatcher.site().routes().len(), 1);
}

#[test]
fn test_bad_entry_skipped_on_reload() {
    let fixture = fixture();
    let mut config = fixture.config("");
    config.site.routes_file = Some("routes.toml".into());
    let dispatcher = dispatcher(stencil::Site::builder(config));

    fixture.write(
        "routes.toml",
        r#"
        [[routes]]
        path = "/broken/{unclosed"

        [[routes]]
        path = "/greet"
        view = { template = "bye.html" }
        "#,
    );
    assert_eq!(dispatcher.site().routes().reload().unwrap(), 1);
    assert_eq!(dispatcher.call(Request::get("/greet")).body.as_text(), "bye");
}

#[test]
fn test_watcher_picks_up_changes() {
    let fixture = fixture();
    let mut config = fixture.config("");
    config.site.routes_file = Some("routes.toml".into());
    let dispatcher = dispatcher(stencil::Site::builder(config));

    let _watcher = RouteWatcher::new(
        dispatcher.site().routes().clone(),
        Duration::from_millis(50),
    )
    .start()
    .unwrap();

    fixture.write("routes.toml", ROUTES_V2);
    touch_forward(&fixture.root().join("routes.toml"));

    let deadline = Instant::now() + Duration::from_secs(10);
    while dispatcher.site().routes().len() != 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(25));
    }
    assert_eq!(dispatcher.site().routes().len(), 2);
    assert_eq!(dispatcher.call(Request::get("/extra")).body.as_text(), "bye");
}

#[test]
fn test_readers_never_see_partial_table_during_reload() {
    let fixture = fixture();
    let mut config = fixture.config("");
    config.site.routes_file = Some("routes.toml".into());
    let dispatcher = dispatcher(stencil::Site::builder(config));
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    let table = dispatcher.site().routes().snapshot();
                    match table.len() {
                        1 => assert!(table.get("extra").is_none()),
                        2 => assert!(table.get("extra").is_some()),
                        n => panic!("table with {n} routes"),
                    }

                    let response = dispatcher.call(Request::get("/greet"));
                    assert_eq!(response.status, StatusCode::OK);
                    let body = response.body.as_text();
                    assert!(body == "hello" || body == "bye", "unexpected body {body}");
                }
            });
        }

        for round in 0..50 {
            let routes = if round % 2 == 0 { ROUTES_V2 } else { ROUTES_V1 };
            fixture.write("routes.toml", routes);
            dispatcher.site().routes().reload().unwrap();
        }
        done.store(true, Ordering::SeqCst);
    });

    assert_eq!(dispatcher.site().routes().len(), 1);
}
