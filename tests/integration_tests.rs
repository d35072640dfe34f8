//! Integration tests for sandbox-stream
//!
//! These tests drive the full HTTP surface. The sandbox is either disabled
//! (programs run under `sh -c`) or replaced by `env`, which takes the
//! profile argument as a variable assignment and then runs the command.

use actix_web::http::{header, StatusCode};
use actix_web::{test, App};
use sandbox_stream::config::SandboxTool;
use sandbox_stream::{AppState, ProfileResolver, ServerConfig, StreamServer, ToolCatalog};
use std::path::PathBuf;

fn unsandboxed() -> ServerConfig {
    ServerConfig::unsandboxed()
}

fn server_with(config: ServerConfig, catalog: ToolCatalog) -> StreamServer {
    let profiles = ProfileResolver::with_search_roots(config.profile_dir.clone(), Vec::new());
    StreamServer::from_state(AppState::with_parts(config, profiles, catalog).unwrap())
}

/// Payloads of every SSE record in `body`
fn payloads(body: &[u8]) -> Vec<String> {
    let text = std::str::from_utf8(body).expect("stream is UTF-8");
    assert!(text.ends_with("\n\n"), "unterminated record in {:?}", text);

    text.split_terminator("\n\n")
        .map(|record| {
            record
                .lines()
                .map(|line| line.strip_prefix("data: ").expect("data line"))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect()
}

macro_rules! post_run {
    ($app:expr, $body:expr) => {{
        let req = test::TestRequest::post()
            .uri("/run-system")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload($body)
            .to_request();
        test::call_service($app, req).await
    }};
}

#[actix_web::test]
async fn structured_request_streams_output_and_done() {
    let server = server_with(unsandboxed(), ToolCatalog::default());
    let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

    let resp = post_run!(
        &app,
        r#"{"tool":"echo","binary":"echo","args":["hello"],"target":"world"}"#
    );
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let body = test::read_body(resp).await;
    assert_eq!(payloads(&body), vec!["start", "hello world", "DONE"]);
}

#[actix_web::test]
async fn empty_request_is_a_validation_error_without_stream() {
    let server = server_with(unsandboxed(), ToolCatalog::default());
    let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

    let resp = post_run!(&app, r#"{"cmd":"","binary":""}"#);
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_ne!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Command cannot be empty");

    let resp = post_run!(&app, "not json at all");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Invalid JSON");
}

#[actix_web::test]
async fn non_zero_exit_delivers_both_channels_before_done() {
    let config = ServerConfig {
        report_exit_status: true,
        ..unsandboxed()
    };
    let server = server_with(config, ToolCatalog::default());
    let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

    let resp = post_run!(
        &app,
        r#"{"cmd":"echo a; echo b >&2; echo c; echo d >&2; exit 2"}"#
    );
    let events = payloads(&test::read_body(resp).await);

    assert_eq!(events.first().unwrap(), "start");
    assert_eq!(events.last().unwrap(), "DONE");
    assert_eq!(events[events.len() - 2], "EXIT: 2");
    assert_eq!(events.iter().filter(|e| *e == "DONE").count(), 1);

    let stdout: Vec<&str> = events
        .iter()
        .map(String::as_str)
        .filter(|e| ["a", "c"].contains(e))
        .collect();
    let stderr: Vec<&str> = events
        .iter()
        .map(String::as_str)
        .filter(|e| e.starts_with("ERR: "))
        .collect();
    assert_eq!(stdout, vec!["a", "c"]);
    assert_eq!(stderr, vec!["ERR: b", "ERR: d"]);
    assert_eq!(events.len(), 1 + 4 + 1 + 1);
}

#[actix_web::test]
async fn trailing_partial_line_is_not_lost() {
    let server = server_with(unsandboxed(), ToolCatalog::default());
    let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

    let resp = post_run!(&app, r#"{"cmd":"printf 'one\\ntwo'; printf 'tail' >&2"}"#);
    let events = payloads(&test::read_body(resp).await);

    assert_eq!(events[0], "start");
    assert!(events.contains(&"one".to_string()));
    assert!(events.contains(&"two".to_string()));
    assert!(events.contains(&"ERR: tail".to_string()));
    assert_eq!(events.last().unwrap(), "DONE");
    assert_eq!(events.len(), 5);
}

#[actix_web::test]
async fn ten_thousand_lines_arrive_unmerged_and_in_order() {
    let config = ServerConfig {
        sink_capacity: 4,
        ..unsandboxed()
    };
    let server = server_with(config, ToolCatalog::default());
    let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

    let resp = post_run!(&app, r#"{"cmd":"seq 1 10000"}"#);
    let events = payloads(&test::read_body(resp).await);

    assert_eq!(events.len(), 10_002);
    assert_eq!(events[0], "start");
    assert_eq!(events[10_001], "DONE");
    for (i, line) in events[1..=10_000].iter().enumerate() {
        assert_eq!(line, &(i + 1).to_string());
    }
}

#[actix_web::test]
async fn concurrent_requests_are_isolated() {
    let server = server_with(unsandboxed(), ToolCatalog::default());
    let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

    let script = |tag: &str| {
        serde_json::json!({
            "cmd": format!("for i in 1 2 3 4 5; do echo {tag}$i; echo {tag}e$i >&2; sleep 0.01; done")
        })
        .to_string()
    };

    let (resp_a, resp_b) = futures::join!(
        async { post_run!(&app, script("alpha")) },
        async { post_run!(&app, script("beta")) }
    );
    let (body_a, body_b) = futures::join!(test::read_body(resp_a), test::read_body(resp_b));
    let (events_a, events_b) = (payloads(&body_a), payloads(&body_b));

    assert_eq!(events_a.len(), 12);
    assert_eq!(events_b.len(), 12);
    assert!(events_a.iter().all(|e| !e.contains("beta")));
    assert!(events_b.iter().all(|e| !e.contains("alpha")));

    let alpha_stdout: Vec<&String> = events_a.iter().filter(|e| e.starts_with("alpha")).collect();
    assert_eq!(
        alpha_stdout,
        vec!["alpha1", "alpha2", "alpha3", "alpha4", "alpha5"]
    );
}

#[actix_web::test]
async fn launch_failure_is_reported_inside_the_stream() {
    let config = ServerConfig {
        sandbox: Some(SandboxTool {
            program: "/nonexistent/firejail".to_string(),
            ..SandboxTool::default()
        }),
        ..unsandboxed()
    };
    let server = server_with(config, ToolCatalog::default());
    let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

    let resp = post_run!(&app, r#"{"binary":"echo","args":["hi"]}"#);
    assert_eq!(resp.status(), StatusCode::OK);

    let events = payloads(&test::read_body(resp).await);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], "start");
    assert!(events[1].starts_with("Error starting command"), "{}", events[1]);
    assert_eq!(events[2], "DONE");
}

#[actix_web::test]
async fn sandbox_receives_flags_profile_then_command() {
    let profiles = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        sandbox: Some(SandboxTool {
            program: "env".to_string(),
            flags: Vec::new(),
            profile_flag: "SANDBOX_PROFILE=".to_string(),
        }),
        profile_dir: Some(profiles.path().to_path_buf()),
        ..unsandboxed()
    };
    let server = server_with(config, ToolCatalog::default());
    let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

    let resp = post_run!(&app, r#"{"cmd":"echo profile=$SANDBOX_PROFILE"}"#);
    let events = payloads(&test::read_body(resp).await);
    let expected: PathBuf = profiles.path().join("system.profile");
    assert_eq!(
        events,
        vec![
            "start".to_string(),
            format!("profile={}", expected.display()),
            "DONE".to_string()
        ]
    );

    let resp = post_run!(
        &app,
        r#"{"binary":"sh","args":["-c","echo $SANDBOX_PROFILE $0"],"target":"tgt","profile":"net.profile"}"#
    );
    let events = payloads(&test::read_body(resp).await);
    assert_eq!(
        events[1],
        format!("{} tgt", profiles.path().join("net.profile").display())
    );
}

#[actix_web::test]
async fn catalogue_routes_list_and_stream_tools() {
    let catalog = ToolCatalog::from_json(
        r#"{
            "basic": [
                { "id": "greet", "name": "Greet", "type": "system", "cmd": "echo hello {TARGET}" }
            ],
            "wasm": [
                { "id": "blob", "name": "Blob", "type": "wasm", "module": "blob.wasm" }
            ]
        }"#,
    )
    .unwrap();
    let server = server_with(unsandboxed(), catalog);
    let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

    let req = test::TestRequest::get().uri("/tools").to_request();
    let tools: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(tools["basic"][0]["id"], "greet");
    assert_eq!(tools["wasm"][0]["type"], "wasm");

    let req = test::TestRequest::get()
        .uri("/stream?tool=greet&target=world")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let events = payloads(&test::read_body(resp).await);
    assert_eq!(events, vec!["start", "hello world", "DONE"]);

    let req = test::TestRequest::get()
        .uri("/stream?tool=blob&target=world")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/stream?tool=missing&target=world")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn health_and_preflight_routes() {
    let server = server_with(unsandboxed(), ToolCatalog::default());
    let app = test::init_service(App::new().configure(|cfg| server.configure(cfg))).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let health: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(health["status"], "healthy");

    let req = test::TestRequest::default()
        .method(actix_web::http::Method::OPTIONS)
        .uri("/run-system")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        resp.headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}
