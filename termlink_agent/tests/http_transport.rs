//! reqwest transport and full agent round trips against a mock controller.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use termlink_agent::{
    AgentConfig, ApiRequest, Endpoint, HttpTransport, RegisteredIdentity, RequestBody,
    ReqwestTransport, SessionSummary, SysinfoMetrics, TaskKind, TerminalAgent, TransportError,
};
use wiremock::matchers::{body_json, body_string_contains, header_exists, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(server: &MockServer) -> ReqwestTransport {
    ReqwestTransport::new(&server.uri(), Duration::from_secs(5)).expect("transport")
}

fn config(server: &MockServer) -> AgentConfig {
    AgentConfig {
        endpoint: server.uri(),
        name: "koko-test".into(),
        cpu_sample_interval: Duration::from_millis(10),
        ..AgentConfig::default()
    }
}

#[tokio::test]
async fn register_is_unsigned_and_heartbeat_is_signed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/applications/v1/terminal/"))
        .and(body_json(json!({"name": "koko-test"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "name": "koko-test",
            "access_key": {"id": "ak-1", "secret": "sk-1"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/applications/v1/terminal/heartbeat/"))
        .and(header_exists("date"))
        .and(header_regex("authorization", "^Sign ak-1:.+"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"id": "t-1", "name": "kill_session", "args": "s-1", "is_finished": false}
        ])))
        .mount(&server)
        .await;

    let agent = TerminalAgent::from_config(&config(&server)).unwrap();
    let id = agent.register("koko-test").await.expect("register");
    assert_eq!(id, RegisteredIdentity::new("ak-1", "sk-1"));

    let tasks = agent
        .heartbeat(&[SessionSummary::new(false).with_field("id", "s-1")])
        .await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind(), TaskKind::KillSession);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
    assert!(received[0].headers.get("authorization").is_none());
    let hb: serde_json::Value = serde_json::from_slice(&received[1].body).unwrap();
    assert_eq!(hb["session_online"], 1);
    assert!(hb["memory_used"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn register_conflict_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/applications/v1/terminal/"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"name": ["exists"]})))
        .mount(&server)
        .await;

    let agent = TerminalAgent::from_config(&config(&server)).unwrap();
    let err = agent.register("koko-test").await.unwrap_err();
    assert_eq!(err.to_string(), "koko-test exist already");
}

#[tokio::test]
async fn replay_is_multipart_on_session_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/applications/v1/sessions/s-7/replay/"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("name=\"archive\""))
        .and(body_string_contains("replay-bytes"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("s-7.replay.gz");
    std::fs::write(&archive, b"replay-bytes").unwrap();

    let agent = TerminalAgent::new(
        Arc::new(transport(&server)),
        Arc::new(SysinfoMetrics::new(Duration::ZERO)),
    )
    .with_identity(RegisteredIdentity::new("ak-1", "sk-1"));
    assert!(agent.push_session_replay(&archive, "s-7").await);
    // unmatched path falls through to wiremock's 404
    assert!(!agent.push_session_replay(&archive, "other").await);
}

#[tokio::test]
async fn large_replay_arrives_whole() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/applications/v1/sessions/s-8/replay/"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("s-8.replay.gz");
    let data: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
    std::fs::write(&archive, &data).unwrap();

    let agent = TerminalAgent::new(
        Arc::new(transport(&server)),
        Arc::new(SysinfoMetrics::new(Duration::ZERO)),
    )
    .with_identity(RegisteredIdentity::new("ak-1", "sk-1"));
    assert!(agent.push_session_replay(&archive, "s-8").await);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let body = &received[0].body;
    assert!(body.len() > data.len());
    assert!(body.windows(data.len()).any(|w| w == &data[..]));
}

#[tokio::test]
async fn task_ids_are_encoded_into_one_segment() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/applications/v1/tasks/a%2Fb%3Fc/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "a/b?c"})))
        .mount(&server)
        .await;

    let agent = TerminalAgent::from_config(&config(&server))
        .unwrap()
        .with_identity(RegisteredIdentity::new("ak-1", "sk-1"));
    assert!(agent.finish_task("a/b?c").await);
    assert!(!agent.finish_task("..").await);
    assert!(!agent.finish_task("").await);

    // the dot ids never leave the process
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn finish_task_patches_task() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/applications/v1/tasks/t-3/"))
        .and(body_json(json!({"is_finished": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t-3"})))
        .mount(&server)
        .await;

    let agent = TerminalAgent::from_config(&config(&server))
        .unwrap()
        .with_identity(RegisteredIdentity::new("ak-1", "sk-1"));
    assert!(agent.finish_task("t-3").await);
    assert!(!agent.finish_task("t-4").await);
}

#[tokio::test]
async fn empty_body_is_null_and_garbage_is_response_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/audits/v1/command/"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/applications/v1/terminal/heartbeat/"))
        .respond_with(ResponseTemplate::new(201).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let t = transport(&server);
    let resp = t
        .send(ApiRequest::post(Endpoint::SessionCommand, RequestBody::Json(json!([]))))
        .await
        .unwrap();
    assert_eq!(resp.status, 201);
    assert!(resp.body.is_null());

    let err = t
        .send(ApiRequest::post(Endpoint::TerminalHeartbeat, RequestBody::Json(json!({}))))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Response(_)), "{err:?}");
}

#[tokio::test]
async fn refused_connection_is_transport_error() {
    // grab a free port, then close it so nothing listens there
    let addr = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap()
    };
    let t = ReqwestTransport::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
    let err = t
        .send(ApiRequest::post(
            Endpoint::TerminalRegister,
            RequestBody::Json(json!({"name": "x"})),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Connection(_)), "{err:?}");

    let agent = TerminalAgent::new(Arc::new(t), Arc::new(SysinfoMetrics::new(Duration::ZERO)))
        .with_identity(RegisteredIdentity::new("ak-1", "sk-1"));
    assert!(agent.heartbeat(&[]).await.is_empty());
}
