//! Client tests against a real server on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use infer_cli::{ClientError, InferenceClient};
use infer_engine::{GenerationConfig, GenerationEngine};
use infer_runtime::{ManualEngine, MockEngine};
use infer_server::{serve, AppState, JobSnapshot, JobStatus, ServerConfig};
use tokio::net::TcpListener;

async fn spawn_server(engine: impl GenerationEngine + 'static) -> InferenceClient {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(Arc::new(engine), ServerConfig::default());
    tokio::spawn(async move {
        serve(listener, state).await.unwrap();
    });
    InferenceClient::new(format!("http://{addr}"))
}

async fn wait_for(client: &InferenceClient, pred: impl Fn(&JobSnapshot) -> bool) -> JobSnapshot {
    for _ in 0..1000 {
        let snapshot = client.status().await.unwrap();
        if pred(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never met");
}

#[tokio::test]
async fn generate_to_completion_reports_progress_and_claims_result() {
    let engine = MockEngine::new()
        .with_script(["Hello", ",", " world"])
        .with_step_delay(Duration::from_millis(5));
    let client = spawn_server(engine).await;

    let mut pieces = Vec::new();
    let text = client
        .generate_to_completion(
            "greet",
            GenerationConfig::default(),
            Duration::from_millis(2),
            |piece| pieces.push(piece.to_string()),
        )
        .await
        .unwrap();

    assert_eq!(text, "Hello, world");
    assert_eq!(pieces.concat(), "Hello, world");
    assert_eq!(client.status().await.unwrap(), JobSnapshot::Ready {});
}

#[tokio::test]
async fn generation_failure_is_an_error() {
    let engine = MockEngine::new()
        .with_script(["a", "b"])
        .failing_after(1, "device lost");
    let client = spawn_server(engine).await;

    let mut pieces = Vec::new();
    let err = client
        .generate_to_completion(
            "x",
            GenerationConfig::default(),
            Duration::from_millis(2),
            |piece| pieces.push(piece.to_string()),
        )
        .await
        .unwrap_err();

    match err {
        ClientError::Generation(message) => assert!(message.contains("device lost")),
        other => panic!("expected generation error, got {other:?}"),
    }
    assert_eq!(pieces.concat(), "a");
}

#[tokio::test]
async fn second_start_is_rejected_with_server_message() {
    let (engine, feed) = ManualEngine::new();
    let client = spawn_server(engine).await;

    client.infer("first", GenerationConfig::default()).await.unwrap();
    let err = client
        .infer("second", GenerationConfig::default())
        .await
        .unwrap_err();

    match err {
        ClientError::Status { code, message } => {
            assert_eq!(code, 400);
            assert!(message.contains("cannot start generation"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert_eq!(feed.prompts(), vec!["first".to_string()]);
    feed.finish();
}

#[tokio::test]
async fn fetch_before_done_is_rejected() {
    let (engine, feed) = ManualEngine::new();
    let client = spawn_server(engine).await;

    client.infer("p", GenerationConfig::default()).await.unwrap();
    let err = client.get_generated().await.unwrap_err();
    assert!(matches!(err, ClientError::Status { code: 400, .. }));
    assert_eq!(client.status().await.unwrap().status(), JobStatus::Generating);
    feed.finish();
}

#[tokio::test]
async fn stop_ends_job_and_keeps_partial_text() {
    let (engine, feed) = ManualEngine::new();
    let client = spawn_server(engine).await;

    client.infer("p", GenerationConfig::default()).await.unwrap();
    feed.push("partial");
    wait_for(&client, |s| s.text() == Some("partial")).await;

    client.stop().await.unwrap();
    wait_for(&client, |s| s.status() == JobStatus::DoneGenerating).await;

    assert_eq!(client.get_generated().await.unwrap(), "partial");
    assert!(client.get_generated().await.is_err());
}

#[tokio::test]
async fn unreachable_server_is_an_http_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = InferenceClient::new(format!("http://{addr}"));
    assert!(matches!(client.status().await, Err(ClientError::Http(_))));
}
