//! Real-time runner over the shipped oscillator.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{default_config, extractions, send_json, state};

#[tokio::test]
async fn oscillator_responds_to_force_updates() {
    let (work, mut config) = default_config();
    config.realtime.speedup = 50.0;
    config.realtime.publish_every = 1;
    let state = state(config);

    let (status, _) = send_json(&state, "POST", "/realtime/start", "").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&state, "POST", "/realtime/update", r#"{"value": 10.0}"#).await;
    assert_eq!(status, StatusCode::OK);

    let mut rx = state.realtime.subscribe();
    tokio::time::timeout(
        Duration::from_secs(10),
        rx.wait_for(|s| s.param_value == 10.0 && s.samples >= 5),
    )
    .await
    .expect("force observed in time")
    .expect("sender alive");
    let snap = state.realtime.data();
    assert_eq!(snap.output_name.as_deref(), Some("outputs[1]"));
    assert!(snap.running);
    assert!(snap.output.last().is_some_and(|y| *y > 0.0));

    let (status, json) = send_json(&state, "GET", "/realtime/data", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["param_value"], 10.0);
    assert_eq!(json["output_name"], "outputs[1]");

    let (status, json) = send_json(&state, "POST", "/realtime/stop", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["running"], false);
    assert_eq!(extractions(&work), 0);
}

#[tokio::test]
async fn missing_artifact_fails_start() {
    let (_work, mut config) = default_config();
    config.realtime.artifact = "Missing".to_string();
    let state = state(config);
    let (status, json) = send_json(&state, "POST", "/realtime/start", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("Missing"));
}

#[tokio::test]
async fn diverging_run_reports_error() {
    let (work, mut config) = default_config();
    config.realtime.speedup = 50.0;
    config.realtime.publish_every = 1;
    let state = state(config);

    let (status, _) = send_json(&state, "POST", "/realtime/start", "").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&state, "POST", "/realtime/update", r#"{"value": 1e308}"#).await;
    assert_eq!(status, StatusCode::OK);

    let mut rx = state.realtime.subscribe();
    let last = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|s| s.error.is_some()))
        .await
        .expect("failure in time")
        .expect("sender alive")
        .clone();
    assert!(!last.running);

    let (status, json) = send_json(&state, "GET", "/realtime/data", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["running"], false);
    assert!(json["error"].as_str().unwrap().contains("diverged"));
    assert_eq!(extractions(&work), 0);
}
