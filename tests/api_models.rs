//! Artifact inspection and batch runs over the shipped artifacts.

mod common;

use axum::http::StatusCode;
use common::{default_config, send, send_json, state};

#[tokio::test]
async fn lists_shipped_artifacts() {
    let (_work, config) = default_config();
    let state = state(config);
    let (status, json) = send_json(&state, "GET", "/models", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["models"],
        serde_json::json!(["FirstOrder", "PumpWithPIDControl", "RealtimeOscillator"])
    );
}

#[tokio::test]
async fn every_shipped_artifact_describes_and_runs() {
    let (work, config) = default_config();
    let state = state(config);
    for name in ["FirstOrder", "PumpWithPIDControl", "RealtimeOscillator"] {
        let (status, json) = send_json(&state, "GET", &format!("/models/{name}"), "").await;
        assert_eq!(status, StatusCode::OK, "{name}");
        assert_eq!(json["model_name"], name);

        let body = r#"{"stop_time": 0.1, "step_size": 0.01}"#;
        let (status, json) =
            send_json(&state, "POST", &format!("/models/{name}/simulate"), body).await;
        assert_eq!(status, StatusCode::OK, "{name}: {json}");
        assert_eq!(json["time"].as_array().map(Vec::len), Some(11));
    }
    assert_eq!(common::extractions(&work), 0);
}

#[tokio::test]
async fn oscillator_dump_lists_outputs() {
    let (_work, config) = default_config();
    let state = state(config);
    let (status, body) = send(&state, "GET", "/models/RealtimeOscillator/dump", "").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("Model Name        RealtimeOscillator"));
    let outputs: Vec<&str> = text
        .lines()
        .filter(|l| l.starts_with("outputs["))
        .collect();
    assert_eq!(outputs.len(), 4);
    assert!(!text.lines().any(|l| l.starts_with("inputs ")));
}

#[tokio::test]
async fn first_order_default_experiment() {
    let (_work, config) = default_config();
    let state = state(config);
    let (status, json) = send_json(&state, "POST", "/models/FirstOrder/simulate", "").await;
    assert_eq!(status, StatusCode::OK);

    let time = json["time"].as_array().unwrap();
    assert_eq!(time.len(), 1001);
    assert_eq!(time[1000], 10.0);
    let x = json["columns"][0]["values"].as_array().unwrap();
    let expected = 1.0 - (-10.0_f64).exp();
    assert!((x[1000].as_f64().unwrap() - expected).abs() < 1e-9);
}

#[tokio::test]
async fn path_like_names_are_rejected() {
    let (_work, config) = default_config();
    let state = state(config);
    let (status, _) = send_json(&state, "GET", "/models/..%2Fsecrets", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_runs_are_refused() {
    let (work, config) = default_config();
    let state = state(config);

    let body = r#"{"stop_time": 1e30, "step_size": 1e-10}"#;
    let (status, json) = send_json(&state, "POST", "/models/FirstOrder/simulate", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("limit"));

    for name in ["RealtimeOscillator", "PumpWithPIDControl"] {
        let body = r#"{"stop_time": 1e9, "step_size": 1e9}"#;
        let (status, json) =
            send_json(&state, "POST", &format!("/models/{name}/simulate"), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{name}");
        assert!(json["error"].as_str().unwrap().contains("step size"), "{json}");
    }
    assert_eq!(common::extractions(&work), 0);
}
