//! API request and response types.
//!
//! Legacy routes keep the field names the single-page front ends send
//! (`session_id`, `input_value`, `new_value`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::session::StepOutcome;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

/// `POST /sessions` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StartRequest {
    /// Session profile; the configured default when absent.
    pub profile: Option<String>,
}

/// `POST /sessions/{id}/step` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StepRequest {
    /// Value applied to the session input; `0.0` when absent.
    pub input_value: f64,
}

/// `POST /start-simulation` response.
#[derive(Debug, Serialize)]
pub struct LegacyStartResponse {
    pub message: &'static str,
    pub session_id: String,
}

/// `POST /step-simulation` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LegacyStepRequest {
    pub session_id: Option<String>,
    pub input_value: f64,
}

/// Flat step result of `POST /step-simulation`:
/// `{"time": .., "<input>": .., "<output>": .., "done": ..}`.
#[derive(Debug, Serialize)]
pub struct LegacyStepResponse {
    pub time: f64,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
    pub done: bool,
}

impl From<StepOutcome> for LegacyStepResponse {
    fn from(outcome: StepOutcome) -> Self {
        let mut values = outcome.outputs;
        values.insert(outcome.input, outcome.input_value);
        Self {
            time: outcome.time,
            values,
            done: outcome.done,
        }
    }
}

/// `GET /sessions` response.
#[derive(Debug, Serialize)]
pub struct SessionList {
    pub sessions: Vec<String>,
}

/// `GET /models` response.
#[derive(Debug, Serialize)]
pub struct ModelList {
    pub models: Vec<String>,
}

/// `GET /models/{name}/variables` response.
#[derive(Debug, Serialize)]
pub struct VariableList {
    pub model_name: String,
    pub variables: Vec<String>,
}

/// Query of `POST /models/{name}/simulate`.
#[derive(Debug, Default, Deserialize)]
pub struct SimulateQuery {
    /// `csv` for a CSV body; JSON otherwise.
    pub format: Option<String>,
}

/// `POST /realtime/update` body.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub value: f64,
}

/// Status reply of the real-time control routes.
#[derive(Debug, Serialize)]
pub struct RealtimeStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<f64>,
}

/// Query of `GET /calc/nh3-balance`.
#[derive(Debug, Default, Deserialize)]
pub struct BalanceQuery {
    /// Electrolysis power (MW).
    pub mw: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_step_response_is_flat() {
        let outcome = StepOutcome {
            session_id: "abc".to_string(),
            time: 0.001,
            input: "flowSetpoint".to_string(),
            input_value: 0.5,
            outputs: BTreeMap::from([
                ("actualFlow".to_string(), 0.01),
                ("powerConsumption".to_string(), 2.0),
            ]),
            done: false,
        };
        let json = serde_json::to_value(LegacyStepResponse::from(outcome)).expect("serializes");
        assert_eq!(
            json,
            serde_json::json!({
                "time": 0.001,
                "flowSetpoint": 0.5,
                "actualFlow": 0.01,
                "powerConsumption": 2.0,
                "done": false
            })
        );
    }

    #[test]
    fn step_request_defaults_input_value() {
        let req: StepRequest = serde_json::from_str("{}").expect("parses");
        assert_eq!(req.input_value, 0.0);
        let req: LegacyStepRequest =
            serde_json::from_str(r#"{"session_id": "x"}"#).expect("parses");
        assert_eq!(req.session_id.as_deref(), Some("x"));
        assert_eq!(req.input_value, 0.0);
    }
}
