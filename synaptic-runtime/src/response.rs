//! Serializable run response, `{success, result, error}`

use serde::{Deserialize, Serialize};

use synaptic_core::RunResult;

use crate::EngineError;

/// Outcome of a run as reported to callers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    pub success: bool,
    /// Zero counts when the run failed
    pub result: RunResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<RunResult, EngineError>> for RunResponse {
    fn from(outcome: Result<RunResult, EngineError>) -> Self {
        match outcome {
            Ok(result) => Self {
                success: true,
                result,
                error: None,
            },
            Err(e) => Self {
                success: false,
                result: RunResult::default(),
                error: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synaptic_store::StoreError;

    #[test]
    fn test_success_shape() {
        let response = RunResponse::from(Ok(RunResult {
            edges_created: 3,
            ..Default::default()
        }));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["result"]["edges_created"], 3);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failure_reports_zeros() {
        let response = RunResponse::from(Err(EngineError::Store(StoreError::Unavailable(
            "connection refused".to_string(),
        ))));
        assert!(!response.success);
        assert_eq!(response.result, RunResult::default());
        assert!(response.error.unwrap().contains("connection refused"));
    }
}
