use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Last known health of the detection service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServerStatus {
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

impl Default for ServerStatus {
    /// Unknown until checked, so start pessimistic.
    fn default() -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"status":"healthy"}"#, HealthStatus::Healthy, None)]
    #[case(
        r#"{"status":"unhealthy","message":"model not loaded"}"#,
        HealthStatus::Unhealthy,
        Some("model not loaded")
    )]
    fn test_parse(#[case] json: &str, #[case] status: HealthStatus, #[case] message: Option<&str>) {
        let parsed: ServerStatus = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.status, status);
        assert_eq!(parsed.message.as_deref(), message);
    }

    #[test]
    fn test_unknown_status_string_is_rejected() {
        assert!(serde_json::from_str::<ServerStatus>(r#"{"status":"degraded"}"#).is_err());
    }

    #[test]
    fn test_default_is_unhealthy() {
        assert!(!ServerStatus::default().is_healthy());
    }
}
