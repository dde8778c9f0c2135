use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::{
    executor::{ExecutionResult, ExtraVars},
    Error, Result,
};

pub const UNKNOWN_ALERT_NAME: &str = "Unknown";
pub const UNKNOWN_LABEL: &str = "unknown";
pub const NO_ACTION: &str = "none";
pub const NO_ACTION_MESSAGE: &str = "No recovery action defined";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertStatus {
    Firing,
    Resolved,
    Other(String),
}

impl From<&str> for AlertStatus {
    fn from(value: &str) -> Self {
        match value {
            "firing" => AlertStatus::Firing,
            "resolved" => AlertStatus::Resolved,
            other => AlertStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for AlertStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "firing" => AlertStatus::Firing,
            "resolved" => AlertStatus::Resolved,
            _ => AlertStatus::Other(value),
        }
    }
}

impl From<AlertStatus> for String {
    fn from(status: AlertStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Firing => f.write_str("firing"),
            AlertStatus::Resolved => f.write_str("resolved"),
            AlertStatus::Other(other) => f.write_str(other),
        }
    }
}

impl AlertStatus {
    /// Status of a raw alert entry; anything but a string reads as `unknown`.
    pub fn of(raw: &Value) -> Self {
        raw.get("status")
            .and_then(Value::as_str)
            .map(AlertStatus::from)
            .unwrap_or_else(|| AlertStatus::Other(UNKNOWN_LABEL.to_string()))
    }
}

/// Labels and annotations of one alert. Values stay raw so an unrelated
/// non-string label cannot spoil the alert; the keys read here must be
/// strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub labels: HashMap<String, Value>,
    #[serde(default)]
    pub annotations: HashMap<String, Value>,
}

impl Alert {
    /// Decodes one alert entry. Fails only when `labels`/`annotations` are
    /// not objects or `alertname`/`recovery_action` are not strings.
    pub fn from_raw(raw: &Value) -> std::result::Result<Self, String> {
        let alert = Alert::deserialize(raw).map_err(|e| e.to_string())?;

        for (map, key) in [
            (&alert.labels, "alertname"),
            (&alert.annotations, "recovery_action"),
        ] {
            if let Some(value) = map.get(key) {
                if !value.is_string() {
                    return Err(format!("`{key}` must be a string, got {value}"));
                }
            }
        }

        Ok(alert)
    }

    pub fn alert_name(&self) -> &str {
        self.labels
            .get("alertname")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_ALERT_NAME)
    }

    pub fn recovery_action(&self) -> &str {
        self.annotations
            .get("recovery_action")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    fn label_or_unknown(&self, key: &str) -> String {
        self.labels
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_LABEL)
            .to_string()
    }

    /// Context passed to the recovery playbook.
    pub fn extra_vars(&self, now: DateTime<Utc>) -> ExtraVars {
        let mut vars = ExtraVars::new();
        vars.insert("alert_name".to_string(), self.alert_name().to_string());
        vars.insert("severity".to_string(), self.label_or_unknown("severity"));
        vars.insert("service".to_string(), self.label_or_unknown("service"));
        vars.insert("instance".to_string(), self.label_or_unknown("instance"));
        vars.insert("timestamp".to_string(), now.to_rfc3339());
        vars
    }
}

/// Category tag carried by the endpoint a batch arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    General,
    Critical,
    Warning,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::General => "general",
            AlertType::Critical => "critical",
            AlertType::Warning => "warning",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `alerts` of one webhook call, kept raw so each entry is decoded on
/// its own.
#[derive(Debug, Clone, Default)]
pub struct AlertBatch {
    alerts: Vec<Value>,
}

impl AlertBatch {
    pub fn new(alerts: Vec<Value>) -> Self {
        Self { alerts }
    }

    pub fn from_slice(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::NoData);
        }

        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| Error::Validation(format!("Invalid JSON payload: {e}")))?;

        Self::from_value(payload)
    }

    pub fn from_value(payload: Value) -> Result<Self> {
        if is_empty_payload(&payload) {
            return Err(Error::NoData);
        }

        let Value::Object(mut payload) = payload else {
            return Err(Error::Validation(
                "Invalid payload: expected a JSON object".to_string(),
            ));
        };

        match payload.remove("alerts") {
            None => Ok(Self::default()),
            Some(Value::Array(alerts)) => Ok(Self::new(alerts)),
            Some(_) => Err(Error::Validation(
                "Invalid payload: `alerts` must be an array".to_string(),
            )),
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn into_alerts(self) -> Vec<Value> {
        self.alerts
    }
}

/// `null`, `false`, `0`, `""`, `[]` and `{}` all count as "nothing sent".
fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Per-alert record in the webhook response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertOutcome {
    pub alert: String,
    pub action: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AlertOutcome {
    pub fn executed(alert: &str, action: &str, result: ExecutionResult) -> Self {
        Self {
            alert: alert.to_string(),
            action: action.to_string(),
            success: result.success,
            output: Some(result.output),
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn no_action(alert: &str) -> Self {
        Self::not_executed(alert, NO_ACTION_MESSAGE.to_string())
    }

    pub fn malformed(alert: &str, reason: impl fmt::Display) -> Self {
        Self::not_executed(alert, format!("Malformed alert: {reason}"))
    }

    fn not_executed(alert: &str, message: String) -> Self {
        Self {
            alert: alert.to_string(),
            action: NO_ACTION.to_string(),
            success: false,
            output: None,
            message: Some(message),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub status: String,
    pub alert_type: AlertType,
    pub responses: Vec<AlertOutcome>,
}

impl BatchResponse {
    pub fn processed(alert_type: AlertType, responses: Vec<AlertOutcome>) -> Self {
        Self {
            status: "processed".to_string(),
            alert_type,
            responses,
        }
    }
}
