use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved message type used only to acknowledge keepalives
pub const KEEPALIVE_ACK: &str = "pong";

/// Server-pushed notification received over the socket
///
/// The wire format is a flat JSON object `{"type": "...", ...fields}`. Known job
/// notifications get typed payloads; everything else is kept as `Other`.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Keepalive acknowledgment, never dispatched to handlers
    KeepaliveAck,

    /// Background job made progress (file ingestion, training)
    Progress(JobProgress),

    /// Background job finished
    Complete(JobComplete),

    /// Background job failed
    Error(JobFailure),

    /// Any other notification type
    Other { kind: String, body: Map<String, Value> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    #[serde(default)]
    pub kb_id: Option<i64>,
    #[serde(default)]
    pub stage: String,
    /// Percentage in 0..=100
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobComplete {
    #[serde(default)]
    pub kb_id: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    #[serde(default)]
    pub kb_id: Option<i64>,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub detail: Option<String>,
}

impl JobFailure {
    /// `error - detail`, or just `error` when there is no detail
    pub fn describe(&self) -> String {
        match self.detail.as_deref() {
            Some(detail) if !detail.is_empty() => format!("{} - {}", self.error, detail),
            _ => self.error.clone(),
        }
    }
}

impl Notification {
    /// Decode one socket frame
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let mut body: Map<String, Value> = serde_json::from_str(text)?;

        let kind = match body.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(other) => {
                return Err(serde::de::Error::custom(format!(
                    "notification type must be a string, got {}",
                    other
                )))
            }
            None => return Err(serde::de::Error::missing_field("type")),
        };

        let notification = match kind.as_str() {
            KEEPALIVE_ACK => Notification::KeepaliveAck,
            "progress" => Notification::Progress(serde_json::from_value(Value::Object(body))?),
            "complete" => Notification::Complete(serde_json::from_value(Value::Object(body))?),
            "error" => Notification::Error(serde_json::from_value(Value::Object(body))?),
            _ => Notification::Other { kind, body },
        };

        Ok(notification)
    }

    /// Wire `type` of this notification; used as the handler registry key
    pub fn kind(&self) -> &str {
        match self {
            Self::KeepaliveAck => KEEPALIVE_ACK,
            Self::Progress(_) => "progress",
            Self::Complete(_) => "complete",
            Self::Error(_) => "error",
            Self::Other { kind, .. } => kind,
        }
    }

    /// Knowledge base the notification refers to, if any
    pub fn kb_id(&self) -> Option<i64> {
        match self {
            Self::Progress(p) => p.kb_id,
            Self::Complete(c) => c.kb_id,
            Self::Error(e) => e.kb_id,
            Self::Other { body, .. } => body.get("kb_id").and_then(Value::as_i64),
            Self::KeepaliveAck => None,
        }
    }
}
