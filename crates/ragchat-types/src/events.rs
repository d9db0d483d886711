use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One decoded unit of the chat stream.
///
/// On the wire every record is `{"type": "...", "data": ...}`; the shape of `data`
/// depends on `type`. Conversion goes through [`WireFrame`] so that a missing or
/// empty `data` on `done` is accepted and an unknown `type` is reported as an error
/// instead of silently matching a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireFrame", into = "WireFrame")]
pub enum StreamEvent {
    /// Retrieved passages backing the answer
    Sources(SourcesPayload),

    /// Partial chunk of the answer (may split mid-word or mid-markup)
    Text(String),

    /// Terminal success signal
    Done,

    /// Terminal application error reported by the server
    Error(ErrorPayload),
}

impl StreamEvent {
    pub fn text(fragment: impl Into<String>) -> Self {
        Self::Text(fragment.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            error: message.into(),
        })
    }

    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sources(_) => "sources",
            Self::Text(_) => "text",
            Self::Done => "done",
            Self::Error(_) => "error",
        }
    }

    /// `done` and `error` end the stream; nothing is delivered after them
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesPayload {
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub retrieval_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

/// A retrieved passage with its similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub similarity: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Source {
    pub fn new(content: impl Into<String>, similarity: f64) -> Self {
        Self {
            content: content.into(),
            similarity,
            metadata: Map::new(),
        }
    }

    /// Graph-derived fields, when the passage came from the knowledge graph
    pub fn graph_metadata(&self) -> Option<GraphMetadata> {
        let graph: GraphMetadata = serde_json::from_value(Value::Object(self.metadata.clone())).ok()?;
        if graph.is_empty() {
            None
        } else {
            Some(graph)
        }
    }
}

/// Optional graph fields carried in [`Source::metadata`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_entity: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hop: Option<u32>,
}

impl GraphMetadata {
    pub fn is_empty(&self) -> bool {
        self.entity.is_none()
            && self.source_entity.is_none()
            && self.target_entity.is_none()
            && self.relations.is_empty()
            && self.hop.is_none()
    }
}

/// Raw `{"type", "data"}` envelope as it appears after `data: `
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl TryFrom<WireFrame> for StreamEvent {
    type Error = String;

    fn try_from(frame: WireFrame) -> Result<Self, String> {
        match frame.kind.as_str() {
            "sources" => serde_json::from_value(frame.data)
                .map(StreamEvent::Sources)
                .map_err(|e| format!("invalid sources payload: {}", e)),
            "text" => match frame.data {
                Value::String(s) => Ok(StreamEvent::Text(s)),
                other => Err(format!("text payload must be a string, got {}", other)),
            },
            "done" => Ok(StreamEvent::Done),
            "error" => serde_json::from_value(frame.data)
                .map(StreamEvent::Error)
                .map_err(|e| format!("invalid error payload: {}", e)),
            other => Err(format!("unknown event type: {}", other)),
        }
    }
}

impl From<StreamEvent> for WireFrame {
    fn from(event: StreamEvent) -> Self {
        let kind = event.kind().to_string();
        let data = match event {
            StreamEvent::Sources(payload) => serde_json::to_value(payload).unwrap_or(Value::Null),
            StreamEvent::Text(s) => Value::String(s),
            StreamEvent::Done => Value::Object(Map::new()),
            StreamEvent::Error(payload) => serde_json::to_value(payload).unwrap_or(Value::Null),
        };
        Self { kind, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_sources() {
        let json = r#"{"type":"sources","data":{"sources":[{"content":"A","similarity":0.9,"metadata":{}}],"retrieval_count":1}}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();

        match event {
            StreamEvent::Sources(payload) => {
                assert_eq!(payload.retrieval_count, 1);
                assert_eq!(payload.sources.len(), 1);
                assert_eq!(payload.sources[0].content, "A");
            }
            _ => panic!("Expected Sources variant"),
        }
    }

    #[test]
    fn test_decode_done_with_and_without_data() {
        let with: StreamEvent = serde_json::from_str(r#"{"type":"done","data":{}}"#).unwrap();
        let without: StreamEvent = serde_json::from_str(r#"{"type":"done"}"#).unwrap();
        assert_eq!(with, StreamEvent::Done);
        assert_eq!(without, StreamEvent::Done);
    }

    #[test]
    fn test_decode_error() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"error","data":{"error":"rate limited"}}"#).unwrap();
        assert_eq!(event, StreamEvent::error("rate limited"));
        assert!(event.is_terminal());
    }

    #[test]
    fn test_wire_frame_conversion() {
        let frame = WireFrame {
            kind: "text".to_string(),
            data: Value::String("Hel".to_string()),
        };
        assert_eq!(StreamEvent::try_from(frame), Ok(StreamEvent::text("Hel")));

        let bad = WireFrame {
            kind: "text".to_string(),
            data: serde_json::json!({"n": 1}),
        };
        let err = StreamEvent::try_from(bad).unwrap_err();
        assert!(err.contains("must be a string"));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_json::from_str::<StreamEvent>(r#"{"type":"thinking","data":"..."}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_text_must_be_string() {
        let result = serde_json::from_str::<StreamEvent>(r#"{"type":"text","data":{"x":1}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_text_uses_wire_shape() {
        let json = serde_json::to_string(&StreamEvent::text("Hel")).unwrap();
        assert_eq!(json, r#"{"type":"text","data":"Hel"}"#);
    }

    #[test]
    fn test_graph_metadata() {
        let mut source = Source::new("Paris is the capital", 0.8);
        assert!(source.graph_metadata().is_none());

        source.metadata.insert("entity".into(), Value::String("Paris".into()));
        source.metadata.insert("hop".into(), Value::from(2));
        let graph = source.graph_metadata().unwrap();
        assert_eq!(graph.entity.as_deref(), Some("Paris"));
        assert_eq!(graph.hop, Some(2));
    }
}
