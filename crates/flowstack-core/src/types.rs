use serde::{Deserialize, Serialize};

/// One unit of an execution's output stream.
///
/// Produced exclusively by the node executor, consumed exclusively by the
/// stream multiplexer. Serialized adjacently tagged so every record on the
/// wire is `{"type": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message", rename_all = "lowercase")]
pub enum ExecutionEvent {
    /// Progress message (path announcement, model provisioning, ...).
    Status(String),
    /// A single decoded token from the generation backend.
    Token(String),
    /// Knowledge-base hits attached to a retrieval node.
    Retrieval(Vec<RetrievalHit>),
    /// The complete accumulated assistant text, emitted once on success.
    Output(String),
    /// Terminal failure once streaming has begun. Nothing follows it.
    Error(String),
    /// Terminal success marker when status streaming is enabled.
    Done(String),
}

impl ExecutionEvent {
    pub fn done() -> Self {
        Self::Done("Execution finished".to_string())
    }
}

/// A streaming delta from the generation backend.
#[derive(Debug, Clone, PartialEq)]
pub enum GenDelta {
    /// Provisioning or readiness progress.
    Status(String),
    /// A chunk of generated text.
    Token(String),
}

/// A single knowledge-base search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Cosine distance — lower is closer.
    pub distance: f64,
}

/// Result of ingesting a document into the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestStats {
    pub chunks_added: usize,
    pub preview: String,
}

/// A persisted stack: a named, opaque graph document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackRecord {
    pub id: i64,
    pub name: String,
    pub blocks: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_string(&ExecutionEvent::Token("4".into())).unwrap();
        assert_eq!(json, r#"{"type":"token","message":"4"}"#);

        let json = serde_json::to_string(&ExecutionEvent::Status("Pulling m1".into())).unwrap();
        assert_eq!(json, r#"{"type":"status","message":"Pulling m1"}"#);

        let json = serde_json::to_string(&ExecutionEvent::done()).unwrap();
        assert_eq!(json, r#"{"type":"done","message":"Execution finished"}"#);
    }

    #[test]
    fn test_event_round_trip() {
        let ev = ExecutionEvent::Error("boom".into());
        let parsed: ExecutionEvent =
            serde_json::from_str(&serde_json::to_string(&ev).unwrap()).unwrap();
        assert_eq!(parsed, ev);
    }

    #[test]
    fn test_retrieval_event_serializes_hits() {
        let ev = ExecutionEvent::Retrieval(vec![RetrievalHit {
            text: "chunk".into(),
            metadata: serde_json::json!({"source": "a.pdf"}),
            distance: 0.25,
        }]);
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "retrieval");
        assert_eq!(json["message"][0]["text"], "chunk");
    }
}
