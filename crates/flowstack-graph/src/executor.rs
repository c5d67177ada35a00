use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use flowstack_core::error::{FlowstackError, Result};
use flowstack_core::traits::GenerationBackend;
use flowstack_core::types::{ExecutionEvent, GenDelta};

use crate::model::{Graph, Node, NodeKind};
use crate::path::resolve;

/// Fallback model when a generation node does not name one.
pub const DEFAULT_MODEL: &str = "llama3";

/// Fallback system instruction when a generation node does not carry one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// A validated graph reduced to what one execution run needs: the resolved
/// path and the nodes on it.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub path: Vec<String>,
    pub nodes: HashMap<String, Node>,
}

/// Validate a graph and resolve its execution path.
///
/// Everything here fails synchronously, before any response stream opens
/// and before any backend call: malformed graphs, missing endpoints, and
/// unresolvable paths are client errors.
pub fn prepare(graph: &Graph) -> Result<ExecutionPlan> {
    graph.validate()?;

    let query_id = graph.first_of_kind(NodeKind::Query).map(|n| n.id.clone());
    let output_id = graph.first_of_kind(NodeKind::Output).map(|n| n.id.clone());
    let (start, goal) = match (query_id, output_id) {
        (Some(q), Some(o)) => (q, o),
        _ => {
            return Err(FlowstackError::MalformedGraph(
                "Query or Output node missing".to_string(),
            ))
        }
    };

    let adjacency = graph.adjacency();
    let path = resolve(&adjacency, &start, &goal).ok_or(FlowstackError::PathUnresolved)?;
    debug!(path = %path.join(" → "), "Execution path resolved");

    let nodes = graph
        .nodes
        .iter()
        .map(|n| (n.id.clone(), n.clone()))
        .collect();

    Ok(ExecutionPlan { path, nodes })
}

/// Mutable accumulator for one execution run. Owned by exactly one run and
/// discarded with it; never shared across concurrent executions.
#[derive(Debug, Default)]
struct RunningContext {
    user_query: String,
    assistant_text: String,
}

/// Sends events to the caller, reporting disconnection instead of erroring.
struct EventSink {
    tx: mpsc::Sender<ExecutionEvent>,
}

impl EventSink {
    /// Returns false when the caller has gone away; the run should stop.
    async fn emit(&self, event: ExecutionEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

/// Walks a resolved path and streams execution events.
///
/// One executor instance can serve many runs; each `execute` call owns its
/// context and its backend stream.
pub struct NodeExecutor {
    backend: Arc<dyn GenerationBackend>,
}

impl NodeExecutor {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Execute a plan, yielding events as they become available.
    ///
    /// The returned stream is fed through a capacity-1 channel, so an event
    /// is handed to the consumer before the next backend read begins. Once
    /// streaming has started every failure is delivered as one terminal
    /// `Error` event; nothing follows it, and tokens already emitted stand.
    /// Dropping the stream stops the run and abandons the backend read.
    pub fn execute(
        &self,
        plan: ExecutionPlan,
        query: Option<String>,
        stream_logs: bool,
    ) -> BoxStream<'static, ExecutionEvent> {
        let backend = self.backend.clone();
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            let sink = EventSink { tx: tx.clone() };
            if let Err(e) = drive(backend, plan, query, stream_logs, &sink).await {
                let _ = tx.send(ExecutionEvent::Error(e.to_string())).await;
            }
        });

        ReceiverStream::new(rx).boxed()
    }
}

/// One pass over the path. Errors returned here become the run's single
/// terminal `Error` event; an early `Ok` after a failed emit means the
/// caller disconnected and the run just stops.
async fn drive(
    backend: Arc<dyn GenerationBackend>,
    plan: ExecutionPlan,
    query: Option<String>,
    stream_logs: bool,
    sink: &EventSink,
) -> Result<()> {
    let mut ctx = RunningContext::default();

    // Seed the query: explicit request value wins, then the query node's
    // configured default. Empty is a failure before any backend call.
    ctx.user_query = match query.filter(|q| !q.is_empty()) {
        Some(q) => q,
        None => plan
            .path
            .first()
            .and_then(|id| plan.nodes.get(id))
            .and_then(|n| n.str_data("value"))
            .unwrap_or_default()
            .to_string(),
    };
    if ctx.user_query.is_empty() {
        return Err(FlowstackError::MissingQuery);
    }

    if stream_logs
        && !sink
            .emit(ExecutionEvent::Status(format!(
                "Path: {}",
                plan.path.join(" → ")
            )))
            .await
    {
        return Ok(());
    }

    // First generation node anywhere on the path. A retrieval node on the
    // path does not feed the prompt; only the generation node's own config
    // and the user query do.
    let gen_node = plan
        .path
        .iter()
        .filter_map(|id| plan.nodes.get(id))
        .find(|n| n.kind == NodeKind::Generation)
        .ok_or(FlowstackError::MissingGenerationNode)?;

    let model = gen_node.str_data("model").unwrap_or(DEFAULT_MODEL);
    let system = gen_node.str_data("prompt").unwrap_or(DEFAULT_SYSTEM_PROMPT);
    let prompt = format!("{system}\n\nUser: {}\n", ctx.user_query);

    info!(model, hops = plan.path.len(), "Starting generation");

    let mut deltas = backend.stream(model, &prompt).await?;
    while let Some(delta) = deltas.next().await {
        match delta? {
            GenDelta::Status(s) => {
                if !sink.emit(ExecutionEvent::Status(s)).await {
                    return Ok(());
                }
            }
            GenDelta::Token(t) => {
                ctx.assistant_text.push_str(&t);
                if !sink.emit(ExecutionEvent::Token(t)).await {
                    return Ok(());
                }
            }
        }
    }

    if !sink
        .emit(ExecutionEvent::Output(ctx.assistant_text.clone()))
        .await
    {
        return Ok(());
    }
    if stream_logs {
        sink.emit(ExecutionEvent::done()).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::StreamExt;

    use flowstack_core::types::GenDelta;
    use flowstack_test_utils::MockBackend;

    use crate::model::{Edge, Graph, Node, NodeKind};

    fn linear_graph(query_default: Option<&str>) -> Graph {
        let mut query = Node::new("query-1", NodeKind::Query);
        if let Some(v) = query_default {
            query = query.with_data("value", v);
        }
        Graph::new(
            vec![
                query,
                Node::new("llm-1", NodeKind::Generation)
                    .with_data("model", "m1")
                    .with_data("prompt", "You are terse."),
                Node::new("out-1", NodeKind::Output),
            ],
            vec![Edge::new("query-1", "llm-1"), Edge::new("llm-1", "out-1")],
        )
    }

    async fn collect(
        backend: Arc<MockBackend>,
        graph: &Graph,
        query: Option<&str>,
        stream_logs: bool,
    ) -> Vec<ExecutionEvent> {
        let plan = prepare(graph).unwrap();
        let executor = NodeExecutor::new(backend);
        executor
            .execute(plan, query.map(String::from), stream_logs)
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_happy_path_event_sequence() {
        let backend = Arc::new(MockBackend::with_tokens(&["4"]));
        let events = collect(backend.clone(), &linear_graph(None), Some("2+2?"), true).await;

        assert_eq!(
            events,
            vec![
                ExecutionEvent::Status("Path: query-1 → llm-1 → out-1".into()),
                ExecutionEvent::Token("4".into()),
                ExecutionEvent::Output("4".into()),
                ExecutionEvent::done(),
            ]
        );
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_stream_logs_disabled_drops_status_and_done() {
        let backend = Arc::new(MockBackend::with_tokens(&["4"]));
        let events = collect(backend, &linear_graph(None), Some("2+2?"), false).await;

        assert_eq!(
            events,
            vec![
                ExecutionEvent::Token("4".into()),
                ExecutionEvent::Output("4".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_output_is_concatenation_of_tokens_in_order() {
        let backend = Arc::new(MockBackend::with_tokens(&["Hel", "lo", ", ", "world"]));
        let events = collect(backend, &linear_graph(None), Some("hi"), false).await;

        let tokens: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::Token(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tokens, vec!["Hel", "lo", ", ", "world"]);

        let output = events
            .iter()
            .find_map(|e| match e {
                ExecutionEvent::Output(o) => Some(o.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(output, tokens.concat());
    }

    #[tokio::test]
    async fn test_provisioning_statuses_flow_through_in_order() {
        let backend = Arc::new(MockBackend::with_script(vec![
            Ok(GenDelta::Status("Pulling m1: downloading".into())),
            Ok(GenDelta::Status("Pulling m1: verifying".into())),
            Ok(GenDelta::Status("Model m1 ready".into())),
            Ok(GenDelta::Token("4".into())),
        ]));
        let events = collect(backend, &linear_graph(None), Some("2+2?"), true).await;

        assert_eq!(
            events,
            vec![
                ExecutionEvent::Status("Path: query-1 → llm-1 → out-1".into()),
                ExecutionEvent::Status("Pulling m1: downloading".into()),
                ExecutionEvent::Status("Pulling m1: verifying".into()),
                ExecutionEvent::Status("Model m1 ready".into()),
                ExecutionEvent::Token("4".into()),
                ExecutionEvent::Output("4".into()),
                ExecutionEvent::done(),
            ]
        );
    }

    #[tokio::test]
    async fn test_query_falls_back_to_node_default() {
        let backend = Arc::new(MockBackend::with_tokens(&["ok"]));
        let events = collect(backend, &linear_graph(Some("configured?")), None, false).await;
        assert!(matches!(events[0], ExecutionEvent::Token(_)));
    }

    #[tokio::test]
    async fn test_missing_query_errors_before_backend_call() {
        let backend = Arc::new(MockBackend::with_tokens(&["never"]));
        let events = collect(backend.clone(), &linear_graph(None), None, true).await;

        assert_eq!(
            events,
            vec![ExecutionEvent::Error("Missing user query".into())]
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_request_query_falls_back_then_errors() {
        let backend = Arc::new(MockBackend::with_tokens(&["never"]));
        let events = collect(backend.clone(), &linear_graph(None), Some(""), true).await;
        assert_eq!(
            events,
            vec![ExecutionEvent::Error("Missing user query".into())]
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_generation_node_errors_after_path_status() {
        let graph = Graph::new(
            vec![
                Node::new("q", NodeKind::Query).with_data("value", "hi"),
                Node::new("o", NodeKind::Output),
            ],
            vec![Edge::new("q", "o")],
        );
        let backend = Arc::new(MockBackend::with_tokens(&["never"]));
        let events = collect(backend.clone(), &graph, None, true).await;

        assert_eq!(
            events,
            vec![
                ExecutionEvent::Status("Path: q → o".into()),
                ExecutionEvent::Error("No generation node in path".into()),
            ]
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_is_terminal_error_event() {
        let backend = Arc::new(MockBackend::failing("connection refused"));
        let events = collect(backend, &linear_graph(None), Some("hi"), true).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ExecutionEvent::Status(_)));
        match &events[1] {
            ExecutionEvent::Error(msg) => assert!(msg.contains("connection refused")),
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_earlier_tokens_and_skips_done() {
        let backend = Arc::new(MockBackend::with_script(vec![
            Ok(GenDelta::Token("par".into())),
            Ok(GenDelta::Token("tial".into())),
            Err("backend dropped the connection".into()),
        ]));
        let events = collect(backend, &linear_graph(None), Some("hi"), true).await;

        assert_eq!(events[1], ExecutionEvent::Token("par".into()));
        assert_eq!(events[2], ExecutionEvent::Token("tial".into()));
        match events.last().unwrap() {
            ExecutionEvent::Error(msg) => assert!(msg.contains("dropped")),
            other => panic!("expected error event, got {other:?}"),
        }
        // No output and no done after an error.
        assert!(!events
            .iter()
            .any(|e| matches!(e, ExecutionEvent::Output(_) | ExecutionEvent::Done(_))));
    }

    #[tokio::test]
    async fn test_prepare_rejects_malformed_graph_without_backend_call() {
        let backend = Arc::new(MockBackend::with_tokens(&["never"]));
        let mut graph = linear_graph(None);
        graph.nodes.retain(|n| n.kind != NodeKind::Output);

        let err = prepare(&graph).unwrap_err();
        assert!(matches!(err, FlowstackError::MalformedGraph(_)));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_prepare_rejects_disconnected_graph() {
        let graph = Graph::new(
            vec![
                Node::new("q", NodeKind::Query),
                Node::new("g", NodeKind::Generation),
                Node::new("o", NodeKind::Output),
            ],
            vec![Edge::new("g", "o")],
        );
        let err = prepare(&graph).unwrap_err();
        assert!(matches!(err, FlowstackError::PathUnresolved));
    }

    #[tokio::test]
    async fn test_generation_node_located_anywhere_on_path() {
        // Generation node is the fourth hop, not the second.
        let graph = Graph::new(
            vec![
                Node::new("q", NodeKind::Query),
                Node::new("kb", NodeKind::Retrieval),
                Node::new("x", NodeKind::Other),
                Node::new("g", NodeKind::Generation).with_data("model", "m1"),
                Node::new("o", NodeKind::Output),
            ],
            vec![
                Edge::new("q", "kb"),
                Edge::new("kb", "x"),
                Edge::new("x", "g"),
                Edge::new("g", "o"),
            ],
        );
        let backend = Arc::new(MockBackend::with_tokens(&["ok"]));
        let events = collect(backend.clone(), &graph, Some("hi"), false).await;
        assert_eq!(
            events,
            vec![
                ExecutionEvent::Token("ok".into()),
                ExecutionEvent::Output("ok".into()),
            ]
        );
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_prompt_assembly_uses_fixed_template() {
        let backend = Arc::new(MockBackend::with_tokens(&["ok"]));
        let _ = collect(backend.clone(), &linear_graph(None), Some("2+2?"), false).await;
        let (model, prompt) = backend.last_request().unwrap();
        assert_eq!(model, "m1");
        assert_eq!(prompt, "You are terse.\n\nUser: 2+2?\n");
    }

    #[tokio::test]
    async fn test_prompt_defaults_when_generation_node_is_bare() {
        let graph = Graph::new(
            vec![
                Node::new("q", NodeKind::Query),
                Node::new("g", NodeKind::Generation),
                Node::new("o", NodeKind::Output),
            ],
            vec![Edge::new("q", "g"), Edge::new("g", "o")],
        );
        let backend = Arc::new(MockBackend::with_tokens(&["ok"]));
        let _ = collect(backend.clone(), &graph, Some("hi"), false).await;
        let (model, prompt) = backend.last_request().unwrap();
        assert_eq!(model, DEFAULT_MODEL);
        assert!(prompt.starts_with(DEFAULT_SYSTEM_PROMPT));
    }
}
