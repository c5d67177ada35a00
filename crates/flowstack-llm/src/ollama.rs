use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use flowstack_core::config::OllamaConfig;
use flowstack_core::error::{FlowstackError, Result};
use flowstack_core::traits::GenerationBackend;
use flowstack_core::types::GenDelta;

use crate::lines::LineParser;

/// Client for an Ollama-style generation backend.
///
/// One `stream` call covers the whole protocol: list installed models
/// (unreachable backend counts as "none installed"), pull the model if it
/// is absent while relaying pull progress, then run the generation and
/// decode its line-delimited token stream.
#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Installed model names. Any failure here means "no models installed",
    /// never a fatal error — provisioning decides what to do next.
    async fn installed_models(&self) -> Vec<String> {
        let url = format!("{}/api/tags", self.config.base_url);
        let resp = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(self.config.tags_timeout_secs))
            .send()
            .await;

        match resp {
            Ok(resp) => match resp.json::<TagsResponse>().await {
                Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
                Err(e) => {
                    debug!(error = %e, "Unparseable model list, assuming none installed");
                    Vec::new()
                }
            },
            Err(e) => {
                debug!(error = %e, "Model listing unreachable, assuming none installed");
                Vec::new()
            }
        }
    }

    /// Pull a model, relaying each progress line that carries a status.
    /// Returns false when the consumer has gone away.
    async fn pull(&self, model: &str, sink: &DeltaSink) -> Result<bool> {
        let url = format!("{}/api/pull", self.config.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&PullRequest { name: model })
            .timeout(Duration::from_secs(self.config.pull_timeout_secs))
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), model, "Pull request rejected");
        }

        let mut body = resp.bytes_stream();
        let mut parser = LineParser::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(transport_error)?;
            for line in parser.feed(&String::from_utf8_lossy(&chunk)) {
                if let Some(status) = decode_status(&line) {
                    let delta = GenDelta::Status(format!("Pulling {model}: {status}"));
                    if !sink.emit(delta).await {
                        return Ok(false);
                    }
                }
            }
        }
        if let Some(line) = parser.finish() {
            if let Some(status) = decode_status(&line) {
                let delta = GenDelta::Status(format!("Pulling {model}: {status}"));
                if !sink.emit(delta).await {
                    return Ok(false);
                }
            }
        }

        // Declared ready even when the pull stream never confirmed success;
        // the generation call is the real arbiter.
        let ready = GenDelta::Status(format!("Model {model} ready"));
        Ok(sink.emit(ready).await)
    }

    /// Run a generation, decoding every line that carries a response field.
    async fn generate(&self, model: &str, prompt: &str, sink: &DeltaSink) -> Result<()> {
        let url = format!("{}/api/generate", self.config.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&GenerateRequest { model, prompt })
            .timeout(Duration::from_secs(self.config.generate_timeout_secs))
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), model, "Generate request rejected");
        }

        let mut body = resp.bytes_stream();
        let mut parser = LineParser::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(transport_error)?;
            for line in parser.feed(&String::from_utf8_lossy(&chunk)) {
                if let Some(text) = decode_response(&line) {
                    if !sink.emit(GenDelta::Token(text)).await {
                        return Ok(());
                    }
                }
            }
        }
        if let Some(line) = parser.finish() {
            if let Some(text) = decode_response(&line) {
                sink.emit(GenDelta::Token(text)).await;
            }
        }

        Ok(())
    }

    async fn drive(&self, model: &str, prompt: &str, sink: &DeltaSink) -> Result<()> {
        let installed = self.installed_models().await;
        if !installed.iter().any(|m| m == model) {
            debug!(model, "Model not installed, pulling");
            if !self.pull(model, sink).await? {
                return Ok(());
            }
        }
        self.generate(model, prompt, sink).await
    }
}

impl GenerationBackend for OllamaClient {
    fn stream(
        &self,
        model: &str,
        prompt: &str,
    ) -> BoxFuture<'_, Result<BoxStream<'static, Result<GenDelta>>>> {
        let this = self.clone();
        let model = model.to_string();
        let prompt = prompt.to_string();

        Box::pin(async move {
            let (tx, rx) = mpsc::channel(1);
            tokio::spawn(async move {
                let sink = DeltaSink { tx: tx.clone() };
                if let Err(e) = this.drive(&model, &prompt, &sink).await {
                    let _ = tx.send(Err(e)).await;
                }
            });
            Ok(ReceiverStream::new(rx).boxed())
        })
    }
}

/// Sends deltas to the consumer, reporting disconnection instead of erroring.
struct DeltaSink {
    tx: mpsc::Sender<Result<GenDelta>>,
}

impl DeltaSink {
    async fn emit(&self, delta: GenDelta) -> bool {
        self.tx.send(Ok(delta)).await.is_ok()
    }
}

fn transport_error(e: reqwest::Error) -> FlowstackError {
    if e.is_timeout() {
        FlowstackError::BackendTimeout(e.to_string())
    } else {
        FlowstackError::BackendUnavailable(e.to_string())
    }
}

/// The status text of one pull-progress line, if the line decodes to an
/// object carrying one. Malformed lines never abort provisioning.
fn decode_status(line: &str) -> Option<String> {
    serde_json::from_str::<PullProgress>(line)
        .ok()
        .and_then(|p| p.status)
}

/// The token text of one generation line, if the line decodes to an object
/// carrying a response field. Malformed lines never abort the stream.
fn decode_response(line: &str) -> Option<String> {
    serde_json::from_str::<GenerateLine>(line)
        .ok()
        .and_then(|l| l.response)
}

// Wire types

#[derive(Serialize)]
struct PullRequest<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

#[derive(Deserialize)]
struct PullProgress {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: Option<String>,
}
