use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use quire_pipeline::{InvocationError, Invoker, ResponseKind, WorkerRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::WorkerError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for [`HttpInvoker`].
#[derive(Debug, Clone)]
pub struct HttpInvokerConfig {
  /// API root; requests go to `{base_url}/chat/completions`.
  pub base_url: String,
  /// Sent as a bearer token when present.
  pub api_key: Option<String>,
  pub model: String,
  /// Directory holding one instructions file per worker.
  pub prompts_dir: PathBuf,
  /// Per-request timeout.
  pub timeout: Duration,
}

impl Default for HttpInvokerConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      api_key: None,
      model: DEFAULT_MODEL.to_string(),
      prompts_dir: PathBuf::from("prompts"),
      timeout: Duration::from_secs(300),
    }
  }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessage>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
  role: &'static str,
  content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")]
  kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
  message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
  content: Option<String>,
}

/// Invokes workers through an OpenAI-compatible chat completions endpoint.
pub struct HttpInvoker {
  client: reqwest::Client,
  config: HttpInvokerConfig,
}

impl HttpInvoker {
  pub fn new(config: HttpInvokerConfig) -> Result<Self, WorkerError> {
    if config.model.trim().is_empty() {
      return Err(WorkerError::InvalidConfig {
        message: "model must not be empty".to_string(),
      });
    }
    let client = reqwest::Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &HttpInvokerConfig {
    &self.config
  }

  /// Location of a worker's instructions.
  pub fn prompt_path(&self, worker: &str) -> PathBuf {
    self.config.prompts_dir.join(format!("{}.md", slug(worker)))
  }

  async fn instructions(&self, worker: &WorkerRef) -> Result<String, InvocationError> {
    let path = self.prompt_path(&worker.name);
    tokio::fs::read_to_string(&path).await.map_err(|e| {
      InvocationError::failed(
        &worker.name,
        format!("cannot read instructions '{}': {}", path.display(), e),
      )
    })
  }

  fn endpoint(&self) -> String {
    format!(
      "{}/chat/completions",
      self.config.base_url.trim_end_matches('/')
    )
  }

  fn transport_error(&self, worker: &WorkerRef, e: reqwest::Error) -> InvocationError {
    if e.is_timeout() {
      InvocationError::timeout(&worker.name, self.config.timeout)
    } else {
      InvocationError::Transport {
        worker: worker.name.clone(),
        source: Box::new(e),
      }
    }
  }
}

#[async_trait]
impl Invoker for HttpInvoker {
  #[instrument(name = "http_invoke", skip(self, worker, input), fields(worker = %worker.name))]
  async fn invoke(&self, worker: &WorkerRef, input: Value) -> Result<Value, InvocationError> {
    let instructions = self.instructions(worker).await?;
    let user = match input {
      Value::String(text) => text,
      other => serde_json::to_string_pretty(&other)
        .map_err(|e| InvocationError::failed(&worker.name, e.to_string()))?,
    };

    let request = ChatRequest {
      model: &self.config.model,
      messages: vec![
        ChatMessage {
          role: "system",
          content: instructions,
        },
        ChatMessage {
          role: "user",
          content: user,
        },
      ],
      response_format: match worker.response {
        ResponseKind::Structured => Some(ResponseFormat {
          kind: "json_object",
        }),
        ResponseKind::Text => None,
      },
    };

    let mut builder = self.client.post(self.endpoint()).json(&request);
    if let Some(api_key) = &self.config.api_key {
      builder = builder.bearer_auth(api_key);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| self.transport_error(worker, e))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(InvocationError::failed(
        &worker.name,
        format!("HTTP {}: {}", status, body.trim()),
      ));
    }

    let completion: ChatResponse = response
      .json()
      .await
      .map_err(|e| self.transport_error(worker, e))?;

    let content = completion
      .choices
      .into_iter()
      .next()
      .and_then(|choice| choice.message.content)
      .ok_or_else(|| InvocationError::failed(&worker.name, "reply has no content"))?;

    debug!(chars = content.len(), "worker_replied");

    match worker.response {
      ResponseKind::Text => Ok(Value::String(content)),
      ResponseKind::Structured => serde_json::from_str(strip_code_fence(&content)).map_err(|e| {
        InvocationError::failed(&worker.name, format!("reply is not valid JSON: {}", e))
      }),
    }
  }
}

/// Lowercase kebab-case form of a worker name, used for its instructions file.
///
/// `"Paper Summarizer Agent"` becomes `"paper-summarizer-agent"`.
pub fn slug(name: &str) -> String {
  let mut slug = String::with_capacity(name.len());
  for c in name.chars() {
    if c.is_ascii_alphanumeric() {
      slug.push(c.to_ascii_lowercase());
    } else if !slug.is_empty() && !slug.ends_with('-') {
      slug.push('-');
    }
  }
  while slug.ends_with('-') {
    slug.pop();
  }
  slug
}

/// Some models wrap JSON replies in a markdown code fence.
fn strip_code_fence(content: &str) -> &str {
  let trimmed = content.trim();
  let Some(body) = trimmed.strip_prefix("```") else {
    return trimmed;
  };
  let body = body.strip_suffix("```").unwrap_or(body);
  match body.split_once('\n') {
    Some((lang, rest)) if !lang.trim_start().starts_with('{') => rest.trim(),
    _ => body.trim(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn reply(content: &str) -> Value {
    json!({
      "id": "chatcmpl-1",
      "choices": [
        { "index": 0, "message": { "role": "assistant", "content": content } }
      ]
    })
  }

  fn invoker(server: &MockServer, prompts: &tempfile::TempDir) -> HttpInvoker {
    HttpInvoker::new(HttpInvokerConfig {
      base_url: format!("{}/v1", server.uri()),
      api_key: Some("sk-test".to_string()),
      model: "test-model".to_string(),
      prompts_dir: prompts.path().to_path_buf(),
      timeout: Duration::from_secs(5),
    })
    .unwrap()
  }

  fn prompts(workers: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for worker in workers {
      std::fs::write(
        dir.path().join(format!("{}.md", slug(worker))),
        format!("You are the {}.", worker),
      )
      .unwrap();
    }
    dir
  }

  #[test]
  fn test_slug() {
    assert_eq!(slug("Paper Summarizer Agent"), "paper-summarizer-agent");
    assert_eq!(slug("  System/Design  Agent! "), "system-design-agent");
    assert_eq!(slug("gap_identifier"), "gap-identifier");
  }

  #[test]
  fn test_strip_code_fence() {
    assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
    assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
    assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
  }

  #[test]
  fn test_rejects_empty_model() {
    let config = HttpInvokerConfig {
      model: " ".to_string(),
      ..HttpInvokerConfig::default()
    };
    assert!(matches!(
      HttpInvoker::new(config),
      Err(WorkerError::InvalidConfig { .. })
    ));
  }

  #[tokio::test]
  async fn test_structured_worker() {
    let server = MockServer::start().await;
    let dir = prompts(&["Paper Summarizer Agent"]);

    Mock::given(method("POST"))
      .and(path("/v1/chat/completions"))
      .and(header("authorization", "Bearer sk-test"))
      .and(body_partial_json(json!({
        "model": "test-model",
        "response_format": { "type": "json_object" },
        "messages": [
          { "role": "system", "content": "You are the Paper Summarizer Agent." },
          { "role": "user", "content": "paper text" }
        ]
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(reply("{\"title\": \"T\"}")))
      .expect(1)
      .mount(&server)
      .await;

    let result = invoker(&server, &dir)
      .invoke(&WorkerRef::new("Paper Summarizer Agent"), json!("paper text"))
      .await
      .unwrap();

    assert_eq!(result, json!({"title": "T"}));
  }

  #[tokio::test]
  async fn test_text_worker_returns_reply_verbatim() {
    let server = MockServer::start().await;
    let dir = prompts(&["Paper Writer Agent"]);

    Mock::given(method("POST"))
      .and(path("/v1/chat/completions"))
      .respond_with(ResponseTemplate::new(200).set_body_json(reply("# Title\n\nBody")))
      .mount(&server)
      .await;

    let result = invoker(&server, &dir)
      .invoke(
        &WorkerRef::text("Paper Writer Agent"),
        json!({"abstract": {"text": "a"}}),
      )
      .await
      .unwrap();

    assert_eq!(result, json!("# Title\n\nBody"));

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("response_format").is_none());
    let user = body["messages"][1]["content"].as_str().unwrap();
    assert!(user.contains("\"abstract\""));
  }

  #[tokio::test]
  async fn test_http_error_is_invocation_failure() {
    let server = MockServer::start().await;
    let dir = prompts(&["w"]);

    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
      .mount(&server)
      .await;

    let err = invoker(&server, &dir)
      .invoke(&WorkerRef::new("w"), json!("x"))
      .await
      .unwrap_err();

    assert!(matches!(
      err,
      InvocationError::Failed { ref message, .. } if message.contains("500") && message.contains("overloaded")
    ));
  }

  #[tokio::test]
  async fn test_invalid_json_reply() {
    let server = MockServer::start().await;
    let dir = prompts(&["w"]);

    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(reply("not json at all")))
      .mount(&server)
      .await;

    let err = invoker(&server, &dir)
      .invoke(&WorkerRef::new("w"), json!("x"))
      .await
      .unwrap_err();

    assert!(matches!(err, InvocationError::Failed { .. }));
  }

  #[tokio::test]
  async fn test_missing_instructions_skips_request() {
    let server = MockServer::start().await;
    let dir = prompts(&[]);

    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(reply("{}")))
      .expect(0)
      .mount(&server)
      .await;

    let err = invoker(&server, &dir)
      .invoke(&WorkerRef::new("Unknown Agent"), json!("x"))
      .await
      .unwrap_err();

    assert!(matches!(
      err,
      InvocationError::Failed { ref message, .. } if message.contains("unknown-agent.md")
    ));
  }

  #[tokio::test]
  async fn test_slow_reply_times_out() {
    let server = MockServer::start().await;
    let dir = prompts(&["w"]);

    Mock::given(method("POST"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(reply("{}"))
          .set_delay(Duration::from_secs(2)),
      )
      .mount(&server)
      .await;

    let slow = HttpInvoker::new(HttpInvokerConfig {
      base_url: server.uri(),
      api_key: None,
      model: "m".to_string(),
      prompts_dir: dir.path().to_path_buf(),
      timeout: Duration::from_millis(100),
    })
    .unwrap();

    let err = slow
      .invoke(&WorkerRef::new("w"), json!("x"))
      .await
      .unwrap_err();

    assert!(matches!(err, InvocationError::Timeout { timeout_ms: 100, .. }));
  }
}
