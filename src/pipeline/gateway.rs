//! Model gateway: one prompt + one image in, one schema-checked reply out.
//!
//! [`ModelGateway`] is the seam between the correction processors and the
//! network. The production implementation, [`LlmGateway`], drives an
//! `edgequake-llm` vision provider; tests plug in scripted gateways.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! concurrent load. Exponential backoff (`retry_backoff_ms * 2^attempt`)
//! avoids thundering-herd: with 500 ms base and 3 retries the wait sequence
//! is 500 ms → 1 s → 2 s. A reply that arrives but does not match the
//! schema is not retried; it is reported straight back as a failure.

use crate::config::CorrectionConfig;
use crate::error::GatewayError;
use crate::pipeline::postprocess::{clean_reply, is_no_corrections};
use crate::prompts::json_response_instructions;
use crate::schema::BlockId;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// JSON value type a schema field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ValueKind {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ValueKind::String => value.is_string(),
            ValueKind::Number => value.is_number(),
            ValueKind::Boolean => value.is_boolean(),
            ValueKind::Array => value.is_array(),
            ValueKind::Object => value.is_object(),
        }
    }

    pub fn json_name(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaField {
    pub name: &'static str,
    pub kind: ValueKind,
}

/// Required keys of a reply and their value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseSchema {
    pub fields: &'static [SchemaField],
    /// String field a bare "no corrections needed" reply stands for, if the
    /// prompt allows answering that way.
    pub sentinel_field: Option<&'static str>,
}

impl ResponseSchema {
    /// Check `value` is an object carrying every required key with the
    /// declared type. Extra keys are ignored.
    pub fn validate(&self, value: Value) -> Result<Map<String, Value>, GatewayError> {
        let Value::Object(map) = value else {
            return Err(GatewayError::SchemaMismatch {
                detail: "reply is not a JSON object".into(),
            });
        };
        for field in self.fields {
            match map.get(field.name) {
                None | Some(Value::Null) => {
                    return Err(GatewayError::MissingKey {
                        key: field.name.to_string(),
                    })
                }
                Some(v) if !field.kind.matches(v) => {
                    return Err(GatewayError::SchemaMismatch {
                        detail: format!("'{}' is not a {}", field.name, field.kind.json_name()),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(map)
    }
}

/// Everything a gateway needs to correct one block.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub block_id: BlockId,
    pub prompt: String,
    pub image: Option<ImageData>,
    pub schema: ResponseSchema,
}

/// A schema-valid reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub values: Map<String, Value>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl ModelResponse {
    pub fn new(values: Map<String, Value>) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }
}

/// Sends a correction request to a generative model.
///
/// Implementations must be `Send + Sync`: the dispatcher calls `generate`
/// for many blocks concurrently.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn generate(&self, request: GatewayRequest) -> Result<ModelResponse, GatewayError>;
}

/// [`ModelGateway`] backed by an `edgequake-llm` provider.
pub struct LlmGateway {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &CorrectionConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ModelGateway for LlmGateway {
    /// ## Message Layout
    ///
    /// 1. **System message**: JSON reply contract derived from the schema
    /// 2. **User message**: the filled prompt, with the block image attached
    async fn generate(&self, request: GatewayRequest) -> Result<ModelResponse, GatewayError> {
        let start = Instant::now();
        let images: Vec<ImageData> = request.image.into_iter().collect();
        let messages = vec![
            ChatMessage::system(json_response_instructions(&request.schema)),
            ChatMessage::user_with_images(&request.prompt, images),
        ];
        let options = self.build_options();

        let mut last_err: Option<GatewayError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Block {}: retry {}/{} after {}ms",
                    request.block_id, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let call = self.provider.chat(&messages, Some(&options));
            match timeout(Duration::from_secs(self.api_timeout_secs), call).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Block {}: {} input tokens, {} output tokens, {:?}",
                        request.block_id,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    let mut parsed = parse_reply(&response.content, &request.schema)?;
                    parsed.input_tokens = response.prompt_tokens as u64;
                    parsed.output_tokens = response.completion_tokens as u64;
                    return Ok(parsed);
                }
                Ok(Err(e)) => {
                    warn!(
                        "Block {}: attempt {} failed: {}",
                        request.block_id,
                        attempt + 1,
                        e
                    );
                    last_err = Some(GatewayError::Transport {
                        retries: attempt,
                        detail: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(
                        "Block {}: attempt {} timed out after {}s",
                        request.block_id,
                        attempt + 1,
                        self.api_timeout_secs
                    );
                    last_err = Some(GatewayError::Timeout {
                        secs: self.api_timeout_secs,
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| GatewayError::Transport {
            retries: self.max_retries,
            detail: "Unknown error".to_string(),
        }))
    }
}

/// Turn raw reply text into a schema-checked response.
///
/// The reply must be a single JSON object, optionally wrapped in code fences.
/// Prose is never mined for JSON or taken as a value. The one exception is a
/// bare "no corrections needed" answer to a schema with a `sentinel_field`.
pub fn parse_reply(content: &str, schema: &ResponseSchema) -> Result<ModelResponse, GatewayError> {
    let cleaned = clean_reply(content);

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(v @ Value::Object(_)) => Ok(ModelResponse::new(schema.validate(v)?)),
        _ => match schema.sentinel_field {
            Some(key) if is_no_corrections(&cleaned) => {
                let mut values = Map::new();
                values.insert(key.to_string(), Value::String(cleaned));
                Ok(ModelResponse::new(values))
            }
            _ => Err(GatewayError::SchemaMismatch {
                detail: "reply is not a JSON object".into(),
            }),
        },
    }
}
