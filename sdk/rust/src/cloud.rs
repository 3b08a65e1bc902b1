//! Slow high-quality remote backend, non-streaming (spec.md §4.4).

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::Backend;
use crate::error::BackendError;
use crate::postprocess::postprocess;
use crate::prompt::{fold_system_into_user, wrap_prompt, WrappedPrompt};
use crate::reward::{shape as compute_reward, RewardWeights};
use crate::stats::StatsCell;
use crate::types::{BackendRequest, BackendStats, Class, Context};

#[derive(Debug, Clone)]
pub struct CloudBackendConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub enabled: bool,
    pub bot_name: String,
    pub personality: String,
    pub use_personality_on_mention: bool,
    pub use_personality_on_ask: bool,
    pub timeout_connect: Duration,
    pub timeout_inference: Duration,
    pub timeout_write: Duration,
    pub timeout_pool: Duration,
    pub ema_alpha: f64,
    pub failure_threshold: u32,
    pub recovery_secs: u64,
    pub drift_phrases: Vec<String>,
    pub end_marker: String,
}

struct RequestShape {
    max_tokens: u32,
    temperature: f32,
}

fn request_shape(context: Context, class: Class) -> RequestShape {
    match (context, class) {
        (Context::Ask, _) => RequestShape {
            max_tokens: 90,
            temperature: 0.4,
        },
        (_, Class::GenLong) => RequestShape {
            max_tokens: 60,
            temperature: 0.8,
        },
        (Context::Mention, _) => RequestShape {
            max_tokens: 90,
            temperature: 0.8,
        },
        _ => RequestShape {
            max_tokens: 90,
            temperature: 0.4,
        },
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

pub struct CloudBackend {
    config: CloudBackendConfig,
    client: reqwest::Client,
    stats: StatsCell,
}

impl CloudBackend {
    pub fn new(config: CloudBackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout_connect)
            .timeout(config.timeout_inference + config.timeout_write)
            .pool_idle_timeout(config.timeout_pool)
            .build()
            .expect("reqwest client build");

        let stats = StatsCell::new(
            "cloud",
            config.failure_threshold,
            config.recovery_secs,
            config.ema_alpha,
            1.0,
            60.0,
        );

        Self {
            config,
            client,
            stats,
        }
    }

    fn messages_json(wrapped: &WrappedPrompt) -> Vec<serde_json::Value> {
        let mut v = Vec::new();
        if let Some(system) = &wrapped.system {
            v.push(json!(ChatMessage {
                role: "system",
                content: system,
            }));
        }
        v.push(json!(ChatMessage {
            role: "user",
            content: &wrapped.user,
        }));
        v
    }

    async fn request_once(
        &self,
        wrapped: &WrappedPrompt,
        shape: &RequestShape,
    ) -> Result<(String, Option<String>), BackendError> {
        let payload = json!({
            "model": self.config.model,
            "messages": Self::messages_json(wrapped),
            "max_tokens": shape.max_tokens,
            "temperature": shape.temperature,
            "stream": false,
        });

        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::ReadTimeout
                } else if e.is_connect() {
                    BackendError::Connect(e.to_string())
                } else {
                    BackendError::Other(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            self.stats.set_rate_limited(retry_after);
            return Err(BackendError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if status.as_u16() == 402 {
            self.stats.set_quota_exhausted();
            return Err(BackendError::QuotaExhausted);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Protocol(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Protocol("empty choices".into()))?;
        Ok((choice.message.content, choice.finish_reason))
    }
}

#[async_trait::async_trait]
impl Backend for CloudBackend {
    fn name(&self) -> &'static str {
        "cloud"
    }

    fn can_execute(&self) -> bool {
        self.config.enabled && self.stats.can_execute()
    }

    async fn invoke(&self, req: &BackendRequest) -> Result<String, BackendError> {
        let started = Instant::now();
        let shape = request_shape(req.context, req.class);
        let wrapped = wrap_prompt(
            &self.config.bot_name,
            &self.config.personality,
            req.context,
            req.class,
            self.config.use_personality_on_mention,
            self.config.use_personality_on_ask,
            &req.prompt,
        );

        let mut result = self.request_once(&wrapped, &shape).await;

        if let Err(BackendError::Status { status, ref body }) = result
            && status == 400
            && crate::prompt::error_mentions_system_role(body)
        {
            let folded = fold_system_into_user(&wrapped);
            result = self.request_once(&folded, &shape).await;
        }

        let latency = started.elapsed().as_secs_f64();

        match result {
            Ok((raw, finish_reason)) => {
                match postprocess(
                    &raw,
                    &self.config.bot_name,
                    req.context,
                    req.class,
                    &self.config.drift_phrases,
                    finish_reason.as_deref(),
                    &self.config.end_marker,
                ) {
                    Some(text) => {
                        let reward = compute_reward(&text, latency, &RewardWeights::cloud());
                        self.stats.record_success(latency, reward);
                        Ok(text)
                    }
                    None => {
                        self.stats.record_failure(latency);
                        Err(BackendError::InvalidResponse("too short or trivial".into()))
                    }
                }
            }
            Err(BackendError::RateLimited { retry_after_secs }) => {
                self.stats.record_failure(latency);
                Err(BackendError::RateLimited { retry_after_secs })
            }
            Err(BackendError::QuotaExhausted) => Err(BackendError::QuotaExhausted),
            Err(e) => {
                self.stats.record_failure(latency);
                Err(e)
            }
        }
    }

    fn stats(&self) -> BackendStats {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint: String) -> CloudBackendConfig {
        CloudBackendConfig {
            endpoint,
            model: "cloud-model".into(),
            api_key: "sk-test".into(),
            enabled: true,
            bot_name: "SynapseBot".into(),
            personality: "a helpful chat companion".into(),
            use_personality_on_mention: true,
            use_personality_on_ask: false,
            timeout_connect: Duration::from_secs(5),
            timeout_inference: Duration::from_secs(30),
            timeout_write: Duration::from_secs(10),
            timeout_pool: Duration::from_secs(5),
            ema_alpha: 0.2,
            failure_threshold: 5,
            recovery_secs: 60,
            drift_phrases: vec!["in summary".into()],
            end_marker: "[END]".into(),
        }
    }

    #[tokio::test]
    async fn successful_reply_records_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "Cloud says hi!"}, "finish_reason": "stop"}]
            })))
            .mount(&server)
            .await;

        let backend = CloudBackend::new(test_config(server.uri()));
        let req = BackendRequest {
            prompt: "hi".into(),
            context: Context::Other,
            class: Class::GenShort,
            correlation_id: "abcd1234".into(),
        };
        let reply = backend.invoke(&req).await.unwrap();
        assert_eq!(reply, "Cloud says hi!");
        assert_eq!(backend.stats().success_count, 1);
    }

    #[tokio::test]
    async fn rate_limit_sets_deadline_and_blocks_execution() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
            .mount(&server)
            .await;

        let backend = CloudBackend::new(test_config(server.uri()));
        let req = BackendRequest {
            prompt: "hi".into(),
            context: Context::Other,
            class: Class::GenShort,
            correlation_id: "abcd1234".into(),
        };
        let err = backend.invoke(&req).await;
        assert!(matches!(err, Err(BackendError::RateLimited { .. })));
        assert!(!backend.can_execute());
    }

    #[tokio::test]
    async fn quota_exhaustion_is_sticky() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(402))
            .mount(&server)
            .await;

        let backend = CloudBackend::new(test_config(server.uri()));
        let req = BackendRequest {
            prompt: "hi".into(),
            context: Context::Other,
            class: Class::GenShort,
            correlation_id: "abcd1234".into(),
        };
        let _ = backend.invoke(&req).await;
        assert!(!backend.can_execute());
        // Sticky: does not clear itself even after a hypothetical recovery window.
        assert!(!backend.can_execute());
    }
}
