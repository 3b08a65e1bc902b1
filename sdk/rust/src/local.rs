//! Fast local chat-completion backend, streamed (spec.md §4.3).

use std::time::{Duration, Instant};

use eventsource_stream::Eventsource;
use futures::StreamExt;
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
pub struct LocalBackendConfig {
    pub endpoint: String,
    pub model: String,
    pub language: String,
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

/// Per-(context, class) request shaping (spec.md §4.3 table).
struct RequestShape {
    max_tokens: u32,
    temperature: f32,
    repeat_penalty: f32,
    stop: Vec<String>,
}

fn request_shape(context: Context, class: Class, end_marker: &str) -> RequestShape {
    match (context, class) {
        (Context::Ask, _) => RequestShape {
            max_tokens: 200,
            temperature: 0.3,
            repeat_penalty: 1.1,
            stop: vec!["\n".into(), end_marker.into()],
        },
        (Context::Mention, Class::GenLong) => RequestShape {
            max_tokens: 100,
            temperature: 0.4,
            repeat_penalty: 1.2,
            stop: vec![end_marker.into(), "\n".into(), "in summary".into(), "furthermore".into()],
        },
        (Context::Mention, Class::GenShort) => RequestShape {
            max_tokens: 200,
            temperature: 0.7,
            repeat_penalty: 1.1,
            stop: vec!["\n".into()],
        },
        (_, Class::GenLong) => RequestShape {
            max_tokens: 100,
            temperature: 0.4,
            repeat_penalty: 1.2,
            stop: vec![end_marker.into(), "\n".into()],
        },
        _ => RequestShape {
            max_tokens: 150,
            temperature: 0.7,
            repeat_penalty: 1.1,
            stop: vec!["\n".into()],
        },
    }
}

#[derive(Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Chunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

pub struct LocalBackend {
    config: LocalBackendConfig,
    client: reqwest::Client,
    stats: StatsCell,
}

impl LocalBackend {
    pub fn new(config: LocalBackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout_connect)
            .timeout(config.timeout_inference + config.timeout_write)
            .pool_idle_timeout(config.timeout_pool)
            .build()
            .expect("reqwest client build");

        let stats = StatsCell::new(
            "local",
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

    async fn stream_once(
        &self,
        wrapped: &WrappedPrompt,
        shape: &RequestShape,
    ) -> Result<(String, Option<String>), BackendError> {
        let payload = json!({
            "model": self.config.model,
            "messages": Self::messages_json(wrapped),
            "max_tokens": shape.max_tokens,
            "temperature": shape.temperature,
            "repeat_penalty": shape.repeat_penalty,
            "stop": shape.stop,
            "stream": true,
        });

        let resp = self
            .client
            .post(&self.config.endpoint)
            .header(reqwest::header::ACCEPT, "text/event-stream")
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

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        let mut stream = resp.bytes_stream().eventsource();
        let mut buffer = String::new();
        let mut finish_reason: Option<String> = None;

        while let Some(event) = stream.next().await {
            let event = event.map_err(|e| BackendError::Protocol(e.to_string()))?;
            if event.data == "[DONE]" {
                break;
            }
            let chunk: Chunk = match serde_json::from_str(&event.data) {
                Ok(c) => c,
                Err(_) => continue,
            };
            for choice in chunk.choices {
                if let Some(content) = choice.delta.content {
                    buffer.push_str(&content);
                }
                if let Some(reason) = choice.finish_reason {
                    finish_reason = Some(reason);
                }
            }
        }

        Ok((buffer, finish_reason))
    }
}

#[async_trait::async_trait]
impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn can_execute(&self) -> bool {
        self.config.enabled && self.stats.can_execute()
    }

    async fn invoke(&self, req: &BackendRequest) -> Result<String, BackendError> {
        let started = Instant::now();
        let shape = request_shape(req.context, req.class, &self.config.end_marker);
        let wrapped = wrap_prompt(
            &self.config.bot_name,
            &self.config.personality,
            req.context,
            req.class,
            self.config.use_personality_on_mention,
            self.config.use_personality_on_ask,
            &req.prompt,
        );

        let mut result = self.stream_once(&wrapped, &shape).await;

        if let Err(BackendError::Status { status, ref body }) = result
            && status == 400
            && crate::prompt::error_mentions_system_role(body)
        {
            let folded = fold_system_into_user(&wrapped);
            result = self.stream_once(&folded, &shape).await;
        } else if let Err(BackendError::Protocol(_)) = result {
            let folded = fold_system_into_user(&wrapped);
            result = self.stream_once(&folded, &shape).await;
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
                        let reward = compute_reward(&text, latency, &RewardWeights::local());
                        self.stats.record_success(latency, reward);
                        Ok(text)
                    }
                    None => {
                        self.stats.record_failure(latency);
                        Err(BackendError::InvalidResponse("too short or trivial".into()))
                    }
                }
            }
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
