//! Neural dispatcher: classify, select via UCB bandit, invoke, record
//! (spec §4.6).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

use synapse_backends::{Backend, BackendRequest, Class, Context};

use crate::classifier::Classifier;
use crate::utils::string::truncate_preview;

const CORRELATION_RING_SIZE: usize = 100;
const CORRELATION_PREVIEW_LEN: usize = 200;
const RECENT_WINDOW_MINUTES: i64 = 5;

fn fallback_reply(class: Class) -> &'static str {
    match class {
        Class::Ping => "I'm here.",
        Class::GenShort => "Sorry, small hiccup.",
        Class::GenLong => "Thinking — try again shortly.",
    }
}

fn new_correlation_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

/// Per-request trace record (spec §3 "Correlation record").
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationRecord {
    pub id: String,
    pub stimulus_preview: String,
    pub context: Context,
    pub class: Class,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub selected_backend: String,
    pub latency_secs: Option<f64>,
    pub success: Option<bool>,
    pub response_preview: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchMetrics {
    pub class: Class,
    pub entropy: f64,
    pub confidence: f64,
    pub selected_backend: String,
    pub latency_secs: f64,
    pub reward: Option<f64>,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct MetricsSnapshot {
    pub global_success_rate: f64,
    pub recent_5min_success_rate: f64,
    pub backend_distribution: Vec<(String, usize)>,
    pub total_requests: u64,
}

pub struct Dispatcher {
    backends: Vec<Arc<dyn Backend>>,
    classifier: Classifier,
    correlations: Mutex<VecDeque<CorrelationRecord>>,
    global_trials: AtomicU64,
    ucb_exploration_factor: f64,
    min_trials_per_backend: u64,
}

impl Dispatcher {
    pub fn new(
        backends: Vec<Arc<dyn Backend>>,
        classifier: Classifier,
        ucb_exploration_factor: f64,
        min_trials_per_backend: u64,
    ) -> Self {
        Self {
            backends,
            classifier,
            correlations: Mutex::new(VecDeque::with_capacity(CORRELATION_RING_SIZE)),
            global_trials: AtomicU64::new(0),
            ucb_exploration_factor,
            min_trials_per_backend,
        }
    }

    fn backend_by_name(&self, name: &str) -> Option<&Arc<dyn Backend>> {
        self.backends.iter().find(|b| b.name() == name)
    }

    /// UCB score for a single backend (spec §4.6 step 3).
    fn ucb_score(&self, backend: &Arc<dyn Backend>, global_trials: u64) -> f64 {
        if !backend.can_execute() {
            return f64::NEG_INFINITY;
        }
        let stats = backend.stats();
        if stats.trials < self.min_trials_per_backend {
            return f64::INFINITY;
        }
        let n = stats.trials as f64;
        let avg_reward = stats.avg_reward();
        let exploration = self.ucb_exploration_factor * ((global_trials as f64).ln() / (n + 1.0)).sqrt();
        avg_reward + exploration
    }

    /// Picks the highest-scoring backend, Reflex included (spec §4.2,
    /// §4.6 step 3: "compute UCB scores for each backend"). Ties break on
    /// insertion order (first occurrence wins, since later comparisons use
    /// strict `>`). A best score of `-inf` means every backend is
    /// unexecutable, which `None` signals to the caller (spec §8: never
    /// await an unexecutable backend).
    fn select_backend(&self, global_trials: u64) -> Option<&Arc<dyn Backend>> {
        let mut best: Option<(&Arc<dyn Backend>, f64)> = None;
        for backend in &self.backends {
            let score = self.ucb_score(backend, global_trials);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((backend, score)),
            }
        }
        best.filter(|(_, score)| *score != f64::NEG_INFINITY)
            .map(|(b, _)| b)
    }

    /// The only public entry point for command handlers (spec §4.6).
    pub async fn process(&self, prompt: &str, context: Context) -> Option<String> {
        let correlation_id = new_correlation_id();
        let global_trials = self.global_trials.fetch_add(1, Ordering::SeqCst) + 1;

        let classification = self.classifier.classify(prompt, context);
        let class = classification.class;

        let selected: Arc<dyn Backend> = if class == Class::Ping {
            match self.backend_by_name("reflex") {
                Some(b) => b.clone(),
                None => return Some(fallback_reply(class).to_string()),
            }
        } else {
            match self.select_backend(global_trials) {
                Some(b) => b.clone(),
                None => {
                    // Every backend scored -inf (none registered or,
                    // in a test double, none can_execute). Reflex always
                    // can_execute in production, so this is unreachable
                    // there; guard it anyway rather than awaiting nothing
                    // (spec §8 "never awaits an unexecutable backend").
                    return Some(fallback_reply(class).to_string());
                }
            }
        };

        let start_time = Utc::now();
        let started = Instant::now();
        let req = BackendRequest {
            prompt: prompt.to_string(),
            context,
            class,
            correlation_id: correlation_id.clone(),
        };

        let result = selected.invoke(&req).await;
        let latency = started.elapsed().as_secs_f64();
        let end_time = Utc::now();

        let (reply, success, error, response_preview) = match result {
            Ok(text) if !text.trim().is_empty() => {
                (text.clone(), true, None, Some(truncate_preview(&text, CORRELATION_PREVIEW_LEN)))
            }
            Ok(_) => (
                fallback_reply(class).to_string(),
                false,
                Some("empty response".to_string()),
                None,
            ),
            Err(e) => (fallback_reply(class).to_string(), false, Some(e.to_string()), None),
        };

        let record = CorrelationRecord {
            id: correlation_id,
            stimulus_preview: truncate_preview(prompt, CORRELATION_PREVIEW_LEN),
            context,
            class,
            start_time,
            end_time: Some(end_time),
            selected_backend: selected.name().to_string(),
            latency_secs: Some(latency),
            success: Some(success),
            response_preview,
            error,
        };
        self.archive(record);

        Some(reply)
    }

    fn archive(&self, record: CorrelationRecord) {
        let mut ring = self.correlations.lock();
        ring.push_back(record);
        while ring.len() > CORRELATION_RING_SIZE {
            ring.pop_front();
        }
    }

    /// Aggregates promised by spec §4.6: global success rate,
    /// recent-5-minute success rate, backend distribution of recent
    /// requests (SPEC_FULL supplemented feature #1).
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        let ring = self.correlations.lock();
        let total = ring.len() as u64;
        if total == 0 {
            return MetricsSnapshot::default();
        }

        let successes = ring.iter().filter(|r| r.success == Some(true)).count();
        let global_success_rate = successes as f64 / total as f64;

        let cutoff = Utc::now() - chrono::Duration::minutes(RECENT_WINDOW_MINUTES);
        let recent: Vec<&CorrelationRecord> = ring.iter().filter(|r| r.start_time >= cutoff).collect();
        let recent_success_rate = if recent.is_empty() {
            0.0
        } else {
            recent.iter().filter(|r| r.success == Some(true)).count() as f64 / recent.len() as f64
        };

        let mut distribution: Vec<(String, usize)> = Vec::new();
        for record in ring.iter() {
            match distribution.iter_mut().find(|(name, _)| *name == record.selected_backend) {
                Some((_, count)) => *count += 1,
                None => distribution.push((record.selected_backend.clone(), 1)),
            }
        }

        MetricsSnapshot {
            global_success_rate,
            recent_5min_success_rate: recent_success_rate,
            backend_distribution: distribution,
            total_requests: total,
        }
    }

    /// Correlation records from the last `minutes` minutes (SPEC_FULL
    /// supplemented feature #1, `get_correlation_analytics`).
    pub fn correlation_analytics(&self, minutes: i64) -> Vec<CorrelationRecord> {
        let cutoff = Utc::now() - chrono::Duration::minutes(minutes);
        self.correlations
            .lock()
            .iter()
            .filter(|r| r.start_time >= cutoff)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use synapse_backends::{BackendError, BackendStats, CircuitState, ReflexBackend};

    struct FakeBackend {
        name: &'static str,
        can_run: AtomicBool,
        reply: String,
        fail: bool,
        trials: AtomicU64,
    }

    impl FakeBackend {
        fn new(name: &'static str, reply: &str) -> Self {
            Self {
                name,
                can_run: AtomicBool::new(true),
                reply: reply.to_string(),
                fail: false,
                trials: AtomicU64::new(0),
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                name,
                can_run: AtomicBool::new(true),
                reply: String::new(),
                fail: true,
                trials: AtomicU64::new(0),
            }
        }

        fn unavailable(name: &'static str) -> Self {
            Self {
                name,
                can_run: AtomicBool::new(false),
                reply: String::new(),
                fail: false,
                trials: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        fn name(&self) -> &'static str {
            self.name
        }

        fn can_execute(&self) -> bool {
            self.can_run.load(Ordering::SeqCst)
        }

        async fn invoke(&self, _req: &BackendRequest) -> Result<String, BackendError> {
            self.trials.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(BackendError::Other("boom".into()))
            } else {
                Ok(self.reply.clone())
            }
        }

        fn stats(&self) -> BackendStats {
            BackendStats {
                name: self.name,
                circuit_state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                ema_success_rate: 1.0,
                ema_latency_secs: 0.01,
                trials: self.trials.load(Ordering::SeqCst),
                cumulative_reward: self.trials.load(Ordering::SeqCst) as f64 * 0.8,
                success_count: self.trials.load(Ordering::SeqCst),
                rate_limit_deadline: None,
                quota_exhausted: false,
                backoff_secs: 0.0,
            }
        }
    }

    fn classifier() -> Classifier {
        Classifier::new("!ask", vec!["hi".to_string(), "hello".to_string()])
    }

    #[tokio::test]
    async fn ping_bypasses_bandit_and_uses_reflex() {
        let backends: Vec<Arc<dyn Backend>> = vec![Arc::new(ReflexBackend::new()), Arc::new(FakeBackend::new("local", "hi"))];
        let dispatcher = Dispatcher::new(backends, classifier(), 1.4, 3);
        let reply = dispatcher.process("hi", Context::Other).await.unwrap();
        assert!(!reply.is_empty());
        let analytics = dispatcher.correlation_analytics(60);
        assert_eq!(analytics[0].selected_backend, "reflex");
    }

    #[tokio::test]
    async fn failure_falls_back_to_templated_reply() {
        // No reflex here: this exercises the "selected backend's invoke
        // fails" path in isolation, not bandit competition against reflex's
        // simulated reward.
        let backends: Vec<Arc<dyn Backend>> = vec![Arc::new(FakeBackend::failing("local"))];
        let dispatcher = Dispatcher::new(backends, classifier(), 1.4, 0);
        let reply = dispatcher.process("tell me something long", Context::Ask).await.unwrap();
        assert_eq!(reply, "Thinking — try again shortly.");
        let analytics = dispatcher.correlation_analytics(60);
        assert_eq!(analytics[0].success, Some(false));
    }

    #[tokio::test]
    async fn unavailable_backend_never_selected() {
        let backends: Vec<Arc<dyn Backend>> = vec![
            Arc::new(FakeBackend::unavailable("local")),
            Arc::new(FakeBackend::new("cloud", "cloud reply")),
        ];
        let dispatcher = Dispatcher::new(backends, classifier(), 1.4, 0);
        let reply = dispatcher.process("explain recursion", Context::Ask).await.unwrap();
        assert_eq!(reply, "cloud reply");
    }

    #[tokio::test]
    async fn reflex_competes_on_its_simulated_reward() {
        // Reflex's simulated 0.5 reward beats a zero-trial non-reflex
        // backend once both have equal (zero) exploration bonus, so a
        // non-ping, non-forced-exploration request can still land on
        // reflex (spec §4.2/§4.6: reflex is scored like any other backend).
        let backends: Vec<Arc<dyn Backend>> = vec![Arc::new(ReflexBackend::new()), Arc::new(FakeBackend::new("local", "hey"))];
        let dispatcher = Dispatcher::new(backends, classifier(), 1.4, 0);
        let reply = dispatcher.process("explain rust", Context::Other).await.unwrap();
        assert!(!reply.is_empty());
        let analytics = dispatcher.correlation_analytics(60);
        assert_eq!(analytics[0].selected_backend, "reflex");
    }

    #[tokio::test]
    async fn all_backends_unexecutable_falls_back_without_invoking() {
        let backends: Vec<Arc<dyn Backend>> = vec![Arc::new(FakeBackend::unavailable("local")), Arc::new(FakeBackend::unavailable("cloud"))];
        let dispatcher = Dispatcher::new(backends, classifier(), 1.4, 0);
        let reply = dispatcher.process("explain recursion", Context::Ask).await.unwrap();
        assert_eq!(reply, "Thinking — try again shortly.");
    }

    #[tokio::test]
    async fn correlation_ring_is_bounded() {
        let backends: Vec<Arc<dyn Backend>> = vec![Arc::new(ReflexBackend::new())];
        let dispatcher = Dispatcher::new(backends, classifier(), 1.4, 3);
        for _ in 0..150 {
            dispatcher.process("hi", Context::Other).await;
        }
        assert_eq!(dispatcher.correlation_analytics(60 * 24).len(), CORRELATION_RING_SIZE);
    }

    #[tokio::test]
    async fn metrics_snapshot_reports_rates_and_distribution() {
        let backends: Vec<Arc<dyn Backend>> = vec![Arc::new(ReflexBackend::new()), Arc::new(FakeBackend::new("local", "hey"))];
        let dispatcher = Dispatcher::new(backends, classifier(), 1.4, 0);
        dispatcher.process("explain rust", Context::Other).await;
        dispatcher.process("hi", Context::Other).await;
        let metrics = dispatcher.metrics_snapshot();
        assert_eq!(metrics.total_requests, 2);
        assert!(metrics.global_success_rate > 0.0);
        assert!(!metrics.backend_distribution.is_empty());
    }

    #[test]
    fn zero_trial_bootstrap_forces_exploration() {
        let backends: Vec<Arc<dyn Backend>> = vec![Arc::new(FakeBackend::new("local", "x"))];
        let dispatcher = Dispatcher::new(backends, classifier(), 1.4, 3);
        let score = dispatcher.ucb_score(&dispatcher.backends[0], 0);
        assert_eq!(score, f64::INFINITY);
    }
}
