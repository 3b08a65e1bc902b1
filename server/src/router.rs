//! Routes incoming chat lines to the dispatcher or a registered command
//! handler (spec §4.12).
//!
//! In scope: message dedup, mention detection with per-user cooldown,
//! and the built-in `!ask` command. Every other command (`!joke`, etc.)
//! is out of scope for this core (spec §1) but the router exposes
//! `register` so a host binary can plug one in against the same
//! dedup/cooldown machinery.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use synapse_backends::Context;

use crate::bus::{Bus, BusMessage, TOPIC_CHAT_INBOUND, TOPIC_CHAT_OUTBOUND};
use crate::core::constants::{DEDUP_SET_SIZE, MAX_REPLY_LEN};
use crate::dispatcher::Dispatcher;
use crate::types::{ChatMessage, OutboundMessage};
use crate::utils::string::truncate_preview;

/// A pluggable out-of-scope command handler (spec §6 "Commands are
/// out-of-scope collaborators except `!ask`").
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, args: &str, message: &ChatMessage) -> Option<String>;
}

struct DedupSet {
    seen: std::collections::HashSet<(String, String)>,
    order: VecDeque<(String, String)>,
}

impl DedupSet {
    fn new() -> Self {
        Self {
            seen: std::collections::HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Returns `true` if `(user_id, text)` was already seen; records it
    /// either way.
    fn check_and_insert(&mut self, user_id: &str, text: &str) -> bool {
        let key = (user_id.to_string(), text.to_string());
        if self.seen.contains(&key) {
            return true;
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        if self.order.len() > DEDUP_SET_SIZE {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        false
    }
}

/// Routes `chat.inbound` messages (spec §4.12).
pub struct CommandRouter {
    bot_name: String,
    command_prefix: char,
    mention_cooldown_secs: u64,
    ask_cooldown_secs: u64,
    dispatcher: Arc<Dispatcher>,
    bus: Arc<Bus>,
    dedup: Mutex<DedupSet>,
    mention_cooldowns: Mutex<HashMap<String, Instant>>,
    ask_cooldowns: Mutex<HashMap<String, Instant>>,
    commands: Mutex<HashMap<String, Arc<dyn CommandHandler>>>,
}

impl CommandRouter {
    pub fn new(
        bot_name: impl Into<String>,
        command_prefix: char,
        mention_cooldown_secs: u64,
        ask_cooldown_secs: u64,
        dispatcher: Arc<Dispatcher>,
        bus: Arc<Bus>,
    ) -> Self {
        Self {
            bot_name: bot_name.into(),
            command_prefix,
            mention_cooldown_secs,
            ask_cooldown_secs,
            dispatcher,
            bus,
            dedup: Mutex::new(DedupSet::new()),
            mention_cooldowns: Mutex::new(HashMap::new()),
            ask_cooldowns: Mutex::new(HashMap::new()),
            commands: Mutex::new(HashMap::new()),
        }
    }

    /// Registers an out-of-scope command handler under `name` (without
    /// the command prefix).
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        self.commands.lock().insert(name.into(), handler);
    }

    fn mentions_bot(&self, text_lower: &str) -> Option<String> {
        let at_form = format!("@{}", self.bot_name.to_lowercase());
        if let Some(pos) = text_lower.find(&at_form) {
            return Some(text_lower[pos + at_form.len()..].trim().to_string());
        }
        if text_lower.contains(&self.bot_name.to_lowercase()) {
            return Some(String::new());
        }
        None
    }

    fn on_cooldown(cooldowns: &Mutex<HashMap<String, Instant>>, user_id: &str, cooldown_secs: u64) -> bool {
        let mut g = cooldowns.lock();
        let now = Instant::now();
        if let Some(last) = g.get(user_id) {
            if now.duration_since(*last).as_secs() < cooldown_secs {
                return true;
            }
        }
        g.insert(user_id.to_string(), now);
        false
    }

    async fn reply(&self, message: &ChatMessage, text: String) {
        let clamped = truncate_preview(&text, MAX_REPLY_LEN);
        let outbound = OutboundMessage::new(message.channel.clone(), message.channel_id.clone(), clamped);
        self.bus.publish(TOPIC_CHAT_OUTBOUND, BusMessage::Outbound(outbound)).await;
    }

    /// Routes a single chat message (spec §4.12 "Routing algorithm"):
    /// 1. dedup on `(user_id, text)`.
    /// 2. `!ask <question>` -> dispatcher with `Context::Ask`, gated by
    ///    its own cooldown.
    /// 3. a registered command prefix -> that handler.
    /// 4. a mention of the bot name -> dispatcher with `Context::Mention`,
    ///    gated by the mention cooldown.
    /// 5. otherwise ignored.
    pub async fn route(&self, message: ChatMessage) {
        if self.dedup.lock().check_and_insert(&message.user_id, &message.text) {
            return;
        }

        let trimmed = message.text.trim();
        let lower = trimmed.to_lowercase();

        if let Some(rest) = lower.strip_prefix("!ask") {
            let question = trimmed[trimmed.len() - rest.len()..].trim();
            if question.is_empty() {
                return;
            }
            if Self::on_cooldown(&self.ask_cooldowns, &message.user_id, self.ask_cooldown_secs) {
                return;
            }
            if let Some(reply) = self.dispatcher.process(question, Context::Ask).await {
                self.reply(&message, reply).await;
            }
            return;
        }

        if let Some(rest) = trimmed.strip_prefix(self.command_prefix) {
            let mut parts = rest.splitn(2, char::is_whitespace);
            if let Some(name) = parts.next() {
                let handler = self.commands.lock().get(name).cloned();
                if let Some(handler) = handler {
                    let args = parts.next().unwrap_or("").trim();
                    if let Some(reply) = handler.handle(args, &message).await {
                        self.reply(&message, reply).await;
                    }
                    return;
                }
            }
        }

        if let Some(residual) = self.mentions_bot(&lower) {
            if Self::on_cooldown(&self.mention_cooldowns, &message.user_id, self.mention_cooldown_secs) {
                return;
            }
            let prompt = if residual.is_empty() { trimmed } else { &residual };
            if let Some(reply) = self.dispatcher.process(prompt, Context::Mention).await {
                self.reply(&message, reply).await;
            }
        }
    }

    /// Installs this router's subscription on `chat.inbound`.
    pub async fn install(self: Arc<Self>) {
        let router = self.clone();
        self.bus
            .subscribe(TOPIC_CHAT_INBOUND, "command_router", move |msg| {
                let router = router.clone();
                async move {
                    if let BusMessage::Chat(message) = msg {
                        router.route(message).await;
                    }
                    Ok(())
                }
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use synapse_backends::ReflexBackend;

    fn make_message(user_id: &str, text: &str) -> ChatMessage {
        ChatMessage {
            channel: "chan".to_string(),
            channel_id: "1".to_string(),
            user_login: "user".to_string(),
            user_id: user_id.to_string(),
            text: text.to_string(),
            is_moderator: false,
            is_broadcaster: false,
            is_vip: false,
            badges: HashMap::new(),
            transport: "irc".to_string(),
        }
    }

    fn router() -> (Arc<CommandRouter>, Arc<Bus>) {
        let bus = Arc::new(Bus::new());
        let classifier = Classifier::new("!ask", vec!["hi".to_string()]);
        let backends: Vec<Arc<dyn synapse_backends::Backend>> = vec![Arc::new(ReflexBackend::new())];
        let dispatcher = Arc::new(Dispatcher::new(backends, classifier, 1.4, 3));
        let router = Arc::new(CommandRouter::new("synapsebot", '!', 15, 15, dispatcher, bus.clone()));
        (router, bus)
    }

    #[tokio::test]
    async fn ask_command_dispatches_with_ask_context() {
        let (router, bus) = router();
        let counter = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let c = counter.clone();
        bus.subscribe(TOPIC_CHAT_OUTBOUND, "test", move |_msg| {
            let c = c.clone();
            async move {
                c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
        router.route(make_message("u1", "!ask what is rust")).await;
        bus.wait_all().await;
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_message_is_ignored() {
        let (router, bus) = router();
        let counter = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let c = counter.clone();
        bus.subscribe(TOPIC_CHAT_OUTBOUND, "test", move |_msg| {
            let c = c.clone();
            async move {
                c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
        router.route(make_message("u1", "!ask same question")).await;
        router.route(make_message("u1", "!ask same question")).await;
        bus.wait_all().await;
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mention_triggers_dispatch_once_per_cooldown() {
        let (router, bus) = router();
        let counter = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let c = counter.clone();
        bus.subscribe(TOPIC_CHAT_OUTBOUND, "test", move |_msg| {
            let c = c.clone();
            async move {
                c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
        router.route(make_message("u1", "@synapsebot how are you")).await;
        router.route(make_message("u1", "@synapsebot still there")).await;
        bus.wait_all().await;
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unrelated_message_is_ignored() {
        let (router, bus) = router();
        let counter = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let c = counter.clone();
        bus.subscribe(TOPIC_CHAT_OUTBOUND, "test", move |_msg| {
            let c = c.clone();
            async move {
                c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
        router.route(make_message("u1", "just chatting here")).await;
        bus.wait_all().await;
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn registered_command_handler_is_invoked() {
        struct Echo;
        #[async_trait]
        impl CommandHandler for Echo {
            async fn handle(&self, args: &str, _message: &ChatMessage) -> Option<String> {
                Some(format!("echo: {args}"))
            }
        }
        let (router, bus) = router();
        router.register("echo", Arc::new(Echo));
        let counter = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let c = counter.clone();
        bus.subscribe(TOPIC_CHAT_OUTBOUND, "test", move |_msg| {
            let c = c.clone();
            async move {
                c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        })
        .await;
        router.route(make_message("u1", "!echo hello")).await;
        bus.wait_all().await;
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
