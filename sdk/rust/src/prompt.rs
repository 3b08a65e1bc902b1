//! Prompt wrapper construction (spec.md §4.3 "The prompt wrapper depends
//! on (context, class, use_personality flags)").

use crate::types::{Class, Context};

/// A constructed chat-completion message pair: optional system content
/// and the user content actually carrying the stimulus.
#[derive(Debug, Clone)]
pub struct WrappedPrompt {
    pub system: Option<String>,
    pub user: String,
}

/// Builds the prompt wrapper for a given (context, class, personality
/// flags). `Context::Direct` bypasses wrapping entirely per spec.md §9 —
/// the raw prompt is sent untouched.
pub fn wrap_prompt(
    bot_name: &str,
    personality: &str,
    context: Context,
    class: Class,
    use_personality_on_mention: bool,
    use_personality_on_ask: bool,
    raw_prompt: &str,
) -> WrappedPrompt {
    if context == Context::Direct {
        return WrappedPrompt {
            system: None,
            user: raw_prompt.to_string(),
        };
    }

    let use_personality = match context {
        Context::Mention => use_personality_on_mention,
        Context::Ask => use_personality_on_ask,
        Context::Other | Context::Direct => false,
    };

    let mut system = format!("You are {bot_name}, a Twitch chat bot.");
    if use_personality {
        system.push(' ');
        system.push_str(personality);
    }

    match (context, class) {
        (Context::Ask, _) => {
            system.push_str(
                " Answer the question directly and informatively in a few sentences.",
            );
        }
        (Context::Mention, Class::GenLong) => {
            system.push_str(" Reply thoughtfully but keep it brief, one or two sentences.");
        }
        (Context::Mention, Class::GenShort) => {
            system.push_str(" Reply casually, one short line, like a chatter.");
        }
        (_, Class::GenLong) => {
            system.push_str(" Keep your reply concise, one to two sentences.");
        }
        _ => {
            system.push_str(" Reply casually and briefly.");
        }
    }

    WrappedPrompt {
        system: Some(system),
        user: raw_prompt.to_string(),
    }
}

/// Folds system content into the user message. Used on retry when the
/// target model rejects a separate `system` role (spec.md §4.3 "Some
/// model families do not accept a separate system role").
pub fn fold_system_into_user(wrapped: &WrappedPrompt) -> WrappedPrompt {
    match &wrapped.system {
        Some(system) => WrappedPrompt {
            system: None,
            user: format!("{system}\n\n{}", wrapped.user),
        },
        None => wrapped.clone(),
    }
}

/// Heuristic used to decide whether a 400-status body indicates the
/// model rejected the `system` role (spec.md §4.3).
pub fn error_mentions_system_role(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("system") && (lower.contains("role") || lower.contains("message"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_context_bypasses_wrapping() {
        let w = wrap_prompt("Bot", "friendly", Context::Direct, Class::GenLong, true, true, "raw");
        assert!(w.system.is_none());
        assert_eq!(w.user, "raw");
    }

    #[test]
    fn ask_context_includes_personality_when_enabled() {
        let w = wrap_prompt("Bot", "sarcastic", Context::Ask, Class::GenLong, false, true, "why?");
        assert!(w.system.unwrap().contains("sarcastic"));
    }

    #[test]
    fn fold_merges_system_into_user() {
        let wrapped = WrappedPrompt {
            system: Some("sys".into()),
            user: "usr".into(),
        };
        let folded = fold_system_into_user(&wrapped);
        assert!(folded.system.is_none());
        assert!(folded.user.contains("sys"));
        assert!(folded.user.contains("usr"));
    }

    #[test]
    fn detects_system_role_rejection() {
        assert!(error_mentions_system_role(
            "Error: this model does not support the system role in messages"
        ));
        assert!(!error_mentions_system_role("Error: invalid api key"));
    }
}
