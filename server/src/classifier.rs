//! Intent classification with Shannon-entropy-gated fallback (spec §4.5).
//!
//! Resolves the spec's own open question (§9): `H_max` is derived from
//! the three-element class set `synapse_backends::Class` actually
//! produced here (`log2(3)`), not a stale four-class constant left over
//! from an earlier design (SPEC_FULL "Supplemented Features" #4).

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

use synapse_backends::{Class, Context};

const DEFAULT_CACHE_SIZE: usize = 256;
const DEFAULT_ENTROPY_THRESHOLD: f64 = 1.9;

/// Result of classifying a single (text, context) pair (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub class: Class,
    pub confidence: f64,
    pub entropy: f64,
}

/// Shannon entropy in bits, `H = -sum(p * log2(p))` over nonzero
/// probabilities.
pub fn entropy(probs: &[f64]) -> f64 {
    -probs
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| p * p.log2())
        .sum::<f64>()
}

/// Confidence score per spec §4.5: `0.7*(1 - H/Hmax) + 0.2*max(p) +
/// 0.1*dominance_ratio`, clamped to `[0, 1]`. `dominance_ratio` is
/// `p_max / p_second` scaled by `1/10`, capped at 1; when there is no
/// second-highest probability (or it is zero), the ratio saturates at 1.
pub fn confidence(probs: &[f64], h_max: f64) -> f64 {
    if probs.is_empty() {
        return 0.0;
    }
    let h = entropy(probs);
    let mut sorted: Vec<f64> = probs.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
    let p_max = sorted[0];
    let p_second = sorted.get(1).copied().unwrap_or(0.0);

    let dominance_ratio = if p_second <= 0.0 {
        1.0
    } else {
        ((p_max / p_second) / 10.0).min(1.0)
    };

    let h_term = if h_max > 0.0 { 1.0 - (h / h_max) } else { 1.0 };
    let score = 0.7 * h_term + 0.2 * p_max + 0.1 * dominance_ratio;
    score.clamp(0.0, 1.0)
}

/// `H_max` for the classifier's three live classes (spec §9 open
/// question, resolved).
pub fn h_max() -> f64 {
    (Class::ALL.len() as f64).log2()
}

/// Social/presence-test patterns (spec §4.5 step 2). Matched as a
/// case-insensitive whole-message or leading-token check so "hi" matches
/// but "history" does not.
fn matches_ping_pattern(text_lower: &str, patterns: &[&str]) -> bool {
    let trimmed = text_lower.trim_matches(|c: char| !c.is_alphanumeric() && c != ' ');
    patterns.iter().any(|p| {
        trimmed == *p
            || trimmed.starts_with(&format!("{p} "))
            || trimmed.ends_with(&format!(" {p}"))
    })
}

/// Pure classification function (spec §4.5 algorithm):
/// 1. explicit long-form token or `context == ask` -> `gen_long`.
/// 2. trivial/social pattern -> `ping`.
/// 3. otherwise -> `gen_short`.
///
/// Each branch produces a degenerate one-hot distribution, so entropy is
/// always 0 and the fallback never actually triggers for this algorithm;
/// the gate is still evaluated generically so it is exercised and
/// testable against synthetic distributions (see `confidence`/`entropy`
/// unit tests and `classify_with_distribution`).
pub fn classify(text: &str, context: Context, long_form_token: &str, ping_patterns: &[&str]) -> Classification {
    let lower = text.to_lowercase();
    let h_max = h_max();

    let (class, probs) = if lower.contains(&long_form_token.to_lowercase()) || context == Context::Ask {
        (Class::GenLong, one_hot(Class::GenLong))
    } else if matches_ping_pattern(&lower, ping_patterns) {
        (Class::Ping, one_hot(Class::Ping))
    } else {
        (Class::GenShort, one_hot(Class::GenShort))
    };

    classify_with_distribution(class, &probs, h_max, DEFAULT_ENTROPY_THRESHOLD, Class::GenShort)
}

fn one_hot(winner: Class) -> [f64; 3] {
    let mut probs = [0.0; 3];
    for (i, c) in Class::ALL.iter().enumerate() {
        probs[i] = if *c == winner { 1.0 } else { 0.0 };
    }
    probs
}

/// Applies the entropy-gated fallback policy (spec §4.5 "Fallback
/// policy") to an arbitrary distribution: if entropy exceeds
/// `threshold`, return `safe_class` instead of `argmax_class`.
pub fn classify_with_distribution(
    argmax_class: Class,
    probs: &[f64],
    h_max: f64,
    threshold: f64,
    safe_class: Class,
) -> Classification {
    let h = entropy(probs);
    let conf = confidence(probs, h_max);
    let class = if h > threshold { safe_class } else { argmax_class };
    Classification {
        class,
        confidence: conf,
        entropy: h,
    }
}

/// Memoizing wrapper around [`classify`], keyed by `(text, context)`
/// (spec §4.5 "small LRU cache").
pub struct Classifier {
    cache: Mutex<LruCache<(String, Context), Classification>>,
    long_form_token: String,
    ping_patterns: Vec<String>,
}

impl Classifier {
    pub fn new(long_form_token: impl Into<String>, ping_patterns: Vec<String>) -> Self {
        Self::with_cache_size(long_form_token, ping_patterns, DEFAULT_CACHE_SIZE)
    }

    pub fn with_cache_size(long_form_token: impl Into<String>, ping_patterns: Vec<String>, cache_size: usize) -> Self {
        let cap = NonZeroUsize::new(cache_size.max(1)).unwrap();
        Self {
            cache: Mutex::new(LruCache::new(cap)),
            long_form_token: long_form_token.into(),
            ping_patterns,
        }
    }

    pub fn classify(&self, text: &str, context: Context) -> Classification {
        let key = (text.to_string(), context);
        if let Some(hit) = self.cache.lock().get(&key) {
            return *hit;
        }
        let patterns: Vec<&str> = self.ping_patterns.iter().map(String::as_str).collect();
        let result = classify(text, context, &self.long_form_token, &patterns);
        self.cache.lock().put(key, result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> Vec<&'static str> {
        vec!["hi", "hello", "hey", "thanks", "gg"]
    }

    #[test]
    fn ask_context_always_gen_long() {
        let c = classify("what is entropy", Context::Ask, "!ask", &patterns());
        assert_eq!(c.class, Class::GenLong);
        assert_eq!(c.entropy, 0.0);
    }

    #[test]
    fn explicit_long_form_token_wins_even_outside_ask() {
        let c = classify("!ask explain recursion", Context::Other, "!ask", &patterns());
        assert_eq!(c.class, Class::GenLong);
    }

    #[test]
    fn social_pattern_is_ping() {
        let c = classify("hey there", Context::Other, "!ask", &patterns());
        assert_eq!(c.class, Class::Ping);
    }

    #[test]
    fn unmatched_text_falls_to_gen_short() {
        let c = classify("tell me about rust ownership", Context::Other, "!ask", &patterns());
        assert_eq!(c.class, Class::GenShort);
    }

    #[test]
    fn degenerate_distribution_has_full_confidence() {
        let c = classify("hi", Context::Other, "!ask", &patterns());
        assert!((c.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn entropy_bounds_hold_for_all_classes() {
        for class in Class::ALL {
            let probs = match class {
                Class::Ping => one_hot(Class::Ping),
                Class::GenShort => one_hot(Class::GenShort),
                Class::GenLong => one_hot(Class::GenLong),
            };
            let h = entropy(&probs);
            assert!((0.0..=h_max()).contains(&h));
        }
    }

    #[test]
    fn uniform_distribution_has_max_entropy_and_triggers_fallback() {
        let probs = [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0];
        let hmax = h_max();
        assert!((entropy(&probs) - hmax).abs() < 1e-9);
        let result = classify_with_distribution(Class::Ping, &probs, hmax, 1.0, Class::GenShort);
        assert_eq!(result.class, Class::GenShort);
    }

    #[test]
    fn entropy_at_or_below_threshold_keeps_argmax() {
        let probs = [0.8, 0.1, 0.1];
        let result = classify_with_distribution(Class::Ping, &probs, h_max(), DEFAULT_ENTROPY_THRESHOLD, Class::GenShort);
        assert_eq!(result.class, Class::Ping);
    }

    #[test]
    fn cache_memoizes_repeated_lookups() {
        let classifier = Classifier::new("!ask", patterns().into_iter().map(String::from).collect());
        let a = classifier.classify("hi", Context::Other);
        let b = classifier.classify("hi", Context::Other);
        assert_eq!(a.class, b.class);
    }

    #[test]
    fn confidence_is_within_unit_interval_for_mixed_distributions() {
        let probs = [0.5, 0.3, 0.2];
        let c = confidence(&probs, h_max());
        assert!((0.0..=1.0).contains(&c));
    }
}
