//! Reward shaping fed back to the dispatcher's bandit (spec.md §4.3,
//! §4.4 "Reward shaping").

/// A small, fixed emoji set used as a quality signal.
const EMOJI_SET: &[char] = &['🙂', '😄', '😂', '🎉', '👍', '🔥', '❤', '😉', '🤖'];

pub struct RewardWeights {
    pub latency_target_secs: f64,
    pub latency_weight: f64,
    pub length_bonus: f64,
    pub punctuation_bonus: f64,
    pub emoji_bonus: f64,
    pub length_threshold: usize,
    pub floor: f64,
}

impl RewardWeights {
    pub fn local() -> Self {
        Self {
            latency_target_secs: 1.0,
            latency_weight: 0.3,
            length_bonus: 0.2,
            punctuation_bonus: 0.1,
            emoji_bonus: 0.15,
            length_threshold: 20,
            floor: 0.1,
        }
    }

    /// Cloud backend uses the same shape with a longer latency target and
    /// lighter quality weights (spec.md §4.4).
    pub fn cloud() -> Self {
        Self {
            latency_target_secs: 2.0,
            latency_weight: 0.3,
            length_bonus: 0.1,
            punctuation_bonus: 0.05,
            emoji_bonus: 0.08,
            length_threshold: 20,
            floor: 0.1,
        }
    }
}

/// Base 1.0, minus a latency penalty capped at the configured weight,
/// plus quality bonuses, floored so a backend is never scored at zero.
pub fn shape(text: &str, latency_secs: f64, weights: &RewardWeights) -> f64 {
    let mut reward = 1.0;

    let latency_penalty = (latency_secs / weights.latency_target_secs).min(1.0) * weights.latency_weight;
    reward -= latency_penalty;

    if text.chars().count() > weights.length_threshold {
        reward += weights.length_bonus;
    }
    if text.contains(['.', '!', '?']) {
        reward += weights.punctuation_bonus;
    }
    if text.chars().any(|c| EMOJI_SET.contains(&c)) {
        reward += weights.emoji_bonus;
    }

    reward.max(weights.floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_slow_response_is_floored_not_negative() {
        let reward = shape("x", 10.0, &RewardWeights::local());
        assert!(reward >= RewardWeights::local().floor);
    }

    #[test]
    fn long_punctuated_emoji_response_scores_higher() {
        let weights = RewardWeights::local();
        let plain = shape("short", 0.1, &weights);
        let rich = shape("a reasonably long reply with punctuation! 🔥", 0.1, &weights);
        assert!(rich > plain);
    }
}
