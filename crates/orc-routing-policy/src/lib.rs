//! Epsilon-greedy ranking over the bandit aggregate.
//!
//! Mirrors `examples/original_source/app/bandit.py::rank_models`
//! exactly: with probability `epsilon`, shuffle candidates uniformly;
//! otherwise sort by `(-mean, speed_rank)`. Mode-specific preferences
//! take priority over both when configured.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;

use orc_reward_store::BanditAggregate;
use orc_types::feature::{CtxBucket, FeatureVector, RepoBucket};
use orc_types::Task;

pub const PRIOR_MEAN: f64 = 0.5;
pub const PRIOR_COUNT: f64 = 1.0;

/// Derive the feature vector RoutingPolicy and RewardStore key
/// aggregates on, from a submitted task.
pub fn extract_features(task: &Task) -> FeatureVector {
    let language = task.input.language.clone().unwrap_or_else(|| "unknown".to_string());
    let repo_bucket = RepoBucket::from_include_count(task.input.repo.include.len());
    let tests_present = task.input.goal.to_lowercase().contains("test")
        || task
            .output_contract
            .as_ref()
            .map(|oc| oc.expected_files.iter().any(|f| f.to_lowercase().contains("test")))
            .unwrap_or(false);
    let ctx_bucket = CtxBucket::from_max_tokens(task.input.constraints.max_tokens);
    FeatureVector {
        language,
        repo_bucket,
        tests_present,
        ctx_bucket,
    }
}

#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    pub epsilon: f64,
    pub prior_mean: f64,
    pub prior_count: f64,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            prior_mean: PRIOR_MEAN,
            prior_count: PRIOR_COUNT,
        }
    }
}

impl RoutingPolicy {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            ..Default::default()
        }
    }

    fn estimate_mean(&self, aggregate: Option<&BanditAggregate>) -> f64 {
        match aggregate {
            Some(agg) => agg.mean(self.prior_mean, self.prior_count),
            None => self.prior_mean,
        }
    }

    /// Rank `candidates` given their bandit aggregates and a
    /// `speed_rank` lookup (lower is faster, unknown defaults to a
    /// slow tail value). `mode_preferences`, if non-empty, is a
    /// declared list of preferred tags: each candidate's position in
    /// it is the primary sort key, then speed_rank — this overrides
    /// the epsilon-greedy pass entirely, matching §4.7.
    pub fn rank<R: Rng + ?Sized>(
        &self,
        candidates: &[String],
        aggregates: &HashMap<String, BanditAggregate>,
        speed_rank: &dyn Fn(&str) -> u32,
        mode_preferences: &[String],
        rng: &mut R,
    ) -> Vec<String> {
        if !mode_preferences.is_empty() {
            let mut ranked = candidates.to_vec();
            ranked.sort_by_key(|c| {
                let pref_rank = mode_preferences
                    .iter()
                    .position(|p| p == c)
                    .unwrap_or(mode_preferences.len());
                (pref_rank, speed_rank(c))
            });
            return ranked;
        }

        let mut ranked = candidates.to_vec();
        if rng.gen::<f64>() < self.epsilon {
            ranked.shuffle(rng);
            return ranked;
        }

        ranked.sort_by(|a, b| {
            let mean_a = self.estimate_mean(aggregates.get(a));
            let mean_b = self.estimate_mean(aggregates.get(b));
            mean_b
                .partial_cmp(&mean_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| speed_rank(a).cmp(&speed_rank(b)))
        });
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::mock::StepRng;

    fn agg(model: &str, runs: i64, reward_sum: f64) -> BanditAggregate {
        BanditAggregate {
            model: model.to_string(),
            feature_hash: "h".to_string(),
            runs,
            reward_sum,
            reward_sq_sum: 0.0,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn greedy_pass_sorts_by_mean_desc() {
        let policy = RoutingPolicy::new(0.0);
        let mut aggregates = HashMap::new();
        aggregates.insert("a".to_string(), agg("a", 10, 9.0));
        aggregates.insert("b".to_string(), agg("b", 10, 1.0));
        let candidates = vec!["b".to_string(), "a".to_string()];
        // epsilon 0.0 with StepRng always below any epsilon > 0 only if
        // value is 0; force epsilon=0.0 so the random branch can never
        // trigger regardless of rng value.
        let mut rng = StepRng::new(u64::MAX / 2, 1);
        let ranked = policy.rank(&candidates, &aggregates, &|_| 50, &[], &mut rng);
        assert_eq!(ranked, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn mode_preferences_override_everything() {
        let policy = RoutingPolicy::new(0.0);
        let aggregates = HashMap::new();
        let candidates = vec!["slow-pref".to_string(), "fast-nopref".to_string()];
        let prefs = vec!["slow-pref".to_string()];
        let mut rng = StepRng::new(0, 1);
        let speed = |c: &str| if c == "fast-nopref" { 1 } else { 99 };
        let ranked = policy.rank(&candidates, &aggregates, &speed, &prefs, &mut rng);
        assert_eq!(ranked[0], "slow-pref");
    }

    #[test]
    fn ties_broken_by_speed_rank() {
        let policy = RoutingPolicy::new(0.0);
        let aggregates = HashMap::new();
        let candidates = vec!["a".to_string(), "b".to_string()];
        let mut rng = StepRng::new(0, 1);
        let speed = |c: &str| if c == "b" { 1 } else { 5 };
        let ranked = policy.rank(&candidates, &aggregates, &speed, &[], &mut rng);
        assert_eq!(ranked[0], "b");
    }
}
