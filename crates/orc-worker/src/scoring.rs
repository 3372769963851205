//! Duel and tree-of-thought-beam scoring formulas.
//!
//! Constants and formulas are carried over verbatim from
//! `examples/original_source/app/duel_config.py` (duel defaults) and
//! `examples/original_source/app/queue.py::_tot_score`.

use orc_types::CandidateResult;

#[derive(Debug, Clone, Copy)]
pub struct DuelWeights {
    pub success_weight: f64,
    pub test_pass_weight: f64,
    pub latency_penalty_ms: f64,
    pub human_score_weight: f64,
}

impl Default for DuelWeights {
    fn default() -> Self {
        Self {
            success_weight: 1.0,
            test_pass_weight: 0.5,
            latency_penalty_ms: 0.001,
            human_score_weight: 0.05,
        }
    }
}

/// `success_weight*success + test_pass_weight*test_pass -
/// latency_penalty_ms*latency_ms + human_score_weight*human_score`.
/// `human_score` defaults to 0.0 — no human-in-the-loop feedback channel
/// feeds the duel path yet.
pub fn duel_score(result: &CandidateResult, weights: &DuelWeights, human_score: f64) -> f64 {
    let success = if result.success { 1.0 } else { 0.0 };
    let test_pass = if result.test_pass { 1.0 } else { 0.0 };
    weights.success_weight * success + weights.test_pass_weight * test_pass
        - weights.latency_penalty_ms * result.latency_ms as f64
        + weights.human_score_weight * human_score
}

const TOT_COMPILE_WEIGHT: f64 = 1.0;
const TOT_TEST_WEIGHT: f64 = 1.5;
const TOT_LINT_WEIGHT: f64 = 0.4;
const TOT_SMOKE_WEIGHT: f64 = 0.4;
const TOT_LATENCY_PENALTY: f64 = 0.0005;

/// `compile_weight*compile_pass + test_weight*test_pass + lint_weight*lint_pass
/// + smoke_weight*smoke_pass - latency_penalty*latency_ms`.
pub fn tot_score(result: &CandidateResult) -> f64 {
    let compile_pass = if result.compile_pass { 1.0 } else { 0.0 };
    let test_pass = if result.test_pass { 1.0 } else { 0.0 };
    let lint_pass = if result.lint_pass.unwrap_or(false) { 1.0 } else { 0.0 };
    let smoke_pass = if result.smoke_pass.unwrap_or(false) { 1.0 } else { 0.0 };
    TOT_COMPILE_WEIGHT * compile_pass + TOT_TEST_WEIGHT * test_pass + TOT_LINT_WEIGHT * lint_pass
        + TOT_SMOKE_WEIGHT * smoke_pass
        - TOT_LATENCY_PENALTY * result.latency_ms as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_types::CandidateLogs;

    fn base_result() -> CandidateResult {
        CandidateResult {
            model: "m1".into(),
            success: true,
            latency_ms: 1000,
            compile_pass: true,
            test_pass: true,
            lint_pass: Some(true),
            smoke_pass: Some(false),
            tool: "maven".into(),
            logs: CandidateLogs::default(),
            artifact_path: None,
            content: String::new(),
            files: Default::default(),
            zip_url: None,
            zip_notes: vec![],
            missing_components: vec![],
            follow_up_steps: vec![],
            sandbox_root: None,
            merge_root: None,
            pending_final: false,
        }
    }

    #[test]
    fn duel_score_rewards_success_and_test_pass() {
        let result = base_result();
        let score = duel_score(&result, &DuelWeights::default(), 0.0);
        // 1.0*1 + 0.5*1 - 0.001*1000 + 0.05*0 = 1.5 - 1.0 = 0.5
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn tot_score_combines_all_four_signals() {
        let result = base_result();
        let score = tot_score(&result);
        // 1.0 + 1.5 + 0.4 + 0.0 - 0.0005*1000 = 2.9 - 0.5 = 2.4
        assert!((score - 2.4).abs() < 1e-9);
    }

    #[test]
    fn failing_candidate_scores_lower() {
        let mut failing = base_result();
        failing.success = false;
        failing.test_pass = false;
        failing.compile_pass = false;
        let good = base_result();
        assert!(duel_score(&failing, &DuelWeights::default(), 0.0) < duel_score(&good, &DuelWeights::default(), 0.0));
        assert!(tot_score(&failing) < tot_score(&good));
    }
}
