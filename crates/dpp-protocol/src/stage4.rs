//! Stage 4 — cross-session statistical consistency over the agent's prior
//! sessions.

use dpp_domain::stats::{coefficient_of_variation, mean, population_std};
use dpp_domain::SessionRow;

use crate::config::StageConfig;

pub struct Stage4Outcome {
    pub stats: serde_json::Value,
    pub reject_reason: Option<String>,
}

pub fn analyze(history: &[SessionRow], config: &StageConfig) -> Stage4Outcome {
    if history.len() < config.min_history_sessions {
        return Stage4Outcome {
            stats: serde_json::json!({"skipped": true}),
            reject_reason: None,
        };
    }

    let timestamps: Vec<f64> = history.iter().map(|s| s.timestamp).collect();
    let intervals: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();

    if intervals.is_empty() {
        return Stage4Outcome {
            stats: serde_json::json!({"reason": "insufficient_intervals"}),
            reject_reason: None,
        };
    }

    let interval_mean = mean(&intervals);
    let interval_cv = coefficient_of_variation(&intervals);

    let mut stats = serde_json::json!({
        "session_count": history.len(),
        "interval_cv": interval_cv,
        "interval_mean_s": interval_mean,
    });

    let stage1_times: Vec<f64> = history
        .iter()
        .filter_map(|s| s.timings.get("stage1"))
        .filter_map(|v| v.as_f64())
        .collect();

    if stage1_times.len() >= 3 {
        let stage1_cv = coefficient_of_variation(&stage1_times);
        stats["stage1_timing_cv"] = serde_json::json!(stage1_cv);

        if stage1_cv > config.stage1_cv_reject_threshold {
            return Stage4Outcome {
                stats,
                reject_reason: Some(format!(
                    "stage4_inconsistent: stage1_timing_cv={stage1_cv:.3} > {:.1} (human-like variance)",
                    config.stage1_cv_reject_threshold
                )),
            };
        }
    }

    let hours: Vec<f64> = timestamps
        .iter()
        .map(|t| (t.rem_euclid(86400.0)) / 3600.0)
        .collect();
    let hour_std = population_std(&hours);
    stats["hour_std"] = serde_json::json!(hour_std);

    if history.len() >= config.min_sessions_for_hour_check && hour_std < config.hour_std_reject_threshold {
        return Stage4Outcome {
            stats,
            reject_reason: Some(format!(
                "stage4_inconsistent: hour_std={hour_std:.2} < {:.1} (sessions clustered in short window)",
                config.hour_std_reject_threshold
            )),
        };
    }

    Stage4Outcome {
        stats,
        reject_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpp_domain::Timings;

    fn session_at(timestamp: f64) -> SessionRow {
        SessionRow {
            id: 1,
            agent_id: "agent-1".to_string(),
            stage_reached: 4,
            timestamp,
            timings: Timings::new(),
            passed: true,
            reject_reason: None,
        }
    }

    #[test]
    fn fewer_than_minimum_sessions_is_skipped() {
        let config = StageConfig::test();
        let history = vec![session_at(0.0); 4];
        let outcome = analyze(&history, &config);
        assert!(outcome.reject_reason.is_none());
    }

    #[test]
    fn a_single_interval_with_no_stage1_history_passes() {
        let config = StageConfig::test();
        let history: Vec<SessionRow> = (0..5).map(|i| session_at(i as f64 * 100_000.0)).collect();
        let outcome = analyze(&history, &config);
        assert!(outcome.reject_reason.is_none());
    }

    #[test]
    fn erratic_stage1_timings_trigger_rejection() {
        let config = StageConfig::test();
        let erratic = [0.01, 1.2, 0.02, 1.1, 0.015];
        let history: Vec<SessionRow> = erratic
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let mut s = session_at(i as f64 * 100_000.0);
                s.timings.insert("stage1".to_string(), serde_json::json!(t));
                s
            })
            .collect();
        let outcome = analyze(&history, &config);
        assert!(outcome
            .reject_reason
            .as_deref()
            .unwrap()
            .starts_with("stage4_inconsistent: stage1_timing_cv="));
    }

    #[test]
    fn ten_sessions_clustered_in_a_short_window_are_rejected() {
        let config = StageConfig::test();
        let history: Vec<SessionRow> = (0..10).map(|i| session_at(i as f64 * 60.0)).collect();
        let outcome = analyze(&history, &config);
        assert!(outcome
            .reject_reason
            .as_deref()
            .unwrap()
            .starts_with("stage4_inconsistent: hour_std="));
    }
}
