//! # Scoring
//!
//! Pure functions that turn raw counts and metric values into normalized 0-100
//! scores, plus the [`ScoreSet`] value cached on executions, step results and
//! sessions.
//!
//! Every function guards its denominator: an empty input yields `0.0` except
//! [`validation_pass_rate`], where the absence of checks is not a failure and
//! yields `100.0`.

use serde::{Deserialize, Serialize};

const MAX_SCORE: f64 = 100.0;

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, MAX_SCORE)
}

/// `passed / total * 100`, `0.0` when nothing ran.
pub fn success_rate(passed: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    clamp_score(f64::from(passed) / f64::from(total) * MAX_SCORE)
}

/// Average of the numeric performance values, each clamped to `[0, 100]`.
///
/// Values that do not parse as finite numbers are skipped rather than counted
/// as zero.
pub fn performance_score<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    let (total, count) = values
        .into_iter()
        .filter_map(|raw| raw.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .fold((0.0, 0usize), |(total, count), value| {
            (total + clamp_score(value), count + 1)
        });

    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Share of security checks that did not turn up a vulnerability.
///
/// `(checks + findings - vulnerabilities) / (checks + findings) * 100`, `0.0`
/// when no checks or findings were recorded.
pub fn security_score(security_checks: usize, security_findings: usize, vulnerabilities: usize) -> f64 {
    let total = security_checks + security_findings;
    if total == 0 {
        return 0.0;
    }
    let passed = total as f64 - vulnerabilities as f64;
    clamp_score(passed / total as f64 * MAX_SCORE)
}

/// Share of validation checks that held; `100.0` when there were no checks.
pub fn validation_pass_rate(validation_checks: usize, failed_validations: usize) -> f64 {
    if validation_checks == 0 {
        return MAX_SCORE;
    }
    let passed = validation_checks as f64 - failed_validations as f64;
    clamp_score(passed / validation_checks as f64 * MAX_SCORE)
}

/// Mean of the test pass rate and the validation pass rate.
pub fn quality_score(test_pass_rate: f64, validation_pass_rate: f64) -> f64 {
    clamp_score((test_pass_rate + validation_pass_rate) / 2.0)
}

/// Mean of the components strictly greater than zero; `0.0` if none are.
///
/// A zero component is treated as "not measured" and left out of the
/// denominator.
pub fn overall_score(components: &[f64]) -> f64 {
    let (total, count) = components
        .iter()
        .filter(|score| **score > 0.0)
        .fold((0.0, 0usize), |(total, count), score| (total + score, count + 1));

    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Derived score tuple for one level of the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreSet {
    pub success_rate: f64,
    pub quality_score: f64,
    pub security_score: f64,
    pub performance_score: f64,
    pub overall_score: f64,
}

impl ScoreSet {
    /// Build a score set from its four components, deriving the overall score.
    pub fn from_components(
        success_rate: f64,
        quality_score: f64,
        security_score: f64,
        performance_score: f64,
    ) -> Self {
        let overall_score =
            overall_score(&[success_rate, quality_score, security_score, performance_score]);
        Self {
            success_rate,
            quality_score,
            security_score,
            performance_score,
            overall_score,
        }
    }

    /// Roll child score sets up into a parent.
    ///
    /// The parent's success rate comes from its own counters. Every other
    /// component is the mean of the children's non-zero values for it.
    pub fn aggregate<'a, I>(success_rate: f64, children: I) -> Self
    where
        I: IntoIterator<Item = &'a ScoreSet>,
    {
        let children: Vec<&ScoreSet> = children.into_iter().collect();
        let component = |pick: fn(&ScoreSet) -> f64| {
            let values: Vec<f64> = children.iter().map(|child| pick(child)).collect();
            overall_score(&values)
        };

        Self::from_components(
            success_rate,
            component(|s| s.quality_score),
            component(|s| s.security_score),
            component(|s| s.performance_score),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_guards_zero_total() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(7, 10), 70.0);
        assert_eq!(success_rate(12, 10), 100.0);
    }

    #[test]
    fn test_performance_score_skips_unparsable_values() {
        let score = performance_score(["80", "not-a-number", "120", " 40 ", "NaN"]);
        // 80, 100 (clamped), 40
        assert!((score - 73.333_333).abs() < 1e-3);
        assert_eq!(performance_score(Vec::<&str>::new()), 0.0);
        assert_eq!(performance_score(["-15"]), 0.0);
    }

    #[test]
    fn test_security_score() {
        assert_eq!(security_score(0, 0, 0), 0.0);
        assert_eq!(security_score(3, 1, 1), 75.0);
        assert_eq!(security_score(1, 0, 4), 0.0);
    }

    #[test]
    fn test_validation_pass_rate_defaults_to_full_marks() {
        assert_eq!(validation_pass_rate(0, 0), 100.0);
        assert_eq!(validation_pass_rate(4, 1), 75.0);
    }

    #[test]
    fn test_quality_score_is_mean() {
        assert_eq!(quality_score(80.0, 100.0), 90.0);
    }

    #[test]
    fn test_overall_score_excludes_zero_components() {
        assert_eq!(overall_score(&[0.0, 0.0, 0.0, 0.0]), 0.0);
        assert_eq!(overall_score(&[80.0, 0.0, 60.0, 0.0]), 70.0);
        assert_eq!(overall_score(&[]), 0.0);
    }

    #[test]
    fn test_aggregate_uses_non_zero_children() {
        let a = ScoreSet::from_components(100.0, 80.0, 0.0, 50.0);
        let b = ScoreSet::from_components(50.0, 60.0, 90.0, 0.0);

        let parent = ScoreSet::aggregate(75.0, [&a, &b]);
        assert_eq!(parent.success_rate, 75.0);
        assert_eq!(parent.quality_score, 70.0);
        assert_eq!(parent.security_score, 90.0);
        assert_eq!(parent.performance_score, 50.0);
        assert_eq!(parent.overall_score, (75.0 + 70.0 + 90.0 + 50.0) / 4.0);
    }
}
