//! Pure, stateless scoring primitives.
//!
//! Every public scoring function in the engine funnels its result through
//! [`clamp`] so the `[0, 100]` invariant holds regardless of how the factor
//! inputs combine. None of these functions perform I/O.

use serde::{Deserialize, Serialize};

/// Clip a raw score into the canonical `[0, 100]` band.
pub fn clamp(value: f64) -> f64 {
    clamp_to(value, 0.0, 100.0)
}

pub fn clamp_to(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.clamp(min, max)
}

/// Linear rescale of `value` from `[min, max]` into `[0, 100]`.
///
/// A degenerate range (`max <= min`) yields 0 rather than an error; callers
/// treat it as "no signal".
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return 0.0;
    }
    clamp((value - min) / (max - min) * 100.0)
}

/// Exponential half-life weight for a contribution `days_ago` old.
///
/// The half-life is floored at one day so a zero or negative configuration
/// cannot blow up the exponent.
pub fn time_decay_weight(days_ago: f64, half_life_days: f64) -> f64 {
    let half_life = half_life_days.max(1.0);
    (-std::f64::consts::LN_2 / half_life * days_ago.max(0.0)).exp()
}

/// Weighted average over `(weight, value)` pairs, clamped to `[0, 100]`.
///
/// A zero total weight yields 0 instead of dividing by zero.
pub fn weighted_average(pairs: &[(f64, f64)]) -> f64 {
    let total_weight: f64 = pairs.iter().map(|(weight, _)| weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let total: f64 = pairs.iter().map(|(weight, value)| weight * value).sum();
    clamp(total / total_weight)
}

/// Categorical bucket derived from a numeric lead score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadTier {
    Hot,
    Warm,
    Cold,
}

impl LeadTier {
    /// Bucket a score against explicit thresholds.
    pub fn from_score(score: f64, hot: f64, warm: f64) -> Self {
        if score >= hot {
            Self::Hot
        } else if score >= warm {
            Self::Warm
        } else {
            Self::Cold
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            LeadTier::Hot => "hot",
            LeadTier::Warm => "warm",
            LeadTier::Cold => "cold",
        }
    }
}

/// The four named lead-score sub-scores, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeadFactors {
    pub demographic: f64,
    pub engagement: f64,
    pub behavioral: f64,
    pub historical: f64,
}

/// Relative weights for the lead-score factors. Defaults sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeadScoreWeights {
    pub demographic: f64,
    pub engagement: f64,
    pub behavioral: f64,
    pub historical: f64,
}

impl Default for LeadScoreWeights {
    fn default() -> Self {
        Self {
            demographic: 0.25,
            engagement: 0.25,
            behavioral: 0.25,
            historical: 0.25,
        }
    }
}

/// Composite lead score plus its tier bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredLead {
    pub score: f64,
    pub tier: LeadTier,
}

/// Combine the four lead factors into one score.
///
/// The tier returned here uses the fixed 80/60 boundaries. Tenants with
/// custom thresholds re-bucket the score in the orchestrator; this function
/// stays threshold-agnostic.
pub fn score_lead(factors: &LeadFactors, weights: &LeadScoreWeights) -> ScoredLead {
    let score = weighted_average(&[
        (weights.demographic, factors.demographic),
        (weights.engagement, factors.engagement),
        (weights.behavioral, factors.behavioral),
        (weights.historical, factors.historical),
    ]);

    ScoredLead {
        score,
        tier: LeadTier::from_score(score, 80.0, 60.0),
    }
}

/// The five named discipline sub-scores, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisciplineFactors {
    pub follow_up: f64,
    pub meeting_adherence: f64,
    pub task_completion: f64,
    pub data_entry: f64,
    pub pipeline_hygiene: f64,
}

/// Relative weights for the discipline factors. Defaults sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisciplineWeights {
    pub follow_up: f64,
    pub meeting_adherence: f64,
    pub task_completion: f64,
    pub data_entry: f64,
    pub pipeline_hygiene: f64,
}

impl Default for DisciplineWeights {
    fn default() -> Self {
        Self {
            follow_up: 0.2,
            meeting_adherence: 0.2,
            task_completion: 0.2,
            data_entry: 0.2,
            pipeline_hygiene: 0.2,
        }
    }
}

/// Combine the five discipline factors into one score.
pub fn score_discipline(factors: &DisciplineFactors, weights: &DisciplineWeights) -> f64 {
    weighted_average(&[
        (weights.follow_up, factors.follow_up),
        (weights.meeting_adherence, factors.meeting_adherence),
        (weights.task_completion, factors.task_completion),
        (weights.data_entry, factors.data_entry),
        (weights.pipeline_hygiene, factors.pipeline_hygiene),
    ])
}

/// Wilson score confidence bounds for a binomial proportion, scaled to
/// `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WilsonInterval {
    pub low: f64,
    pub high: f64,
}

/// Wilson score interval at confidence `z` (1.96 for 95%).
///
/// A zero-sample cohort yields `{0, 100}`: maximal uncertainty, not
/// certainty. Callers must treat it as "no signal".
pub fn wilson_interval(successes: u64, total: u64, z: f64) -> WilsonInterval {
    if total == 0 {
        return WilsonInterval {
            low: 0.0,
            high: 100.0,
        };
    }

    let n = total as f64;
    let p = successes.min(total) as f64 / n;
    let z2 = z * z;
    let denominator = 1.0 + z2 / n;
    let center = p + z2 / (2.0 * n);
    let margin = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt();

    WilsonInterval {
        low: clamp((center - margin) / denominator * 100.0),
        high: clamp((center + margin) / denominator * 100.0),
    }
}
