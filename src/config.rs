use serde::Deserialize;

/// Weights and knobs for the order-to-line model.
///
/// Mirrors the keyword defaults of the original `main(makespan_weight=1,
/// tardiness_weight=1, ...)` entry point.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OtlConfig {
    pub makespan_weight: i64,
    pub tardiness_weight: i64,
}

impl Default for OtlConfig {
    fn default() -> Self {
        OtlConfig {
            makespan_weight: 1,
            tardiness_weight: 1,
        }
    }
}

/// Which worker-to-line model to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WlaModel {
    /// Elementary-interval, per-worker-per-interval-per-line assignment.
    /// Staffing is a soft offset term, medical fitness is a hard constraint.
    Interval,
    /// Single assignment per worker for the whole horizon. Staffing is a
    /// hard [min, max] band, medical fitness is a hard constraint.
    Coarse,
}

impl Default for WlaModel {
    fn default() -> Self {
        WlaModel::Interval
    }
}

/// Weights and knobs for the worker-to-line model.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WlaConfig {
    pub preference_weight: i64,
    pub experience_weight: i64,
    pub resilience_weight: i64,
    pub staffing_weight: i64,
    /// If the first solve with the medical hard constraint in place yields no
    /// assignments at all, retry once with that constraint lifted. Replaces
    /// the original prototype's process-global `medical_flag` retry: this is
    /// an explicit, caller-visible opt-in instead.
    pub allow_medical_relaxation: bool,
    pub model: WlaModel,
}

impl Default for WlaConfig {
    fn default() -> Self {
        WlaConfig {
            preference_weight: 1,
            experience_weight: 1,
            resilience_weight: 1,
            staffing_weight: 1,
            allow_medical_relaxation: false,
            model: WlaModel::default(),
        }
    }
}
