//! Efficiency classification
//!
//! A total, deterministic mapping from average GPU utilization to one of
//! four ordered classes. Band boundaries are inclusive on the lower bound.

use crate::config::ClassThresholds;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four ordered efficiency classes, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EfficiencyClass {
    /// Utilization at or above the efficient band
    Efficient,
    /// Utilization in the acceptable band
    Acceptable,
    /// Utilization in the inefficient band
    Inefficient,
    /// Utilization below every band
    Wasted,
}

impl EfficiencyClass {
    /// Fixed serialized form of the class
    pub fn as_str(&self) -> &'static str {
        match self {
            EfficiencyClass::Efficient => "EFFICIENT",
            EfficiencyClass::Acceptable => "ACCEPTABLE",
            EfficiencyClass::Inefficient => "INEFFICIENT",
            EfficiencyClass::Wasted => "WASTED",
        }
    }
}

impl fmt::Display for EfficiencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map an average utilization to its efficiency class
///
/// Total over all finite inputs; each band includes its lower bound.
pub fn classify(avg_gpu_util_pct: f64, thresholds: &ClassThresholds) -> EfficiencyClass {
    if avg_gpu_util_pct >= thresholds.efficient_min_pct {
        EfficiencyClass::Efficient
    } else if avg_gpu_util_pct >= thresholds.acceptable_min_pct {
        EfficiencyClass::Acceptable
    } else if avg_gpu_util_pct >= thresholds.inefficient_min_pct {
        EfficiencyClass::Inefficient
    } else {
        EfficiencyClass::Wasted
    }
}
