//! Root-cause rule engine
//!
//! A fixed, ordered table of independent rules, each a pure predicate over
//! the derived metrics, the job's metric summary, and its metadata. Every
//! rule is evaluated - never short-circuited - and each contributes at most
//! one tagged, confidence-scored cause, so co-occurring diagnoses all
//! surface. Confidence is a linear margin from the triggering threshold,
//! clamped to [0, 1]; compound rules take the minimum of their component
//! margins. Rules that would need an absent metric skip instead of
//! substituting a value.

use crate::config::{AnalysisConfig, RuleThresholds};
use crate::metrics::EfficiencyMetrics;
use lens_core::{JobMetadata, JobMetricSummary};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Fixed vocabulary of root-cause tags
///
/// The report layer keys its documentation lookup on these values, so the
/// set is closed: every emitted cause carries one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCauseTag {
    /// Requested GPU count likely exceeds what the workload can use
    Overscaling,
    /// GPUs starved waiting on CPU-side work
    CpuBottleneck,
    /// Utilization collapses after startup: data loading or sync barriers
    IoOrSyncStall,
    /// Task-to-GPU mapping leaves most of a large allocation idle
    ParallelismMismatch,
    /// Low efficiency without a concrete matching signature
    Unknown,
}

impl RootCauseTag {
    /// Fixed serialized form of the tag
    pub fn as_str(&self) -> &'static str {
        match self {
            RootCauseTag::Overscaling => "overscaling",
            RootCauseTag::CpuBottleneck => "cpu_bottleneck",
            RootCauseTag::IoOrSyncStall => "io_or_sync_stall",
            RootCauseTag::ParallelismMismatch => "parallelism_mismatch",
            RootCauseTag::Unknown => "unknown",
        }
    }

    /// The complete vocabulary, in rule evaluation order
    pub fn all() -> &'static [RootCauseTag] {
        &[
            RootCauseTag::Overscaling,
            RootCauseTag::CpuBottleneck,
            RootCauseTag::IoOrSyncStall,
            RootCauseTag::ParallelismMismatch,
            RootCauseTag::Unknown,
        ]
    }
}

impl fmt::Display for RootCauseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured justification attached to a cause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Metric the rule triggered on
    pub metric: String,

    /// Observed value of that metric
    pub observed: f64,

    /// Threshold it was compared against
    pub threshold: f64,

    /// One-line human-readable summary
    pub detail: String,
}

/// One diagnosed cause with its confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCause {
    /// Tag from the fixed vocabulary
    pub tag: RootCauseTag,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// Structured justification
    pub evidence: Evidence,
}

/// Inputs shared by every rule
struct RuleCtx<'a> {
    metrics: &'a EfficiencyMetrics,
    summary: &'a JobMetricSummary,
    meta: &'a JobMetadata,
    thresholds: &'a RuleThresholds,
    active_threshold_pct: f64,
}

type RuleFn = fn(&RuleCtx<'_>) -> Option<RootCause>;

/// The rule table, in fixed evaluation order
const RULES: &[(RootCauseTag, RuleFn)] = &[
    (RootCauseTag::Overscaling, rule_overscaling),
    (RootCauseTag::CpuBottleneck, rule_cpu_bottleneck),
    (RootCauseTag::IoOrSyncStall, rule_io_or_sync_stall),
    (RootCauseTag::ParallelismMismatch, rule_parallelism_mismatch),
];

/// Evaluates the fixed rule set against one job
#[derive(Debug, Clone)]
pub struct RuleEngine {
    config: AnalysisConfig,
}

impl RuleEngine {
    /// Create a rule engine with the given configuration
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Evaluate every rule; returns causes in rule evaluation order
    ///
    /// The `unknown` fallback fires only when utilization sits below the
    /// acceptable band and no concrete rule matched.
    pub fn evaluate(
        &self,
        metrics: &EfficiencyMetrics,
        summary: &JobMetricSummary,
        meta: &JobMetadata,
    ) -> Vec<RootCause> {
        let ctx = RuleCtx {
            metrics,
            summary,
            meta,
            thresholds: &self.config.rules,
            active_threshold_pct: self.config.active_threshold_pct,
        };

        let mut causes = Vec::new();
        for (tag, rule) in RULES {
            if let Some(cause) = rule(&ctx) {
                debug!(tag = %tag, confidence = cause.confidence, "rule fired");
                causes.push(cause);
            }
        }

        if causes.is_empty() {
            let acceptable = self.config.classes.acceptable_min_pct;
            if metrics.avg_gpu_util_pct < acceptable {
                let confidence =
                    (0.5 * margin_below(metrics.avg_gpu_util_pct, acceptable, acceptable))
                        .clamp(0.0, 0.5);
                causes.push(RootCause {
                    tag: RootCauseTag::Unknown,
                    confidence,
                    evidence: Evidence {
                        metric: "avg_gpu_util_pct".to_string(),
                        observed: metrics.avg_gpu_util_pct,
                        threshold: acceptable,
                        detail: format!(
                            "average GPU utilization {:.1}% is below {:.0}% with no matching signature",
                            metrics.avg_gpu_util_pct, acceptable
                        ),
                    },
                });
            }
        }

        causes
    }
}

/// Linear margin for a value expected below a threshold
fn margin_below(observed: f64, threshold: f64, span: f64) -> f64 {
    if span <= 0.0 {
        return 0.0;
    }
    ((threshold - observed) / span).clamp(0.0, 1.0)
}

/// Linear margin for a value expected above a threshold
fn margin_above(observed: f64, threshold: f64, span: f64) -> f64 {
    if span <= 0.0 {
        return 0.0;
    }
    ((observed - threshold) / span).clamp(0.0, 1.0)
}

/// overscaling: low effective fraction and low peak memory on idle GPUs
fn rule_overscaling(ctx: &RuleCtx<'_>) -> Option<RootCause> {
    let t = ctx.thresholds;
    let fraction = ctx.metrics.effective_gpu_fraction;
    if fraction >= t.overscaling_max_fraction {
        return None;
    }

    // Memory evidence comes only from idle GPUs that actually reported a
    // peak footprint; with none reporting, the rule cannot fire.
    let idle_peaks: Vec<f64> = ctx
        .summary
        .gpus
        .iter()
        .filter(|g| !g.is_active(ctx.active_threshold_pct))
        .filter_map(|g| g.peak_mem_gb)
        .collect();
    if idle_peaks.is_empty() {
        return None;
    }

    let max_idle_mem = idle_peaks.iter().cloned().fold(f64::MIN, f64::max);
    if max_idle_mem >= t.overscaling_idle_mem_gb {
        return None;
    }

    let fraction_margin = margin_below(fraction, t.overscaling_max_fraction, t.overscaling_max_fraction);
    let mem_margin = margin_below(max_idle_mem, t.overscaling_idle_mem_gb, t.overscaling_idle_mem_gb);
    let confidence = fraction_margin.min(mem_margin);

    Some(RootCause {
        tag: RootCauseTag::Overscaling,
        confidence,
        evidence: Evidence {
            metric: "effective_gpu_fraction".to_string(),
            observed: fraction,
            threshold: t.overscaling_max_fraction,
            detail: format!(
                "{} of {} requested GPUs active; idle GPUs peaked at {:.2} GB",
                ctx.metrics.active_gpus, ctx.summary.gpus_requested, max_idle_mem
            ),
        },
    })
}

/// cpu_bottleneck: low GPU utilization while the CPU side runs hot
fn rule_cpu_bottleneck(ctx: &RuleCtx<'_>) -> Option<RootCause> {
    let t = ctx.thresholds;

    // Skipped outright when no CPU reading was observed.
    let cpu = ctx.summary.cpu_util_avg_pct?;

    let gpu = ctx.metrics.avg_gpu_util_pct;
    if gpu >= t.cpu_bound_max_gpu_util_pct || cpu <= t.cpu_bound_min_cpu_util_pct {
        return None;
    }

    let gpu_margin = margin_below(gpu, t.cpu_bound_max_gpu_util_pct, t.cpu_bound_max_gpu_util_pct);
    let cpu_margin = margin_above(cpu, t.cpu_bound_min_cpu_util_pct, 100.0 - t.cpu_bound_min_cpu_util_pct);
    let confidence = gpu_margin.min(cpu_margin);

    Some(RootCause {
        tag: RootCauseTag::CpuBottleneck,
        confidence,
        evidence: Evidence {
            metric: "cpu_util_avg_pct".to_string(),
            observed: cpu,
            threshold: t.cpu_bound_min_cpu_util_pct,
            detail: format!(
                "CPU at {:.1}% while GPUs average {:.1}%",
                cpu, gpu
            ),
        },
    })
}

/// io_or_sync_stall: high utilization right after start, sustained low after
///
/// Needs the time-bucketed traces; scalar aggregates cannot see the shape.
fn rule_io_or_sync_stall(ctx: &RuleCtx<'_>) -> Option<RootCause> {
    let t = ctx.thresholds;

    let traced: Vec<&[lens_core::UtilBucket]> = ctx
        .summary
        .gpus
        .iter()
        .filter_map(|g| g.util_trace.as_deref())
        .filter(|trace| trace.len() >= t.stall_min_buckets)
        .collect();
    if traced.is_empty() {
        return None;
    }

    let mut early_sum = 0.0;
    let mut tail_sum = 0.0;
    for trace in &traced {
        early_sum += trace[0].avg_util_pct;
        let tail = &trace[1..];
        tail_sum += tail.iter().map(|b| b.avg_util_pct).sum::<f64>() / tail.len() as f64;
    }
    let early = early_sum / traced.len() as f64;
    let tail = tail_sum / traced.len() as f64;

    if early <= t.stall_early_min_util_pct || tail >= t.stall_late_max_util_pct {
        return None;
    }

    let early_margin = margin_above(early, t.stall_early_min_util_pct, 100.0 - t.stall_early_min_util_pct);
    let tail_margin = margin_below(tail, t.stall_late_max_util_pct, t.stall_late_max_util_pct);
    let confidence = early_margin.min(tail_margin);

    Some(RootCause {
        tag: RootCauseTag::IoOrSyncStall,
        confidence,
        evidence: Evidence {
            metric: "util_trace".to_string(),
            observed: tail,
            threshold: t.stall_late_max_util_pct,
            detail: format!(
                "utilization opened at {:.1}% then settled at {:.1}% across {} traced GPUs",
                early, tail, traced.len()
            ),
        },
    })
}

/// parallelism_mismatch: a large request with only a sliver of it active
fn rule_parallelism_mismatch(ctx: &RuleCtx<'_>) -> Option<RootCause> {
    let t = ctx.thresholds;
    let requested = ctx.meta.gpus_requested;
    if requested < t.mismatch_min_gpus_requested {
        return None;
    }

    let active_fraction = ctx.metrics.active_gpus as f64 / requested as f64;
    if active_fraction >= t.mismatch_max_active_fraction {
        return None;
    }

    let confidence = margin_below(
        active_fraction,
        t.mismatch_max_active_fraction,
        t.mismatch_max_active_fraction,
    );

    Some(RootCause {
        tag: RootCauseTag::ParallelismMismatch,
        confidence,
        evidence: Evidence {
            metric: "active_gpus".to_string(),
            observed: ctx.metrics.active_gpus as f64,
            threshold: t.mismatch_max_active_fraction * requested as f64,
            detail: format!(
                "only {} of {} requested GPUs exceeded the {:.0}% activity threshold",
                ctx.metrics.active_gpus, requested, ctx.active_threshold_pct
            ),
        },
    })
}
