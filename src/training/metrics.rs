//! Metric direction.
//!
//! Metric values are computed by the engine; the driver only needs to know
//! whether a larger value is better. Scores are direction-normalized by
//! multiplying with [`MetricDirection::sign`], so every comparison in the
//! early stopping ledger reads "higher is better".
//!
//! Engines report ranking metrics with a position suffix (`ndcg@5`), so the
//! part before `@` decides the direction.

/// Metrics where larger values are better. Everything else is minimized.
pub const MAXIMIZE_METRICS: &[&str] = &["auc", "auc_mu", "ndcg", "map", "average_precision"];

/// Optimization direction of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricDirection {
    Maximize,
    Minimize,
}

impl MetricDirection {
    /// Direction of an engine metric name.
    pub fn of(metric_name: &str) -> Self {
        let base = metric_name.split('@').next().unwrap_or(metric_name);
        if MAXIMIZE_METRICS.contains(&base) {
            Self::Maximize
        } else {
            Self::Minimize
        }
    }

    /// `+1` for maximized metrics, `-1` for minimized ones.
    pub fn sign(&self) -> f64 {
        match self {
            Self::Maximize => 1.0,
            Self::Minimize => -1.0,
        }
    }

    /// Map a raw score onto the "higher is better" scale.
    pub fn normalize(&self, raw: f64) -> f64 {
        self.sign() * raw
    }
}
