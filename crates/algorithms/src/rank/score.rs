//! Severity scores for ranking anomaly clusters

use crate::cluster::AnomalyCluster;
use aquaspot_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Maxima of the surviving cluster set, for scores that normalize
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreContext {
    pub max_area_m2: f64,
    pub max_mean_abs_diff: f64,
}

impl ScoreContext {
    pub fn from_clusters<'a>(clusters: impl IntoIterator<Item = &'a AnomalyCluster>) -> Self {
        clusters.into_iter().fold(Self::default(), |ctx, c| Self {
            max_area_m2: ctx.max_area_m2.max(c.area_m2),
            max_mean_abs_diff: ctx.max_mean_abs_diff.max(c.mean_abs_diff),
        })
    }
}

/// Severity of a cluster; higher ranks first
pub trait SeverityScore {
    fn score(&self, cluster: &AnomalyCluster, ctx: &ScoreContext) -> f64;
}

/// `area_m2 * mean_abs_diff`
#[derive(Debug, Clone, Copy, Default)]
pub struct AreaIntensity;

impl SeverityScore for AreaIntensity {
    fn score(&self, cluster: &AnomalyCluster, _ctx: &ScoreContext) -> f64 {
        cluster.area_m2 * cluster.mean_abs_diff
    }
}

/// Weighted mean of area and intensity, each divided by its maximum over
/// the ranked set. Scores fall in `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct NormalizedWeighted {
    pub area_weight: f64,
    pub intensity_weight: f64,
}

impl Default for NormalizedWeighted {
    fn default() -> Self {
        Self {
            area_weight: 0.5,
            intensity_weight: 0.5,
        }
    }
}

fn ratio(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        value / max
    } else {
        0.0
    }
}

impl SeverityScore for NormalizedWeighted {
    fn score(&self, cluster: &AnomalyCluster, ctx: &ScoreContext) -> f64 {
        let total = self.area_weight + self.intensity_weight;
        (self.area_weight * ratio(cluster.area_m2, ctx.max_area_m2)
            + self.intensity_weight * ratio(cluster.mean_abs_diff, ctx.max_mean_abs_diff))
            / total
    }
}

/// Serializable choice of built-in score
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scoring {
    #[default]
    AreaIntensity,
    NormalizedWeighted { area_weight: f64, intensity_weight: f64 },
}

impl Scoring {
    pub fn validate(&self) -> Result<()> {
        if let Scoring::NormalizedWeighted {
            area_weight,
            intensity_weight,
        } = *self
        {
            for (name, w) in [("area_weight", area_weight), ("intensity_weight", intensity_weight)] {
                if !(w.is_finite() && w >= 0.0) {
                    return Err(Error::InvalidParameter {
                        name,
                        value: w.to_string(),
                        reason: "weights must be finite and non-negative".into(),
                    });
                }
            }
            if area_weight + intensity_weight <= 0.0 {
                return Err(Error::InvalidParameter {
                    name: "area_weight",
                    value: area_weight.to_string(),
                    reason: "at least one weight must be positive".into(),
                });
            }
        }
        Ok(())
    }

    pub fn scorer(&self) -> Box<dyn SeverityScore + Send + Sync> {
        match *self {
            Scoring::AreaIntensity => Box::new(AreaIntensity),
            Scoring::NormalizedWeighted {
                area_weight,
                intensity_weight,
            } => Box::new(NormalizedWeighted {
                area_weight,
                intensity_weight,
            }),
        }
    }
}
