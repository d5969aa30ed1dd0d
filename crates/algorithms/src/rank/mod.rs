//! Candidate ranking
//!
//! Clusters below the minimum leak area are dropped, the rest are scored
//! and sorted into a fully deterministic order: score, then area (both
//! descending), then centroid x and y, source tile and pixel bounds
//! (ascending). Ranks start at 1.

mod score;

pub use score::{AreaIntensity, NormalizedWeighted, ScoreContext, Scoring, SeverityScore};

use crate::cluster::AnomalyCluster;
use aquaspot_core::{Algorithm, Error, Result};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{debug, info};

/// Parameters for ranking
#[derive(Debug, Clone)]
pub struct RankParams {
    /// Clusters with a smaller area are discarded; equal is kept (default 25 m²)
    pub min_area_m2: f64,
    /// Keep only the first `k` candidates after ranking
    pub top_k: Option<usize>,
    pub scoring: Scoring,
}

impl Default for RankParams {
    fn default() -> Self {
        Self {
            min_area_m2: 25.0,
            top_k: None,
            scoring: Scoring::default(),
        }
    }
}

impl RankParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_area_m2.is_finite() && self.min_area_m2 >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "min_area_m2",
                value: self.min_area_m2.to_string(),
                reason: "must be a finite, non-negative area".into(),
            });
        }
        if self.top_k == Some(0) {
            return Err(Error::InvalidParameter {
                name: "top_k",
                value: "0".into(),
                reason: "must keep at least one candidate".into(),
            });
        }
        self.scoring.validate()
    }
}

/// A cluster with its severity score and rank (1 = most severe)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub rank: usize,
    pub score: f64,
    #[serde(flatten)]
    pub cluster: AnomalyCluster,
}

/// Ranking stage
#[derive(Debug, Clone, Default)]
pub struct CandidateRanker;

impl Algorithm for CandidateRanker {
    type Input = Vec<AnomalyCluster>;
    type Output = Vec<RankedCandidate>;
    type Params = RankParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "CandidateRanker"
    }

    fn description(&self) -> &'static str {
        "Filter clusters by minimum area and rank them by severity"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        rank_candidates(input, &params)
    }
}

/// Rank clusters with the score selected in `params.scoring`.
pub fn rank_candidates(clusters: Vec<AnomalyCluster>, params: &RankParams) -> Result<Vec<RankedCandidate>> {
    let scorer = params.scoring.scorer();
    rank_candidates_with(clusters, params, scorer.as_ref())
}

/// Rank clusters with a caller-supplied score.
///
/// `params.scoring` is ignored. Non-finite scores sort as given by
/// [`f64::total_cmp`].
pub fn rank_candidates_with(
    clusters: Vec<AnomalyCluster>,
    params: &RankParams,
    scorer: &dyn SeverityScore,
) -> Result<Vec<RankedCandidate>> {
    params.validate()?;

    let total = clusters.len();
    let kept: Vec<AnomalyCluster> = clusters
        .into_iter()
        .filter(|c| c.area_m2 >= params.min_area_m2)
        .collect();
    debug!(total, kept = kept.len(), min_area_m2 = params.min_area_m2, "filtered clusters by area");

    let ctx = ScoreContext::from_clusters(&kept);
    let mut scored: Vec<(f64, AnomalyCluster)> = kept.into_iter().map(|c| (scorer.score(&c, &ctx), c)).collect();
    scored.sort_by(severity_order);

    let limit = params.top_k.unwrap_or(usize::MAX);
    let ranked: Vec<RankedCandidate> = scored
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (score, cluster))| RankedCandidate {
            rank: i + 1,
            score,
            cluster,
        })
        .collect();

    info!(
        candidates = ranked.len(),
        discarded = total - ranked.len(),
        "ranked leak candidates"
    );
    Ok(ranked)
}

fn severity_order((sa, a): &(f64, AnomalyCluster), (sb, b): &(f64, AnomalyCluster)) -> Ordering {
    sb.total_cmp(sa)
        .then_with(|| b.area_m2.total_cmp(&a.area_m2))
        .then_with(|| a.centroid.0.total_cmp(&b.centroid.0))
        .then_with(|| a.centroid.1.total_cmp(&b.centroid.1))
        .then_with(|| a.source_tile.cmp(&b.source_tile))
        .then_with(|| a.pixel_bounds.cmp(&b.pixel_bounds))
        .then_with(|| a.label.cmp(&b.label))
}
