use tracing::debug;
use uuid::Uuid;

use crate::aggregate::average_group_score;
use crate::models::{round_to, ReviewType, TrendPoint};
use crate::store::PerformanceStore;

pub const DEFAULT_TREND_CYCLES: usize = 3;

/// Reviewer-type weights for the final score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub manager: f64,
    pub self_review: f64,
    pub peer: f64,
    /// Used when no manager score exists.
    pub fallback_self: f64,
    pub fallback_peer: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            manager: 0.5,
            self_review: 0.3,
            peer: 0.2,
            fallback_self: 0.6,
            fallback_peer: 0.4,
        }
    }
}

impl ScoreWeights {
    /// Blends the group scores, renormalizing over the groups present.
    pub fn combine(
        &self,
        manager: Option<f64>,
        self_score: Option<f64>,
        peer: Option<f64>,
    ) -> Option<f64> {
        let (mut total, mut weight_sum, self_weight, peer_weight) = match manager {
            Some(manager) => (
                self.manager * manager,
                self.manager,
                self.self_review,
                self.peer,
            ),
            None => (0.0, 0.0, self.fallback_self, self.fallback_peer),
        };

        if let Some(value) = self_score {
            total += self_weight * value;
            weight_sum += self_weight;
        }
        if let Some(value) = peer {
            total += peer_weight * value;
            weight_sum += peer_weight;
        }

        if weight_sum <= 0.0 {
            return None;
        }
        Some(round_to(total / weight_sum, 2))
    }
}

pub fn compute_final_score<S: PerformanceStore>(
    store: &S,
    employee_id: Uuid,
    cycle_id: Uuid,
) -> Option<f64> {
    compute_final_score_with(store, &ScoreWeights::default(), employee_id, cycle_id)
}

/// Weighted 0-10 score for the employee in the cycle, `None` when the employee
/// or cycle is unknown or neither a manager nor a self/peer score exists.
pub fn compute_final_score_with<S: PerformanceStore>(
    store: &S,
    weights: &ScoreWeights,
    employee_id: Uuid,
    cycle_id: Uuid,
) -> Option<f64> {
    store.find_employee(employee_id)?;
    store.find_cycle(cycle_id)?;

    let reviews = store.find_reviews(employee_id, cycle_id);
    let group = |review_type: ReviewType| {
        average_group_score(
            reviews
                .iter()
                .copied()
                .filter(|review| review.review_type == review_type),
        )
    };

    let manager = group(ReviewType::Manager);
    let self_score = group(ReviewType::SelfReview);
    let peer = group(ReviewType::Peer);

    let final_score = weights.combine(manager, self_score, peer);
    if final_score.is_none() {
        debug!(%employee_id, %cycle_id, "insufficient review data for final score");
    }
    final_score
}

/// Final scores over the `num_cycles` most recent cycles, oldest first.
///
/// Every cycle found produces a point; missing data shows up as `None`.
pub fn build_trend<S: PerformanceStore>(
    store: &S,
    employee_id: Uuid,
    num_cycles: usize,
) -> Vec<TrendPoint> {
    let mut cycles = store.find_cycles(num_cycles);
    cycles.reverse();

    cycles
        .into_iter()
        .map(|cycle| TrendPoint {
            cycle: cycle.name.clone(),
            final_score: compute_final_score(store, employee_id, cycle.id),
        })
        .collect()
}
