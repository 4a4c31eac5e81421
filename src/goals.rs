use uuid::Uuid;

use crate::models::{round_to, GoalAchievement, GoalStatus};
use crate::store::PerformanceStore;

const COMPLETION_WEIGHT: f64 = 0.7;
const PROGRESS_WEIGHT: f64 = 0.3;
const MAX_PROGRESS: i32 = 100;

/// Completion rate and progress-weighted goal score (0-10) for the cycle.
pub fn compute_goal_achievement<S: PerformanceStore>(
    store: &S,
    employee_id: Uuid,
    cycle_id: Uuid,
) -> GoalAchievement {
    let goals = store.find_goals(employee_id, cycle_id);
    let total = goals.len();

    if total == 0 {
        return GoalAchievement {
            employee_id,
            cycle_id,
            total_goals: 0,
            completed: 0,
            completion_rate: None,
            avg_progress: None,
            weighted_goal_score: None,
        };
    }

    let completed = goals
        .iter()
        .filter(|goal| goal.status == GoalStatus::Completed)
        .count();
    let progress_sum: i64 = goals
        .iter()
        .map(|goal| i64::from(goal.progress.min(MAX_PROGRESS)))
        .sum();

    let completion_rate = completed as f64 / total as f64;
    let progress_avg = progress_sum as f64 / total as f64 / f64::from(MAX_PROGRESS);
    let weighted =
        round_to((COMPLETION_WEIGHT * completion_rate + PROGRESS_WEIGHT * progress_avg) * 10.0, 2);

    GoalAchievement {
        employee_id,
        cycle_id,
        total_goals: total,
        completed,
        completion_rate: Some(round_to(completion_rate, 3)),
        avg_progress: Some(round_to(progress_avg, 3)),
        weighted_goal_score: Some(weighted),
    }
}
