use tracing::debug;

use crate::error::PerformanceError;
use crate::models::{round_to, Employee, OutlierReport};
use crate::scoring::compute_final_score;
use crate::store::PerformanceStore;

pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepartmentStats {
    pub mean: f64,
    /// Sample standard deviation; 0.0 for a single value.
    pub std_dev: f64,
}

impl DepartmentStats {
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let std_dev = if scores.len() > 1 {
            let variance = scores
                .iter()
                .map(|score| {
                    let diff = score - mean;
                    diff * diff
                })
                .sum::<f64>()
                / (n - 1.0);
            variance.sqrt()
        } else {
            0.0
        };

        Some(Self { mean, std_dev })
    }

    pub fn z_score(&self, value: f64) -> Option<f64> {
        if self.std_dev == 0.0 {
            return None;
        }
        Some((value - self.mean) / self.std_dev)
    }
}

pub fn detect_department_outliers<S: PerformanceStore>(
    store: &S,
    department: &str,
) -> Vec<OutlierReport> {
    flag_outliers(store, department, DEFAULT_OUTLIER_THRESHOLD)
}

/// Employees whose latest-cycle final score lies more than `threshold`
/// standard deviations from their department's mean.
///
/// `threshold` must be finite and positive.
pub fn detect_department_outliers_with<S: PerformanceStore>(
    store: &S,
    department: &str,
    threshold: f64,
) -> Result<Vec<OutlierReport>, PerformanceError> {
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(PerformanceError::InvalidThreshold(threshold));
    }
    Ok(flag_outliers(store, department, threshold))
}

fn flag_outliers<S: PerformanceStore>(
    store: &S,
    department: &str,
    threshold: f64,
) -> Vec<OutlierReport> {
    let Some(latest_cycle) = store.find_latest_cycle() else {
        debug!(department, "no review cycles recorded");
        return Vec::new();
    };

    let scored: Vec<(&Employee, f64)> = store
        .find_employees_by_department(department)
        .into_iter()
        .filter_map(|employee| {
            compute_final_score(store, employee.id, latest_cycle.id).map(|score| (employee, score))
        })
        .collect();

    let scores: Vec<f64> = scored.iter().map(|(_, score)| *score).collect();
    let Some(stats) = DepartmentStats::from_scores(&scores) else {
        debug!(department, cycle = %latest_cycle.name, "no final scores in department");
        return Vec::new();
    };

    if stats.std_dev == 0.0 {
        debug!(department, "department scores have zero variance");
        return Vec::new();
    }

    scored
        .into_iter()
        .filter_map(|(employee, score)| {
            let z = stats.z_score(score)?;
            (z.abs() > threshold).then(|| OutlierReport {
                employee_id: employee.id,
                name: employee.name.clone(),
                final_score: score,
                department_avg: round_to(stats.mean, 2),
                department_std: round_to(stats.std_dev, 2),
                zscore: round_to(z, 2),
            })
        })
        .collect()
}
