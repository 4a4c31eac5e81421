use std::fmt::Write;

use crate::error::PerformanceError;
use crate::goals::compute_goal_achievement;
use crate::models::{DepartmentSummary, TrendPoint};
use crate::outliers::detect_department_outliers_with;
use crate::scoring::{build_trend, compute_final_score};
use crate::store::PerformanceStore;

pub fn summarize_department<S: PerformanceStore>(
    store: &S,
    department: &str,
) -> DepartmentSummary {
    DepartmentSummary {
        department: department.to_string(),
        total_employees: store.find_employees_by_department(department).len(),
    }
}

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "n/a".to_string(), |value| format!("{value:.2}"))
}

fn format_trend(trend: &[TrendPoint]) -> String {
    trend
        .iter()
        .map(|point| format!("{} {}", point.cycle, format_score(point.final_score)))
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Markdown summary of a department's latest cycle.
pub fn build_report<S: PerformanceStore>(
    store: &S,
    department: &str,
    trend_cycles: usize,
    outlier_threshold: f64,
) -> Result<String, PerformanceError> {
    let summary = summarize_department(store, department);
    let latest_cycle = store.find_latest_cycle();

    let mut output = String::new();
    let _ = writeln!(output, "# Performance Report: {}", summary.department);
    let _ = writeln!(
        output,
        "{} active employees, latest cycle {}",
        summary.total_employees,
        latest_cycle.map_or("none", |cycle| cycle.name.as_str())
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Final Scores");

    let employees = store.find_employees_by_department(department);
    match latest_cycle {
        None => {
            let _ = writeln!(output, "No review cycles recorded.");
        }
        Some(_) if employees.is_empty() => {
            let _ = writeln!(output, "No employees in this department.");
        }
        Some(cycle) => {
            for employee in &employees {
                let final_score = compute_final_score(store, employee.id, cycle.id);
                let goals = compute_goal_achievement(store, employee.id, cycle.id);
                let goal_text = match goals.completion_rate {
                    Some(rate) => format!(
                        "goals {}/{} complete ({:.0}%), goal score {}",
                        goals.completed,
                        goals.total_goals,
                        rate * 100.0,
                        format_score(goals.weighted_goal_score)
                    ),
                    None => "no goals set".to_string(),
                };
                let _ = writeln!(
                    output,
                    "- {} ({}): final score {}, {}",
                    employee.name,
                    employee.email,
                    format_score(final_score),
                    goal_text
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Outliers");
    let outliers = detect_department_outliers_with(store, department, outlier_threshold)?;
    if outliers.is_empty() {
        let _ = writeln!(output, "No outliers beyond {outlier_threshold} standard deviations.");
    } else {
        for outlier in &outliers {
            let _ = writeln!(
                output,
                "- {} score {:.2} (z {:+.2}; dept avg {:.2}, std {:.2})",
                outlier.name,
                outlier.final_score,
                outlier.zscore,
                outlier.department_avg,
                outlier.department_std
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trends");
    if employees.is_empty() {
        let _ = writeln!(output, "No employees in this department.");
    } else {
        for employee in &employees {
            let trend = build_trend(store, employee.id, trend_cycles);
            let _ = writeln!(output, "- {}: {}", employee.name, format_trend(&trend));
        }
    }

    Ok(output)
}
