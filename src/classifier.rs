//! Heuristic high-performer / at-risk classification over quarterly series.
//!
//! Unlike the scoring modules this works on already aggregated input: one
//! chronological score series per employee plus department averages aligned
//! by quarter index.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::round_to;

const HIGH_PERFORMER_MARGIN: f64 = 0.10;
const HIGH_PERFORMER_WINDOW: usize = 3;
const HIGH_PERFORMER_CONFIDENCE: f64 = 0.85;
const TWO_QUARTER_DECLINE: f64 = 0.15;
const TWO_QUARTER_CONFIDENCE: f64 = 0.92;
const ONE_QUARTER_DECLINE: f64 = 0.20;
const ONE_QUARTER_CONFIDENCE: f64 = 0.85;

/// Employee identifier as supplied by the caller; numeric or text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmployeeKey {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for EmployeeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmployeeKey::Number(id) => write!(f, "{id}"),
            EmployeeKey::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeSeries {
    pub employee_id: EmployeeKey,
    pub department: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub quarterly_scores: Vec<f64>,
    /// Accepted for compatibility; not used by either rule.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub goal_completion_rates: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyPerformanceInput {
    #[serde(default)]
    pub employees: Vec<EmployeeSeries>,
    /// A `null` series is treated like a missing department.
    #[serde(default)]
    pub department_averages: HashMap<String, Option<Vec<f64>>>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<f64>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub employee_id: EmployeeKey,
    pub reason: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub employee_id: EmployeeKey,
    pub action: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyAnalysis {
    pub high_performers: Vec<Finding>,
    pub at_risk: Vec<Finding>,
    pub recommendations: Vec<Recommendation>,
}

pub fn analyze_company_performance(input: &CompanyPerformanceInput) -> CompanyAnalysis {
    let mut analysis = CompanyAnalysis::default();

    for employee in &input.employees {
        let scores = &employee.quarterly_scores;
        if scores.is_empty() {
            continue;
        }

        let department_avg = input
            .department_averages
            .get(&employee.department)
            .and_then(|values| values.as_deref())
            .unwrap_or_default();
        if let Some(finding) = high_performer(employee, department_avg) {
            analysis.high_performers.push(finding);
        }

        if let Some((finding, recommendation)) = at_risk(employee) {
            analysis.at_risk.push(finding);
            analysis.recommendations.push(recommendation);
        }
    }

    analysis
}

fn high_performer(employee: &EmployeeSeries, department_avg: &[f64]) -> Option<Finding> {
    let scores = &employee.quarterly_scores;
    if department_avg.is_empty() || department_avg.len() < scores.len() {
        return None;
    }

    let diffs: Vec<f64> = scores
        .iter()
        .zip(department_avg)
        .filter(|(_, avg)| **avg != 0.0)
        .map(|(score, avg)| (score - avg) / avg)
        .collect();
    if diffs.is_empty() {
        return None;
    }

    let recent = &diffs[diffs.len().saturating_sub(HIGH_PERFORMER_WINDOW)..];
    if !recent.iter().all(|diff| *diff >= HIGH_PERFORMER_MARGIN) {
        return None;
    }

    Some(Finding {
        employee_id: employee.employee_id.clone(),
        reason: format!(
            "Consistently >=10% above department average (last {} quarters)",
            recent.len()
        ),
        confidence: HIGH_PERFORMER_CONFIDENCE,
    })
}

fn at_risk(employee: &EmployeeSeries) -> Option<(Finding, Recommendation)> {
    let scores = &employee.quarterly_scores;
    let last = *scores.last()?;

    let (finding, recommendation) = match scores.len() {
        n if n >= 3 => {
            let prev_avg = (scores[n - 3] + scores[n - 2]) / 2.0;
            let decline = relative_decline(prev_avg, last)?;
            if decline < TWO_QUARTER_DECLINE {
                return None;
            }
            (
                (
                    format!(
                        "{:.1}% performance decline vs previous two-quarter avg",
                        round_to(decline * 100.0, 1)
                    ),
                    TWO_QUARTER_CONFIDENCE,
                ),
                ("Schedule performance improvement plan meeting", Priority::High),
            )
        }
        2 => {
            let decline = relative_decline(scores[0], last)?;
            if decline < ONE_QUARTER_DECLINE {
                return None;
            }
            (
                (
                    format!(
                        "{:.1}% performance decline over last 1 quarter",
                        round_to(decline * 100.0, 1)
                    ),
                    ONE_QUARTER_CONFIDENCE,
                ),
                ("Manager check-in & coaching", Priority::Medium),
            )
        }
        _ => return None,
    };

    let (reason, confidence) = finding;
    let (action, priority) = recommendation;
    Some((
        Finding {
            employee_id: employee.employee_id.clone(),
            reason,
            confidence,
        },
        Recommendation {
            employee_id: employee.employee_id.clone(),
            action: action.to_string(),
            priority,
        },
    ))
}

/// `None` for a zero baseline.
fn relative_decline(baseline: f64, last: f64) -> Option<f64> {
    if baseline == 0.0 {
        return None;
    }
    Some((baseline - last) / baseline)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(id: i64, department: &str, scores: &[f64]) -> EmployeeSeries {
        EmployeeSeries {
            employee_id: EmployeeKey::Number(id.into()),
            department: department.to_string(),
            quarterly_scores: scores.to_vec(),
            goal_completion_rates: Vec::new(),
        }
    }

    fn input(
        employees: Vec<EmployeeSeries>,
        averages: &[(&str, &[f64])],
    ) -> CompanyPerformanceInput {
        CompanyPerformanceInput {
            employees,
            department_averages: averages
                .iter()
                .map(|(dept, values)| (dept.to_string(), Some(values.to_vec())))
                .collect(),
        }
    }

    #[test]
    fn flags_consistent_high_performer() {
        let data = input(
            vec![series(1, "Eng", &[8.0, 9.0, 9.5])],
            &[("Eng", &[7.0, 8.0, 8.0])],
        );
        let analysis = analyze_company_performance(&data);

        assert_eq!(analysis.high_performers.len(), 1);
        let finding = &analysis.high_performers[0];
        assert_eq!(finding.employee_id, EmployeeKey::Number(1.into()));
        assert_eq!(finding.confidence, 0.85);
        assert_eq!(
            finding.reason,
            "Consistently >=10% above department average (last 3 quarters)"
        );
        assert!(analysis.at_risk.is_empty());
    }

    #[test]
    fn only_last_three_quarters_count() {
        let data = input(
            vec![series(1, "Eng", &[5.0, 9.0, 9.0, 9.0])],
            &[("Eng", &[8.0, 8.0, 8.0, 8.0])],
        );
        assert_eq!(analyze_company_performance(&data).high_performers.len(), 1);

        let short = input(vec![series(2, "Eng", &[9.0])], &[("Eng", &[8.0, 8.0])]);
        let analysis = analyze_company_performance(&short);
        assert_eq!(
            analysis.high_performers[0].reason,
            "Consistently >=10% above department average (last 1 quarters)"
        );
    }

    #[test]
    fn needs_department_history_at_least_as_long() {
        let data = input(
            vec![series(1, "Eng", &[9.0, 9.0, 9.0])],
            &[("Eng", &[7.0, 7.0])],
        );
        assert!(analyze_company_performance(&data).high_performers.is_empty());

        let missing = input(vec![series(1, "Ops", &[9.0, 9.0])], &[("Eng", &[7.0, 7.0])]);
        assert!(analyze_company_performance(&missing).high_performers.is_empty());
    }

    #[test]
    fn two_quarter_decline_is_high_priority() {
        let data = input(vec![series(7, "Eng", &[8.0, 8.0, 6.0])], &[]);
        let analysis = analyze_company_performance(&data);

        assert_eq!(analysis.at_risk.len(), 1);
        assert_eq!(analysis.at_risk[0].confidence, 0.92);
        assert_eq!(
            analysis.at_risk[0].reason,
            "25.0% performance decline vs previous two-quarter avg"
        );
        assert_eq!(
            analysis.recommendations,
            vec![Recommendation {
                employee_id: EmployeeKey::Number(7.into()),
                action: "Schedule performance improvement plan meeting".to_string(),
                priority: Priority::High,
            }]
        );
    }

    #[test]
    fn single_quarter_drop_is_medium_priority() {
        let data = input(vec![series(3, "Eng", &[10.0, 7.5])], &[]);
        let analysis = analyze_company_performance(&data);

        assert_eq!(analysis.at_risk[0].confidence, 0.85);
        assert_eq!(
            analysis.at_risk[0].reason,
            "25.0% performance decline over last 1 quarter"
        );
        assert_eq!(analysis.recommendations[0].priority, Priority::Medium);
        assert_eq!(analysis.recommendations[0].action, "Manager check-in & coaching");
    }

    #[test]
    fn small_declines_and_short_histories_pass() {
        let data = input(
            vec![
                series(1, "Eng", &[8.0, 8.0, 7.0]),
                series(2, "Eng", &[8.0, 7.0]),
                series(3, "Eng", &[2.0]),
                series(4, "Eng", &[]),
                series(5, "Eng", &[0.0, 0.0, 0.0]),
            ],
            &[],
        );
        assert_eq!(analyze_company_performance(&data), CompanyAnalysis::default());
    }

    #[test]
    fn parses_json_input_with_mixed_ids() {
        let raw = r#"{
            "employees": [
                {"employee_id": 12, "department": "Eng", "quarterly_scores": [8, 9, 9.5],
                 "goal_completion_rates": [0.5]},
                {"employee_id": "E-7", "department": "Eng", "quarterly_scores": [8, 8, 6]}
            ],
            "department_averages": {"Eng": [7, 8, 8]}
        }"#;
        let data: CompanyPerformanceInput = serde_json::from_str(raw).unwrap();
        let analysis = analyze_company_performance(&data);

        assert_eq!(analysis.high_performers[0].employee_id, EmployeeKey::Number(12.into()));
        assert_eq!(analysis.at_risk[0].employee_id, EmployeeKey::Text("E-7".to_string()));
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["recommendations"][0]["priority"], "high");
        assert_eq!(json["at_risk"][0]["employee_id"], "E-7");
    }

    #[test]
    fn zero_department_average_is_skipped() {
        // Index 2 has no usable average, so the window covers indices 0, 1 and 3.
        let data = input(
            vec![series(1, "Eng", &[5.0, 9.0, 9.0, 9.0])],
            &[("Eng", &[8.0, 8.0, 0.0, 8.0])],
        );
        assert!(analyze_company_performance(&data).high_performers.is_empty());

        let data = input(vec![series(2, "Eng", &[9.0, 9.0])], &[("Eng", &[0.0, 8.0])]);
        let analysis = analyze_company_performance(&data);
        assert_eq!(
            analysis.high_performers[0].reason,
            "Consistently >=10% above department average (last 1 quarters)"
        );

        let data = input(vec![series(3, "Eng", &[9.0, 9.0])], &[("Eng", &[0.0, 0.0])]);
        assert!(analyze_company_performance(&data).high_performers.is_empty());
    }

    #[test]
    fn tolerates_null_series_and_large_ids() {
        let raw = r#"{
            "employees": [
                {"employee_id": 18446744073709551615, "department": "Eng",
                 "quarterly_scores": [8, 8, 6], "goal_completion_rates": null},
                {"employee_id": 2.5, "department": "Ops", "quarterly_scores": null}
            ],
            "department_averages": {"Eng": null, "Ops": [7, 7]}
        }"#;
        let data: CompanyPerformanceInput = serde_json::from_str(raw).unwrap();
        assert!(data.employees[1].quarterly_scores.is_empty());

        let analysis = analyze_company_performance(&data);
        assert!(analysis.high_performers.is_empty());
        assert_eq!(analysis.at_risk.len(), 1);
        assert_eq!(analysis.at_risk[0].employee_id.to_string(), "18446744073709551615");
    }
}
