use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PerformanceError;

/// Implements the lowercase text form used by the database and CSV imports.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = PerformanceError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(PerformanceError::unknown($kind, other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewType {
    #[serde(rename = "self")]
    SelfReview,
    Manager,
    Peer,
}

text_enum!(ReviewType, "review type", {
    SelfReview => "self",
    Manager => "manager",
    Peer => "peer",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Draft,
    Submitted,
}

text_enum!(ReviewStatus, "review status", {
    Draft => "draft",
    Submitted => "submitted",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criteria {
    Technical,
    Communication,
    Leadership,
    Goals,
}

impl Criteria {
    pub const ALL: [Criteria; 4] = [
        Criteria::Technical,
        Criteria::Communication,
        Criteria::Leadership,
        Criteria::Goals,
    ];
}

text_enum!(Criteria, "criteria", {
    Technical => "technical",
    Communication => "communication",
    Leadership => "leadership",
    Goals => "goals",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Active,
    Closed,
}

text_enum!(CycleStatus, "cycle status", {
    Active => "active",
    Closed => "closed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    NotStarted,
    InProgress,
    Completed,
}

text_enum!(GoalStatus, "goal status", {
    NotStarted => "not_started",
    InProgress => "in_progress",
    Completed => "completed",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department: String,
    pub manager_id: Option<Uuid>,
    pub role: String,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCycle {
    pub id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CycleStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub criteria: Criteria,
    pub value: i32,
    pub comments: Option<String>,
}

/// A review together with the scores attached to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub reviewer_id: Option<Uuid>,
    pub cycle_id: Uuid,
    pub review_type: ReviewType,
    pub status: ReviewStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub scores: Vec<Score>,
}

impl Review {
    /// Criteria without any score on this review, in canonical order.
    pub fn missing_criteria(&self) -> Vec<Criteria> {
        Criteria::ALL
            .into_iter()
            .filter(|criteria| !self.scores.iter().any(|score| score.criteria == *criteria))
            .collect()
    }

    /// A draft may be submitted once every criterion has a score.
    pub fn check_submittable(&self) -> Result<(), PerformanceError> {
        if self.status == ReviewStatus::Submitted {
            return Err(PerformanceError::AlreadySubmitted(self.id));
        }
        let missing = self.missing_criteria();
        if !missing.is_empty() {
            return Err(PerformanceError::MissingCriteria {
                review_id: self.id,
                missing: missing.iter().map(Criteria::as_str).collect(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub cycle_id: Uuid,
    pub description: String,
    pub status: GoalStatus,
    /// Stored as written; may exceed 100.
    pub progress: i32,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub cycle: String,
    pub final_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub employee_id: Uuid,
    pub name: String,
    pub final_score: f64,
    pub department_avg: f64,
    pub department_std: f64,
    pub zscore: f64,
}

/// Goal completion for one employee in one cycle.
///
/// The rate and score fields are `None` when the employee has no goals, which
/// is different from having goals and completing none of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalAchievement {
    pub employee_id: Uuid,
    pub cycle_id: Uuid,
    pub total_goals: usize,
    pub completed: usize,
    pub completion_rate: Option<f64>,
    pub avg_progress: Option<f64>,
    pub weighted_goal_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentSummary {
    pub department: String,
    pub total_employees: usize,
}

/// Rounds half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_type_parses_database_text() {
        assert_eq!("self".parse::<ReviewType>().unwrap(), ReviewType::SelfReview);
        assert_eq!(" peer ".parse::<ReviewType>().unwrap(), ReviewType::Peer);
        assert!("lead".parse::<ReviewType>().is_err());
    }

    #[test]
    fn goal_status_uses_snake_case_everywhere() {
        assert_eq!(GoalStatus::NotStarted.as_str(), "not_started");
        let json = serde_json::to_string(&GoalStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let parsed: ReviewType = serde_json::from_str("\"self\"").unwrap();
        assert_eq!(parsed, ReviewType::SelfReview);
    }

    fn draft(criteria: &[Criteria]) -> Review {
        Review {
            id: Uuid::new_v4(),
            employee_id: Uuid::new_v4(),
            reviewer_id: None,
            cycle_id: Uuid::new_v4(),
            review_type: ReviewType::Peer,
            status: ReviewStatus::Draft,
            submitted_at: None,
            is_deleted: false,
            scores: criteria
                .iter()
                .map(|criteria| Score {
                    criteria: *criteria,
                    value: 7,
                    comments: None,
                })
                .collect(),
        }
    }

    #[test]
    fn complete_draft_can_be_submitted() {
        assert!(draft(&Criteria::ALL).check_submittable().is_ok());
    }

    #[test]
    fn submission_requires_all_four_criteria() {
        let review = draft(&[Criteria::Technical, Criteria::Goals, Criteria::Technical]);
        assert_eq!(
            review.missing_criteria(),
            vec![Criteria::Communication, Criteria::Leadership]
        );
        match review.check_submittable() {
            Err(PerformanceError::MissingCriteria { review_id, missing }) => {
                assert_eq!(review_id, review.id);
                assert_eq!(missing, vec!["communication", "leadership"]);
            }
            other => panic!("expected missing criteria, got {other:?}"),
        }
    }

    #[test]
    fn submitted_review_cannot_be_resubmitted() {
        let mut review = draft(&Criteria::ALL);
        review.status = ReviewStatus::Submitted;
        assert!(matches!(
            review.check_submittable(),
            Err(PerformanceError::AlreadySubmitted(id)) if id == review.id
        ));
    }

    #[test]
    fn rounding_keeps_requested_precision() {
        assert_eq!(round_to(7.756, 2), 7.76);
        assert_eq!(round_to(0.6666, 3), 0.667);
        assert_eq!(round_to(-1.234, 2), -1.23);
    }
}
