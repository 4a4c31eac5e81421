use std::collections::HashMap;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::PerformanceError;
use crate::models::{
    Criteria, Employee, Goal, Review, ReviewCycle, ReviewStatus, ReviewType, Score,
};
use crate::store::Snapshot;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Loads every performance table inside one repeatable-read transaction so the
/// scoring functions see a consistent view.
pub async fn load_snapshot(pool: &PgPool) -> anyhow::Result<Snapshot> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;

    let employees = sqlx::query(
        "SELECT id, full_name, email, department, manager_id, role, is_deleted \
         FROM performance.employees ORDER BY created_at, email",
    )
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .map(|row| Employee {
        id: row.get("id"),
        name: row.get("full_name"),
        email: row.get("email"),
        department: row.get("department"),
        manager_id: row.get("manager_id"),
        role: row.get("role"),
        is_deleted: row.get("is_deleted"),
    })
    .collect::<Vec<_>>();

    let mut cycles = Vec::new();
    for row in sqlx::query(
        "SELECT id, name, start_date, end_date, status FROM performance.review_cycles \
         ORDER BY start_date",
    )
    .fetch_all(&mut *tx)
    .await?
    {
        let status: String = row.get("status");
        cycles.push(ReviewCycle {
            id: row.get("id"),
            name: row.get("name"),
            start_date: row.get("start_date"),
            end_date: row.get("end_date"),
            status: status.parse()?,
        });
    }

    let mut scores_by_review: HashMap<Uuid, Vec<Score>> = HashMap::new();
    for row in sqlx::query("SELECT review_id, criteria, score, comments FROM performance.scores")
        .fetch_all(&mut *tx)
        .await?
    {
        let criteria: String = row.get("criteria");
        scores_by_review
            .entry(row.get("review_id"))
            .or_default()
            .push(Score {
                criteria: criteria.parse()?,
                value: row.get("score"),
                comments: row.get("comments"),
            });
    }

    let mut reviews = Vec::new();
    for row in sqlx::query(
        "SELECT id, employee_id, reviewer_id, cycle_id, review_type, status, submitted_at, \
         is_deleted FROM performance.reviews ORDER BY created_at",
    )
    .fetch_all(&mut *tx)
    .await?
    {
        let id: Uuid = row.get("id");
        let review_type: String = row.get("review_type");
        let status: String = row.get("status");
        reviews.push(Review {
            id,
            employee_id: row.get("employee_id"),
            reviewer_id: row.get("reviewer_id"),
            cycle_id: row.get("cycle_id"),
            review_type: review_type.parse()?,
            status: status.parse()?,
            submitted_at: row.get("submitted_at"),
            is_deleted: row.get("is_deleted"),
            scores: scores_by_review.remove(&id).unwrap_or_default(),
        });
    }

    let mut goals = Vec::new();
    for row in sqlx::query(
        "SELECT id, employee_id, cycle_id, description, status, progress, is_deleted \
         FROM performance.goals ORDER BY created_at",
    )
    .fetch_all(&mut *tx)
    .await?
    {
        let status: String = row.get("status");
        goals.push(Goal {
            id: row.get("id"),
            employee_id: row.get("employee_id"),
            cycle_id: row.get("cycle_id"),
            description: row.get("description"),
            status: status.parse()?,
            progress: row.get("progress"),
            is_deleted: row.get("is_deleted"),
        });
    }

    tx.commit().await?;
    info!(
        employees = employees.len(),
        cycles = cycles.len(),
        reviews = reviews.len(),
        goals = goals.len(),
        "loaded performance snapshot"
    );

    Ok(Snapshot::new(employees, cycles, reviews, goals))
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let employees = [
        ("Avery Lee", "avery.lee@techcorp.com", "Engineering", "manager"),
        ("Jules Moreno", "jules.moreno@techcorp.com", "Engineering", "employee"),
        ("Kiara Patel", "kiara.patel@techcorp.com", "Engineering", "employee"),
        ("Devon Brooks", "devon.brooks@techcorp.com", "Engineering", "employee"),
        ("Sam Okafor", "sam.okafor@techcorp.com", "Marketing", "employee"),
    ];

    let mut ids = HashMap::new();
    for (name, email, department, role) in employees {
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO performance.employees (id, full_name, email, department, role)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, department = EXCLUDED.department
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(department)
        .bind(role)
        .fetch_one(pool)
        .await?
        .get("id");
        ids.insert(email, id);
    }

    let cycles = [
        (
            "2024 Q3",
            NaiveDate::from_ymd_opt(2024, 7, 1).context("invalid date")?,
            NaiveDate::from_ymd_opt(2024, 9, 30).context("invalid date")?,
            "closed",
        ),
        (
            "2024 Q4",
            NaiveDate::from_ymd_opt(2024, 10, 1).context("invalid date")?,
            NaiveDate::from_ymd_opt(2024, 12, 31).context("invalid date")?,
            "active",
        ),
    ];

    let mut cycle_ids = HashMap::new();
    for (name, start_date, end_date, status) in cycles {
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO performance.review_cycles (id, name, start_date, end_date, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE
            SET start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                status = EXCLUDED.status
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(start_date)
        .bind(end_date)
        .bind(status)
        .fetch_one(pool)
        .await?
        .get("id");
        cycle_ids.insert(name, id);
    }

    let manager = "avery.lee@techcorp.com";
    let jules = "jules.moreno@techcorp.com";
    let kiara = "kiara.patel@techcorp.com";
    let devon = "devon.brooks@techcorp.com";
    let sam = "sam.okafor@techcorp.com";
    // (employee, reviewer, cycle, type, [technical, communication, leadership, goals])
    let reviews = [
        (jules, jules, "2024 Q3", ReviewType::SelfReview, [8, 8, 7, 9]),
        (jules, kiara, "2024 Q3", ReviewType::Peer, [7, 7, 6, 7]),
        (jules, manager, "2024 Q3", ReviewType::Manager, [9, 8, 8, 9]),
        (jules, manager, "2024 Q4", ReviewType::Manager, [9, 9, 8, 9]),
        (kiara, manager, "2024 Q4", ReviewType::Manager, [7, 7, 7, 7]),
        (kiara, jules, "2024 Q4", ReviewType::Peer, [7, 8, 7, 7]),
        (devon, manager, "2024 Q4", ReviewType::Manager, [4, 5, 4, 4]),
        (devon, devon, "2024 Q4", ReviewType::SelfReview, [7, 7, 7, 7]),
        (sam, sam, "2024 Q4", ReviewType::SelfReview, [8, 8, 8, 8]),
    ];

    for (employee, reviewer, cycle, review_type, values) in reviews {
        let review = NewReview {
            employee_id: lookup(&ids, employee)?,
            reviewer_id: Some(lookup(&ids, reviewer)?),
            cycle_id: lookup(&cycle_ids, cycle)?,
            review_type,
            status: ReviewStatus::Submitted,
            scores: Criteria::ALL.into_iter().zip(values).collect(),
        };
        let mut tx = pool.begin().await?;
        insert_review(&mut tx, &review).await?;
        tx.commit().await?;
    }

    let goals = [
        ("jules.moreno@techcorp.com", "2024 Q4", "Lead the billing migration", "completed", 100),
        ("jules.moreno@techcorp.com", "2024 Q4", "Mentor two new hires", "in_progress", 60),
        ("kiara.patel@techcorp.com", "2024 Q4", "Reduce p95 API latency", "in_progress", 40),
        ("devon.brooks@techcorp.com", "2024 Q4", "Ship onboarding revamp", "not_started", 0),
    ];

    for (employee, cycle, description, status, progress) in goals {
        sqlx::query(
            r#"
            INSERT INTO performance.goals (id, employee_id, cycle_id, description, status, progress)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE NOT EXISTS (
                SELECT 1 FROM performance.goals
                WHERE employee_id = $2 AND cycle_id = $3 AND description = $4 AND is_deleted = FALSE
            )
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(lookup(&ids, employee)?)
        .bind(lookup(&cycle_ids, cycle)?)
        .bind(description)
        .bind(status)
        .bind(progress)
        .execute(pool)
        .await?;
    }

    Ok(())
}

fn lookup(ids: &HashMap<&str, Uuid>, key: &str) -> anyhow::Result<Uuid> {
    ids.get(key)
        .copied()
        .with_context(|| format!("seed data references unknown key {key}"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub employee_id: Uuid,
    pub reviewer_id: Option<Uuid>,
    pub cycle_id: Uuid,
    pub review_type: ReviewType,
    pub status: ReviewStatus,
    pub scores: Vec<(Criteria, i32)>,
}

/// Inserts the review and its scores. Returns `false` when a live review with
/// the same employee, reviewer, cycle and type already exists.
async fn insert_review(
    tx: &mut Transaction<'_, Postgres>,
    review: &NewReview,
) -> anyhow::Result<bool> {
    let duplicate: bool = sqlx::query(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM performance.reviews
            WHERE employee_id = $1 AND reviewer_id IS NOT DISTINCT FROM $2
              AND cycle_id = $3 AND review_type = $4 AND is_deleted = FALSE
        ) AS duplicate
        "#,
    )
    .bind(review.employee_id)
    .bind(review.reviewer_id)
    .bind(review.cycle_id)
    .bind(review.review_type.as_str())
    .fetch_one(&mut **tx)
    .await?
    .get("duplicate");

    if duplicate {
        return Ok(false);
    }

    let review_id = Uuid::new_v4();
    let submitted_at = (review.status == ReviewStatus::Submitted).then(Utc::now);
    sqlx::query(
        r#"
        INSERT INTO performance.reviews
        (id, employee_id, reviewer_id, cycle_id, review_type, status, submitted_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(review_id)
    .bind(review.employee_id)
    .bind(review.reviewer_id)
    .bind(review.cycle_id)
    .bind(review.review_type.as_str())
    .bind(review.status.as_str())
    .bind(submitted_at)
    .execute(&mut **tx)
    .await?;

    for (criteria, value) in &review.scores {
        sqlx::query(
            "INSERT INTO performance.scores (id, review_id, criteria, score) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(review_id)
        .bind(criteria.as_str())
        .bind(value)
        .execute(&mut **tx)
        .await?;
    }

    Ok(true)
}

/// Moves a live draft review to submitted once all four criteria are scored.
pub async fn submit_review(pool: &PgPool, review_id: Uuid) -> anyhow::Result<DateTime<Utc>> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        r#"
        SELECT id, employee_id, reviewer_id, cycle_id, review_type, status, submitted_at, is_deleted
        FROM performance.reviews
        WHERE id = $1 AND is_deleted = FALSE
        FOR UPDATE
        "#,
    )
    .bind(review_id)
    .fetch_optional(&mut *tx)
    .await?
    .with_context(|| format!("no active review with id {review_id}"))?;

    let mut scores = Vec::new();
    for score in
        sqlx::query("SELECT criteria, score, comments FROM performance.scores WHERE review_id = $1")
            .bind(review_id)
            .fetch_all(&mut *tx)
            .await?
    {
        let criteria: String = score.get("criteria");
        scores.push(Score {
            criteria: criteria.parse()?,
            value: score.get("score"),
            comments: score.get("comments"),
        });
    }

    let review_type: String = row.get("review_type");
    let status: String = row.get("status");
    let review = Review {
        id: row.get("id"),
        employee_id: row.get("employee_id"),
        reviewer_id: row.get("reviewer_id"),
        cycle_id: row.get("cycle_id"),
        review_type: review_type.parse()?,
        status: status.parse()?,
        submitted_at: row.get("submitted_at"),
        is_deleted: row.get("is_deleted"),
        scores,
    };
    review.check_submittable()?;

    let submitted_at = Utc::now();
    sqlx::query("UPDATE performance.reviews SET status = $1, submitted_at = $2 WHERE id = $3")
        .bind(ReviewStatus::Submitted.as_str())
        .bind(submitted_at)
        .bind(review_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(%review_id, "review submitted");
    Ok(submitted_at)
}

/// One line of a bulk review import file.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewImportRow {
    pub employee_email: String,
    pub reviewer_email: Option<String>,
    pub cycle: String,
    pub review_type: String,
    pub status: Option<String>,
    pub technical: Option<i32>,
    pub communication: Option<i32>,
    pub leadership: Option<i32>,
    pub goals: Option<i32>,
}

impl ReviewImportRow {
    /// Resolves emails and the cycle name against the snapshot and parses the
    /// enum columns. `row` is the 1-based data line, used in error messages.
    pub fn resolve(&self, snapshot: &Snapshot, row: usize) -> Result<NewReview, PerformanceError> {
        let reject = |reason: String| PerformanceError::InvalidImportRow { row, reason };

        let employee = snapshot
            .find_employee_by_email(&self.employee_email)
            .ok_or_else(|| reject(format!("unknown employee {}", self.employee_email)))?;
        let reviewer_id = match self.reviewer_email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => Some(
                snapshot
                    .find_employee_by_email(email)
                    .ok_or_else(|| reject(format!("unknown reviewer {email}")))?
                    .id,
            ),
            _ => None,
        };
        let cycle = snapshot
            .find_cycle_by_name(self.cycle.trim())
            .ok_or_else(|| reject(format!("unknown cycle {}", self.cycle)))?;
        let review_type: ReviewType = self
            .review_type
            .parse()
            .map_err(|err: PerformanceError| reject(err.to_string()))?;
        let status = match self.status.as_deref() {
            Some(text) if !text.trim().is_empty() => text
                .parse()
                .map_err(|err: PerformanceError| reject(err.to_string()))?,
            _ => ReviewStatus::Draft,
        };

        let scores: Vec<(Criteria, i32)> = Criteria::ALL
            .into_iter()
            .zip([self.technical, self.communication, self.leadership, self.goals])
            .filter_map(|(criteria, value)| value.map(|value| (criteria, value)))
            .collect();

        Ok(NewReview {
            employee_id: employee.id,
            reviewer_id,
            cycle_id: cycle.id,
            review_type,
            status,
            scores,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// Imports reviews from CSV, one transaction per row. Bad rows and duplicates
/// are counted and logged, never fatal.
pub async fn import_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<ImportSummary> {
    let snapshot = load_snapshot(pool).await?;
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut summary = ImportSummary::default();

    for (index, result) in reader.deserialize::<ReviewImportRow>().enumerate() {
        let row_number = index + 1;
        let review = match result
            .map_err(|err| PerformanceError::InvalidImportRow {
                row: row_number,
                reason: err.to_string(),
            })
            .and_then(|row| row.resolve(&snapshot, row_number))
        {
            Ok(review) => review,
            Err(err) => {
                warn!(error = %err, "skipping import row");
                summary.rejected += 1;
                continue;
            }
        };

        let mut tx = pool.begin().await?;
        if insert_review(&mut tx, &review).await? {
            tx.commit().await?;
            summary.inserted += 1;
        } else {
            tx.rollback().await?;
            warn!(row = row_number, "duplicate review skipped");
            summary.duplicates += 1;
        }
    }

    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        rejected = summary.rejected,
        "review import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::{cycle, employee};

    fn snapshot() -> Snapshot {
        Snapshot::new(
            vec![employee("Avery", "Eng"), employee("Jules", "Eng")],
            vec![cycle("2024 Q3", 2024, 7)],
            vec![],
            vec![],
        )
    }

    fn row() -> ReviewImportRow {
        ReviewImportRow {
            employee_email: "avery@example.com".to_string(),
            reviewer_email: Some("jules@example.com".to_string()),
            cycle: "2024 Q3".to_string(),
            review_type: "peer".to_string(),
            status: Some("submitted".to_string()),
            technical: Some(7),
            communication: Some(8),
            leadership: None,
            goals: Some(6),
        }
    }

    #[test]
    fn resolves_row_against_snapshot() {
        let snapshot = snapshot();
        let review = row().resolve(&snapshot, 1).unwrap();

        assert_eq!(review.employee_id, snapshot.employees[0].id);
        assert_eq!(review.reviewer_id, Some(snapshot.employees[1].id));
        assert_eq!(review.cycle_id, snapshot.cycles[0].id);
        assert_eq!(review.review_type, ReviewType::Peer);
        assert_eq!(review.status, ReviewStatus::Submitted);
        assert_eq!(
            review.scores,
            vec![
                (Criteria::Technical, 7),
                (Criteria::Communication, 8),
                (Criteria::Goals, 6)
            ]
        );
    }

    #[test]
    fn missing_status_defaults_to_draft() {
        let mut input = row();
        input.status = None;
        input.reviewer_email = Some(" ".to_string());
        let review = input.resolve(&snapshot(), 2).unwrap();
        assert_eq!(review.status, ReviewStatus::Draft);
        assert_eq!(review.reviewer_id, None);
    }

    #[test]
    fn rejects_unknown_references() {
        let snapshot = snapshot();

        let mut unknown_cycle = row();
        unknown_cycle.cycle = "2030 Q1".to_string();
        let err = unknown_cycle.resolve(&snapshot, 3).unwrap_err();
        assert!(err.to_string().contains("row 3"));

        let mut bad_type = row();
        bad_type.review_type = "skip-level".to_string();
        assert!(bad_type.resolve(&snapshot, 4).is_err());

        let mut unknown_employee = row();
        unknown_employee.employee_email = "nobody@example.com".to_string();
        assert!(unknown_employee.resolve(&snapshot, 5).is_err());
    }

    #[test]
    fn reads_import_rows_from_csv() {
        let data = "employee_email,reviewer_email,cycle,review_type,status,\
                    technical,communication,leadership,goals\n\
                    avery@example.com,,2024 Q3,self,submitted,8,8,7,9\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<ReviewImportRow> = reader.deserialize().collect::<Result<_, _>>().unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reviewer_email, None);
        let review = rows[0].resolve(&snapshot(), 1).unwrap();
        assert_eq!(review.review_type, ReviewType::SelfReview);
        assert_eq!(review.scores.len(), 4);
    }
}
