//! Read access to performance records.
//!
//! Scoring code only talks to [`PerformanceStore`]. Implementations hand back
//! records that are already filtered: deleted employees, reviews and goals never
//! reach the scoring functions, and only submitted reviews are returned.

use uuid::Uuid;

use crate::models::{Employee, Goal, Review, ReviewCycle, ReviewStatus};

pub trait PerformanceStore {
    /// A non-deleted employee by id.
    fn find_employee(&self, id: Uuid) -> Option<&Employee>;

    fn find_cycle(&self, id: Uuid) -> Option<&ReviewCycle>;

    /// Submitted, non-deleted reviews for the employee in the cycle.
    fn find_reviews(&self, employee_id: Uuid, cycle_id: Uuid) -> Vec<&Review>;

    /// Up to `limit` cycles ordered by start date, newest first.
    fn find_cycles(&self, limit: usize) -> Vec<&ReviewCycle>;

    fn find_latest_cycle(&self) -> Option<&ReviewCycle> {
        self.find_cycles(1).into_iter().next()
    }

    /// Non-deleted goals for the employee in the cycle.
    fn find_goals(&self, employee_id: Uuid, cycle_id: Uuid) -> Vec<&Goal>;

    /// Non-deleted employees in the department, in enumeration order.
    fn find_employees_by_department(&self, department: &str) -> Vec<&Employee>;
}

/// An in-memory, read-consistent copy of the performance tables.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub employees: Vec<Employee>,
    pub cycles: Vec<ReviewCycle>,
    pub reviews: Vec<Review>,
    pub goals: Vec<Goal>,
}

impl Snapshot {
    pub fn new(
        employees: Vec<Employee>,
        cycles: Vec<ReviewCycle>,
        reviews: Vec<Review>,
        goals: Vec<Goal>,
    ) -> Self {
        Self {
            employees,
            cycles,
            reviews,
            goals,
        }
    }

    pub fn find_employee_by_email(&self, email: &str) -> Option<&Employee> {
        self.employees
            .iter()
            .find(|employee| !employee.is_deleted && employee.email.eq_ignore_ascii_case(email))
    }

    pub fn find_cycle_by_name(&self, name: &str) -> Option<&ReviewCycle> {
        self.cycles.iter().find(|cycle| cycle.name == name)
    }
}

impl PerformanceStore for Snapshot {
    fn find_employee(&self, id: Uuid) -> Option<&Employee> {
        self.employees
            .iter()
            .find(|employee| employee.id == id && !employee.is_deleted)
    }

    fn find_cycle(&self, id: Uuid) -> Option<&ReviewCycle> {
        self.cycles.iter().find(|cycle| cycle.id == id)
    }

    fn find_reviews(&self, employee_id: Uuid, cycle_id: Uuid) -> Vec<&Review> {
        self.reviews
            .iter()
            .filter(|review| {
                review.employee_id == employee_id
                    && review.cycle_id == cycle_id
                    && review.status == ReviewStatus::Submitted
                    && !review.is_deleted
            })
            .collect()
    }

    fn find_cycles(&self, limit: usize) -> Vec<&ReviewCycle> {
        let mut cycles: Vec<&ReviewCycle> = self.cycles.iter().collect();
        // Stable: cycles sharing a start date keep snapshot order.
        cycles.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        cycles.truncate(limit);
        cycles
    }

    fn find_goals(&self, employee_id: Uuid, cycle_id: Uuid) -> Vec<&Goal> {
        self.goals
            .iter()
            .filter(|goal| {
                goal.employee_id == employee_id && goal.cycle_id == cycle_id && !goal.is_deleted
            })
            .collect()
    }

    fn find_employees_by_department(&self, department: &str) -> Vec<&Employee> {
        self.employees
            .iter()
            .filter(|employee| employee.department == department && !employee.is_deleted)
            .collect()
    }
}
