use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        activity::Activity,
        expense::{Expense, ExpenseCategory},
        trip::Trip,
    },
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BudgetBreakdown {
    pub transport: Decimal,
    pub accommodation: Decimal,
    /// Scheduled activity costs plus ACTIVITY-category expenses.
    pub activities: Decimal,
    pub meals: Decimal,
    pub other: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetSnapshot {
    pub budget: Decimal,
    pub activity_cost: Decimal,
    pub expenses_by_category: BTreeMap<ExpenseCategory, Decimal>,
    pub breakdown: BudgetBreakdown,
    pub total_expenses: Decimal,
    pub total_estimated: Decimal,
    pub remaining: Decimal,
    pub over_budget: bool,
    pub days: i64,
    /// Rounded to the display precision; every other figure is exact.
    pub cost_per_day: Decimal,
    pub budget_used_percent: Option<Decimal>,
}

pub struct BudgetInput<'a> {
    pub budget: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub activities: &'a [Activity],
    pub expenses: &'a [Expense],
}

/// Folds the itinerary and the expense ledger into one budget view.
///
/// An activity's cost and an ACTIVITY expense land in the same bucket and are both
/// counted in `total_estimated`; recording a scheduled activity again as an expense
/// therefore counts it twice.
pub fn reconcile(input: &BudgetInput<'_>, precision: u32) -> BudgetSnapshot {
    let activity_cost: Decimal = input
        .activities
        .iter()
        .filter(|activity| activity.is_assigned())
        .map(|activity| activity.cost)
        .sum();

    let mut expenses_by_category: BTreeMap<ExpenseCategory, Decimal> = ExpenseCategory::ALL
        .into_iter()
        .map(|category| (category, Decimal::ZERO))
        .collect();
    for expense in input.expenses {
        *expenses_by_category
            .entry(expense.category)
            .or_insert(Decimal::ZERO) += expense.amount;
    }
    let spent = |category: ExpenseCategory| {
        expenses_by_category
            .get(&category)
            .copied()
            .unwrap_or(Decimal::ZERO)
    };

    let breakdown = BudgetBreakdown {
        transport: spent(ExpenseCategory::Transport),
        accommodation: spent(ExpenseCategory::Accommodation),
        activities: activity_cost + spent(ExpenseCategory::Activity),
        meals: spent(ExpenseCategory::Meal),
        other: spent(ExpenseCategory::Other),
    };

    let total_expenses: Decimal = input.expenses.iter().map(|expense| expense.amount).sum();
    let total_estimated = activity_cost + total_expenses;

    let days = (input.end_date - input.start_date).num_days().max(0);
    let cost_per_day = if days > 0 {
        round_for_display(total_estimated / Decimal::from(days), precision)
    } else {
        Decimal::ZERO
    };
    let budget_used_percent = if input.budget > Decimal::ZERO {
        Some(round_for_display(
            total_estimated * Decimal::ONE_HUNDRED / input.budget,
            precision,
        ))
    } else {
        None
    };

    BudgetSnapshot {
        budget: input.budget,
        activity_cost,
        expenses_by_category,
        breakdown,
        total_expenses,
        total_estimated,
        remaining: input.budget - total_estimated,
        over_budget: total_estimated > input.budget,
        days,
        cost_per_day,
        budget_used_percent,
    }
}

fn round_for_display(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero)
}

/// Read-only budget view of a stored trip.
#[derive(Clone)]
pub struct BudgetReconciler {
    db: DbPool,
    precision: u32,
}

impl BudgetReconciler {
    pub fn new(db: DbPool, precision: u32) -> Self {
        Self { db, precision }
    }

    pub async fn snapshot(&self, trip_id: &str) -> Result<BudgetSnapshot, AppError> {
        // One read transaction so trip, schedule and ledger come from the same state.
        let mut tx = self.db.begin().await?;
        let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = ?1")
            .bind(trip_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound)?;
        let activities = sqlx::query_as::<_, Activity>(
            r#"SELECT a.* FROM activities a
               JOIN stops s ON s.id = a.stop_id
               WHERE s.trip_id = ?1"#,
        )
        .bind(trip_id)
        .fetch_all(&mut *tx)
        .await?;
        let expenses = sqlx::query_as::<_, Expense>("SELECT * FROM expenses WHERE trip_id = ?1")
            .bind(trip_id)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(reconcile(
            &BudgetInput {
                budget: trip.budget,
                start_date: trip.start_date,
                end_date: trip.end_date,
                activities: &activities,
                expenses: &expenses,
            },
            self.precision,
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn activity(cost: Decimal, stop: Option<&str>) -> Activity {
        Activity {
            id: "a".into(),
            owner_id: "u".into(),
            name: "activity".into(),
            description: None,
            city_id: None,
            cost,
            duration_minutes: 60,
            stop_id: stop.map(str::to_string),
            position: 0,
            start_time: None,
            end_time: None,
            created_at: Utc::now(),
        }
    }

    fn expense(category: ExpenseCategory, amount: Decimal) -> Expense {
        Expense {
            id: "e".into(),
            trip_id: "t".into(),
            category,
            amount,
            spent_on: date(2),
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reconciles_activities_and_ledger() {
        let activities = [activity(Decimal::from(200), Some("s1"))];
        let expenses = [
            expense(ExpenseCategory::Transport, Decimal::from(100)),
            expense(ExpenseCategory::Meal, Decimal::from(50)),
        ];
        let snapshot = reconcile(
            &BudgetInput {
                budget: Decimal::from(1000),
                start_date: date(1),
                end_date: date(8),
                activities: &activities,
                expenses: &expenses,
            },
            2,
        );
        assert_eq!(snapshot.activity_cost, Decimal::from(200));
        assert_eq!(snapshot.total_expenses, Decimal::from(150));
        assert_eq!(snapshot.total_estimated, Decimal::from(350));
        assert_eq!(snapshot.remaining, Decimal::from(650));
        assert!(!snapshot.over_budget);
        assert_eq!(snapshot.days, 7);
        assert_eq!(snapshot.cost_per_day, Decimal::new(5000, 2));
        assert_eq!(snapshot.breakdown.transport, Decimal::from(100));
        assert_eq!(snapshot.breakdown.meals, Decimal::from(50));
        assert_eq!(snapshot.breakdown.accommodation, Decimal::ZERO);
        assert_eq!(snapshot.budget_used_percent, Some(Decimal::from(35)));
    }

    #[test]
    fn same_day_trip_has_zero_cost_per_day() {
        let activities = [activity(Decimal::from(80), Some("s1"))];
        let snapshot = reconcile(
            &BudgetInput {
                budget: Decimal::from(100),
                start_date: date(3),
                end_date: date(3),
                activities: &activities,
                expenses: &[],
            },
            2,
        );
        assert_eq!(snapshot.days, 0);
        assert_eq!(snapshot.cost_per_day, Decimal::ZERO);
    }

    #[test]
    fn inverted_range_is_treated_as_zero_days() {
        let snapshot = reconcile(
            &BudgetInput {
                budget: Decimal::ZERO,
                start_date: date(9),
                end_date: date(3),
                activities: &[],
                expenses: &[],
            },
            2,
        );
        assert_eq!(snapshot.days, 0);
        assert_eq!(snapshot.cost_per_day, Decimal::ZERO);
        assert_eq!(snapshot.budget_used_percent, None);
    }

    #[test]
    fn activity_expenses_share_the_activities_bucket() {
        let activities = [
            activity(Decimal::new(1999, 2), Some("s1")),
            activity(Decimal::from(500), None),
        ];
        let expenses = [expense(ExpenseCategory::Activity, Decimal::new(1, 2))];
        let snapshot = reconcile(
            &BudgetInput {
                budget: Decimal::from(10),
                start_date: date(1),
                end_date: date(4),
                activities: &activities,
                expenses: &expenses,
            },
            2,
        );
        // The pool activity is ignored.
        assert_eq!(snapshot.activity_cost, Decimal::new(1999, 2));
        assert_eq!(snapshot.breakdown.activities, Decimal::from(20));
        assert_eq!(snapshot.total_estimated, Decimal::from(20));
        assert!(snapshot.over_budget);
        assert_eq!(snapshot.remaining, Decimal::from(-10));
        assert_eq!(snapshot.cost_per_day, Decimal::new(667, 2));
    }

    #[test]
    fn sums_stay_exact_over_many_small_amounts() {
        let expenses: Vec<Expense> = (0..1000)
            .map(|_| expense(ExpenseCategory::Other, Decimal::new(1, 1)))
            .collect();
        let snapshot = reconcile(
            &BudgetInput {
                budget: Decimal::from(100),
                start_date: date(1),
                end_date: date(4),
                activities: &[],
                expenses: &expenses,
            },
            0,
        );
        assert_eq!(snapshot.total_expenses, Decimal::from(100));
        assert!(!snapshot.over_budget);
        assert_eq!(snapshot.remaining, Decimal::ZERO);
        assert_eq!(snapshot.cost_per_day, Decimal::from(33));
        assert_eq!(snapshot.expenses_by_category.len(), 5);
    }
}
