//! Spending targets per tag and time window.
//!
//! A budget never duplicates ledger data: the "actual" side is always
//! recomputed from the expense lines inside the window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, EngineError, PostedLine, ResultEngine, Sign};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub tag_id: Uuid,
    /// Window is half-open: `[start, end)`, both in UTC.
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub target: Amount,
}

/// Read-side progress of one budget.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BudgetProgress {
    pub actual: Amount,
    pub target: Amount,
    /// `actual / target` as a plain ratio for progress bars; 0 when the
    /// target is zero.
    pub ratio: f64,
}

impl Budget {
    pub fn new(
        tag_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        target: Amount,
    ) -> ResultEngine<Self> {
        if start >= end {
            return Err(EngineError::validation(
                "window",
                "budget start must be before end",
            ));
        }
        if !target.is_positive() {
            return Err(EngineError::validation(
                "target",
                "budget target must be > 0",
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            tag_id,
            start,
            end,
            target,
        })
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// Sums the expense lines for this budget's tag inside the window,
    /// valued in the reference currency.
    pub fn actual(&self, lines: &[PostedLine]) -> ResultEngine<Amount> {
        let mut total = Amount::ZERO;
        for posted in lines {
            if posted.line.tag_id != self.tag_id
                || posted.line.sign != Sign::Minus
                || !self.contains(posted.occurred_at)
            {
                continue;
            }
            total = total
                .checked_add(posted.line.reference_value()?.abs())
                .ok_or_else(|| EngineError::InvalidAmount("amount overflow".to_string()))?;
        }
        Ok(total)
    }

    pub fn progress(&self, lines: &[PostedLine]) -> ResultEngine<BudgetProgress> {
        let actual = self.actual(lines)?;
        let target = self.target;
        let ratio = if target.is_zero() {
            0.0
        } else {
            actual.to_decimal() / target.to_decimal()
        };
        Ok(BudgetProgress {
            actual,
            target,
            ratio,
        })
    }
}
