//! Ledger lines.
//!
//! A [`Line`] is a single signed balance change applied to one account under
//! one tag, as part of a [`Transaction`](crate::Transaction). In the engine,
//! *every* change to balances happens via lines.
//!
//! The magnitude is always non-negative; the direction lives in [`Sign`],
//! never folded into the number. Each line also snapshots the exchange
//! [`rate`](Line::rate) of its account's currency against the reference
//! currency at transaction time, so historical reports stay stable when the
//! live rate cache moves on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, EngineError, ResultEngine, SystemTag};

/// Direction of a line: `+` increases the account, `-` decreases it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sign {
    Plus,
    Minus,
}

impl Sign {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
        }
    }

    #[must_use]
    pub const fn flip(self) -> Sign {
        match self {
            Self::Plus => Self::Minus,
            Self::Minus => Self::Plus,
        }
    }
}

impl TryFrom<&str> for Sign {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "+" => Ok(Self::Plus),
            "-" => Ok(Self::Minus),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid sign: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub tag_id: Uuid,
    pub sign: Sign,
    /// Non-negative magnitude; direction is in `sign`.
    pub amount: Amount,
    /// Value of this line's account currency against the reference currency
    /// at transaction time.
    pub rate: Amount,
    /// Set only for percentage-based common add-ons, so the percentage — not
    /// just the resulting amount — survives for later editing.
    pub pct_value: Option<Amount>,
    /// Distinguishes common add-on lines (tip/fee/VAT/discount) from
    /// category sub-entries.
    pub is_common: bool,
}

impl Line {
    /// Creates a line. The magnitude must be strictly positive: zero-amount
    /// lines are never persisted (a cleared fee drops its line entirely).
    pub fn new(
        transaction_id: Uuid,
        account_id: Uuid,
        tag_id: Uuid,
        sign: Sign,
        amount: Amount,
        rate: Amount,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "line amount must be > 0".to_string(),
            ));
        }
        if !rate.is_positive() {
            return Err(EngineError::InvalidAmount(
                "line rate must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            transaction_id,
            account_id,
            tag_id,
            sign,
            amount,
            rate,
            pct_value: None,
            is_common: false,
        })
    }

    /// Marks this line as a common add-on, optionally remembering the
    /// percentage it was computed from.
    #[must_use]
    pub fn as_common(mut self, pct_value: Option<Amount>) -> Self {
        self.is_common = true;
        self.pct_value = pct_value;
        self
    }

    /// The amount with its sign applied.
    #[must_use]
    pub fn signed_amount(&self) -> Amount {
        match self.sign {
            Sign::Plus => self.amount,
            Sign::Minus => -self.amount,
        }
    }

    /// Returns `true` if the line carries the given system tag.
    #[must_use]
    pub fn is_tagged(&self, tag: SystemTag) -> bool {
        self.tag_id == tag.id()
    }

    /// Signed value in the reference currency through the rate snapshot.
    pub fn reference_value(&self) -> ResultEngine<Amount> {
        self.signed_amount().checked_mul(self.rate)
    }
}

/// A line joined with its transaction's timestamp and counterparty, as
/// returned by range queries. Aggregations work over these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedLine {
    pub line: Line,
    pub occurred_at: DateTime<Utc>,
    pub counterparty_id: Option<Uuid>,
}
