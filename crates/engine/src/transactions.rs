//! Transaction primitives.
//!
//! A `Transaction` is an atomic event that changes balances via an unordered
//! set of [`Line`]s. There is no stored transaction type: the shape of the
//! line set alone determines how a transaction reads back (see
//! [`classify`](crate::ops::classify)).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Line, util::normalize_optional_text};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Opaque random identifier; never sequential, so persisted data does
    /// not leak entry order.
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
    pub counterparty_id: Option<Uuid>,
    /// Unordered: every engine algorithm over this set is
    /// permutation-invariant.
    pub lines: Vec<Line>,
}

impl Transaction {
    #[must_use]
    pub fn new(
        occurred_at: DateTime<Utc>,
        note: Option<&str>,
        counterparty_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at,
            note: normalize_optional_text(note),
            counterparty_id,
            lines: Vec::new(),
        }
    }
}
