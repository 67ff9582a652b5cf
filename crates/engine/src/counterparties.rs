//! Counterparties (shops, employers, people) referenced by transactions.
//!
//! The affinity set biases future category suggestions for this
//! counterparty; it is advisory, never authoritative. The engine never
//! updates it on its own: [`Ledger::record`](crate::Ledger::record) only
//! stores the counterparty id on the transaction, and the embedding
//! application calls [`record_affinity`](Counterparty::record_affinity) with
//! the tags it chose.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::normalize_name};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparty {
    pub id: Uuid,
    pub name: String,
    pub name_norm: String,
    /// Tag ids this counterparty has been categorized under before.
    pub affinity: BTreeSet<Uuid>,
}

impl Counterparty {
    pub fn new(name: &str) -> ResultEngine<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(EngineError::validation(
                "name",
                "counterparty name must not be empty",
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name: trimmed.to_string(),
            name_norm: normalize_name(trimmed),
            affinity: BTreeSet::new(),
        })
    }

    /// Records that a transaction with this counterparty used `tag_id`.
    pub fn record_affinity(&mut self, tag_id: Uuid) {
        self.affinity.insert(tag_id);
    }
}
