//! Incremental balance maintenance.
//!
//! The balance invariant: for every account,
//! `balance = initial_balance + Σ (line.amount signed by line.sign)` over all
//! live lines, after every insert, update and delete. The store keeps it by
//! applying the exact delta computed here atomically with each line write —
//! the hot path never recomputes a balance from scratch.

use crate::{Amount, EngineError, Line, ResultEngine};

/// Signed balance delta for one line mutation.
///
/// - insert: `(None, Some(new))` → `+new.signed_amount()`
/// - delete: `(Some(old), None)` → `-old.signed_amount()`
/// - in-place update: `(Some(old), Some(new))` → the *net* difference, one
///   adjustment even across sign flips and magnitude changes
///
/// `(None, None)` means a delta was requested without any line mutation:
/// that is a programming error, reported as
/// [`InvariantViolation`](EngineError::InvariantViolation) rather than
/// silently tolerated. An in-place update that moves the line to another
/// account is likewise rejected; model that as delete + insert.
pub fn balance_delta(old: Option<&Line>, new: Option<&Line>) -> ResultEngine<Amount> {
    match (old, new) {
        (None, None) => Err(EngineError::InvariantViolation(
            "balance delta requested without a line mutation".to_string(),
        )),
        (None, Some(new)) => Ok(new.signed_amount()),
        (Some(old), None) => Ok(-old.signed_amount()),
        (Some(old), Some(new)) => {
            if old.account_id != new.account_id {
                return Err(EngineError::InvariantViolation(
                    "in-place line update must keep the account".to_string(),
                ));
            }
            Ok(new.signed_amount() - old.signed_amount())
        }
    }
}

/// Recomputes a balance from scratch. Audit/test helper, not the hot path.
#[must_use]
pub fn replay_balance<'a>(
    initial: Amount,
    lines: impl IntoIterator<Item = &'a Line>,
) -> Amount {
    lines
        .into_iter()
        .fold(initial, |acc, line| acc + line.signed_amount())
}
