//! The persistence port the engine consumes.
//!
//! The engine itself is pure compute: it never performs I/O. Everything
//! stateful — accounts, the transaction/line tables, the latest-rate cache —
//! lives behind this trait, implemented by the embedding application's
//! store (the `memstore` crate ships an in-memory reference implementation).
//!
//! ## Atomicity contract
//!
//! A transaction's line set commits as a unit: [`insert_transaction`],
//! [`replace_lines`] and [`delete_transaction`] either apply all line writes
//! *and* the matching balance deltas (computed with
//! [`balance_delta`](crate::ops::balance_delta)), or nothing. A balance
//! delta applied without its line write — or the reverse — is an
//! [`InvariantViolation`](crate::EngineError::InvariantViolation) in the
//! implementation, not a recoverable state.
//!
//! [`insert_transaction`]: Store::insert_transaction
//! [`replace_lines`]: Store::replace_lines
//! [`delete_transaction`]: Store::delete_transaction

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Account, Amount, Line, PostedLine, ResultEngine, Transaction};

pub trait Store {
    /// Loads one account.
    fn account(&self, id: Uuid) -> ResultEngine<Account>;

    /// Loads one transaction with its full line set.
    fn transaction(&self, id: Uuid) -> ResultEngine<Transaction>;

    /// Loads the line set of one transaction.
    fn lines_for_transaction(&self, transaction_id: Uuid) -> ResultEngine<Vec<Line>>;

    /// Loads the lines touching `account_id` with `occurred_at` in
    /// `[from, to)`, ordered by `occurred_at`.
    fn lines_for_account_in_range(
        &self,
        account_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ResultEngine<Vec<PostedLine>>;

    /// Persists a transaction and its lines atomically, applying one balance
    /// delta per line.
    fn insert_transaction(&mut self, tx: &Transaction) -> ResultEngine<()>;

    /// Replaces the full line set of an existing transaction atomically.
    ///
    /// Balance adjustments are netted per account from the old and new sets
    /// and applied exactly once each, so a sign flip plus a magnitude change
    /// still lands as a single adjustment.
    fn replace_lines(&mut self, transaction_id: Uuid, lines: &[Line]) -> ResultEngine<()>;

    /// Removes a transaction and all its lines atomically, applying the
    /// inverse balance deltas.
    fn delete_transaction(&mut self, transaction_id: Uuid) -> ResultEngine<()>;

    /// Finds the same-wallet account holding `currency_id`, creating the
    /// shadow account if absent. Used by mixed-currency expenses.
    fn find_or_create_shadow_account(
        &mut self,
        wallet_id: Uuid,
        currency_id: Uuid,
    ) -> ResultEngine<Account>;

    /// Latest known rate of `currency_id` against the reference currency,
    /// if any transaction ever implied one.
    fn latest_rate(&self, currency_id: Uuid) -> ResultEngine<Option<Amount>>;

    /// Opportunistically refreshes the rate cache from a realized ratio.
    fn set_latest_rate(&mut self, currency_id: Uuid, rate: Amount) -> ResultEngine<()>;

    /// Id of the reference currency (the payment default).
    fn reference_currency(&self) -> ResultEngine<Uuid>;
}
