//! Engine operations: building, classifying and persisting transactions.
//!
//! [`Ledger`] is the orchestration seam between the pure algorithms
//! ([`build`], [`classify`], [`decompose`], [`balance_delta`]) and the
//! [`Store`] port: it fetches the context a build needs, persists the result
//! atomically through the store, and applies opportunistic rate-cache
//! updates.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::{EngineError, ResultEngine, Store, Transaction};

mod balances;
pub mod build;
mod classify;
mod summary;

pub use balances::{balance_delta, replay_balance};
pub use build::{
    AddOn, AddOnValue, BuildContext, BuildOutput, CategoryEntry, ExchangeIntent, ExpenseExchange,
    ExpenseIntent, IncomeIntent, Intent, TransferIntent, build,
};
pub use classify::{
    AddOnView, EditableIntent, ExchangeView, ExpenseView, Mode, TransferView, classify, decompose,
};
pub use summary::{
    DaySummary, Rollup, counterparty_rollup, day_summaries, period_totals, tag_rollup,
};

/// A request to record one transaction.
#[derive(Clone, Debug)]
pub struct RecordCmd {
    pub intent: Intent,
    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
    pub counterparty_id: Option<Uuid>,
}

/// The ledger service over a concrete store.
#[derive(Debug)]
pub struct Ledger<S: Store> {
    store: S,
}

impl<S: Store> Ledger<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Fetches everything a build needs from the store, resolving the shadow
    /// account for mixed-currency expenses on the way.
    fn build_context(&mut self, intent: &Intent) -> ResultEngine<BuildContext> {
        let account_ids: Vec<Uuid> = match intent {
            Intent::Income(income) => vec![income.account_id],
            Intent::Expense(expense) => vec![expense.account_id],
            Intent::Transfer(transfer) => {
                vec![transfer.from_account_id, transfer.to_account_id]
            }
            Intent::Exchange(exchange) => {
                vec![exchange.from_account_id, exchange.to_account_id]
            }
        };

        let mut ctx = BuildContext {
            reference_currency_id: self.store.reference_currency()?,
            ..BuildContext::default()
        };
        for account_id in account_ids {
            let account = self.store.account(account_id)?;
            ctx.account_currencies
                .insert(account_id, account.currency_id);
        }

        if let Intent::Expense(expense) = intent
            && let Some(exchange) = &expense.exchange
        {
            let paying = self.store.account(expense.account_id)?;
            // Validated up front: a rejected intent must not leave a freshly
            // minted shadow account behind.
            let net = build::expense_net(expense)?;
            build::ensure_mixed_expense(exchange, paying.currency_id, net)?;
            let shadow = self
                .store
                .find_or_create_shadow_account(paying.wallet_id, exchange.currency_id)?;
            ctx.account_currencies.insert(shadow.id, shadow.currency_id);
            ctx.shadow_account_id = Some(shadow.id);
        }

        let currencies: Vec<Uuid> = ctx.account_currencies.values().copied().collect();
        for currency_id in currencies {
            if let Some(rate) = self.store.latest_rate(currency_id)? {
                ctx.rates.insert(currency_id, rate);
            }
        }
        Ok(ctx)
    }

    /// Builds and persists one transaction, then refreshes the rate cache
    /// from any implied rates.
    pub fn record(&mut self, cmd: RecordCmd) -> ResultEngine<Uuid> {
        let ctx = self.build_context(&cmd.intent)?;
        let mut tx = Transaction::new(cmd.occurred_at, cmd.note.as_deref(), cmd.counterparty_id);
        let output = build(tx.id, &cmd.intent, &ctx)?;
        tx.lines = output.lines;
        self.store.insert_transaction(&tx)?;
        for (currency_id, rate) in output.rate_updates {
            self.store.set_latest_rate(currency_id, rate)?;
        }
        debug!(transaction_id = %tx.id, "recorded transaction");
        Ok(tx.id)
    }

    /// Replaces the full line set of an existing transaction with the lines
    /// built from a corrected intent.
    pub fn amend(&mut self, transaction_id: Uuid, intent: &Intent) -> ResultEngine<()> {
        self.guard_writable(transaction_id)?;
        let ctx = self.build_context(intent)?;
        let output = build(transaction_id, intent, &ctx)?;
        self.store.replace_lines(transaction_id, &output.lines)?;
        for (currency_id, rate) in output.rate_updates {
            self.store.set_latest_rate(currency_id, rate)?;
        }
        debug!(%transaction_id, "amended transaction");
        Ok(())
    }

    /// Deletes a transaction and reverts its balance effects.
    pub fn erase(&mut self, transaction_id: Uuid) -> ResultEngine<()> {
        self.guard_writable(transaction_id)?;
        self.store.delete_transaction(transaction_id)?;
        debug!(%transaction_id, "erased transaction");
        Ok(())
    }

    /// Derived shape of a stored transaction.
    pub fn mode(&self, transaction_id: Uuid) -> ResultEngine<Mode> {
        let lines = self.store.lines_for_transaction(transaction_id)?;
        Ok(classify(&lines))
    }

    /// Editable intent of a stored transaction, for the edit form.
    pub fn editable(&self, transaction_id: Uuid) -> ResultEngine<EditableIntent> {
        let lines = self.store.lines_for_transaction(transaction_id)?;
        decompose(&lines)
    }

    fn guard_writable(&self, transaction_id: Uuid) -> ResultEngine<()> {
        if self.mode(transaction_id)?.is_read_only() {
            return Err(EngineError::validation(
                "transaction",
                "system transactions are read-only",
            ));
        }
        Ok(())
    }
}
