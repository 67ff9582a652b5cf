//! In-memory reference implementation of the engine's [`Store`] port.
//!
//! `MemStore` holds all reference data and transactions in process memory
//! and maintains denormalized account balances through
//! [`balance_delta`](engine::ops::balance_delta), applied exactly once per
//! line mutation at the same boundary as the line write. Mutations covering
//! a whole transaction validate everything up front and only then apply, so
//! a failed call never leaves a partial line set behind.
//!
//! It backs the engine's integration tests and is a template for a real
//! store: a relational implementation must keep the same atomicity contract
//! inside its database transactions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use engine::{
    Account, Amount, Currency, EngineError, Line, PostedLine, ResultEngine, Sign, Store,
    SystemTag, Transaction, Wallet,
    ops::balance_delta,
};

#[derive(Debug, Default)]
pub struct MemStore {
    reference_currency: Option<Uuid>,
    currencies: HashMap<Uuid, Currency>,
    wallets: HashMap<Uuid, Wallet>,
    accounts: HashMap<Uuid, Account>,
    transactions: HashMap<Uuid, Transaction>,
    rates: HashMap<Uuid, Amount>,
}

impl MemStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a currency. The payment-default currency becomes the
    /// reference currency; only one may carry that flag.
    pub fn add_currency(&mut self, currency: Currency) -> ResultEngine<Uuid> {
        if self.currencies.contains_key(&currency.id) {
            return Err(EngineError::ExistingKey(currency.id.to_string()));
        }
        if currency.is_payment_default {
            if self.reference_currency.is_some() {
                return Err(EngineError::ExistingKey(
                    "payment default currency".to_string(),
                ));
            }
            self.reference_currency = Some(currency.id);
        }
        let id = currency.id;
        self.currencies.insert(id, currency);
        Ok(id)
    }

    pub fn add_wallet(&mut self, wallet: Wallet) -> ResultEngine<Uuid> {
        if self.wallets.contains_key(&wallet.id) {
            return Err(EngineError::ExistingKey(wallet.id.to_string()));
        }
        if wallet.is_default && self.wallets.values().any(|w| w.is_default) {
            return Err(EngineError::ExistingKey("default wallet".to_string()));
        }
        let id = wallet.id;
        self.wallets.insert(id, wallet);
        Ok(id)
    }

    /// Opens an account in a wallet. A non-zero opening balance is recorded
    /// as an initial-balance transaction, so the balance invariant holds
    /// from the first line on.
    pub fn open_account(
        &mut self,
        wallet_id: Uuid,
        currency_id: Uuid,
        opening_balance: Amount,
    ) -> ResultEngine<Uuid> {
        if !self.wallets.contains_key(&wallet_id) {
            return Err(EngineError::KeyNotFound(format!("wallet {wallet_id}")));
        }
        if !self.currencies.contains_key(&currency_id) {
            return Err(EngineError::KeyNotFound(format!("currency {currency_id}")));
        }
        let account = Account::new(wallet_id, currency_id);
        let account_id = account.id;
        self.accounts.insert(account_id, account);

        if !opening_balance.is_zero() {
            let sign = if opening_balance.is_negative() {
                Sign::Minus
            } else {
                Sign::Plus
            };
            let mut tx = Transaction::new(Utc::now(), None, None);
            tx.lines = vec![Line::new(
                tx.id,
                account_id,
                SystemTag::InitialBalance.id(),
                sign,
                opening_balance.abs(),
                self.rate_snapshot(currency_id),
            )?];
            self.insert_transaction(&tx)?;
        }
        Ok(account_id)
    }

    /// All accounts of one wallet, shadow accounts included.
    #[must_use]
    pub fn accounts_in_wallet(&self, wallet_id: Uuid) -> Vec<Account> {
        self.accounts
            .values()
            .filter(|a| a.wallet_id == wallet_id)
            .cloned()
            .collect()
    }

    /// Current rate snapshot for a currency: 1 for the reference currency,
    /// the cached rate otherwise (1 when nothing is cached yet).
    #[must_use]
    pub fn rate_snapshot(&self, currency_id: Uuid) -> Amount {
        if self.reference_currency == Some(currency_id) {
            return Amount::ONE;
        }
        self.rates.get(&currency_id).copied().unwrap_or(Amount::ONE)
    }

    /// All posted lines with `occurred_at` in `[from, to)`, across accounts,
    /// ordered by `occurred_at`. Query helper for summaries.
    pub fn lines_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<PostedLine> {
        let mut posted: Vec<PostedLine> = self
            .transactions
            .values()
            .filter(|tx| from <= tx.occurred_at && tx.occurred_at < to)
            .flat_map(|tx| {
                tx.lines.iter().map(|line| PostedLine {
                    line: line.clone(),
                    occurred_at: tx.occurred_at,
                    counterparty_id: tx.counterparty_id,
                })
            })
            .collect();
        posted.sort_by_key(|p| p.occurred_at);
        posted
    }

    fn require_account_mut(&mut self, id: Uuid) -> ResultEngine<&mut Account> {
        self.accounts
            .get_mut(&id)
            .ok_or_else(|| EngineError::KeyNotFound(format!("account {id}")))
    }

    /// Validates a line set before any state changes: ids must match the
    /// transaction and every referenced account must exist.
    fn validate_lines(&self, transaction_id: Uuid, lines: &[Line]) -> ResultEngine<()> {
        if lines.is_empty() {
            return Err(EngineError::InvalidAmount(
                "transaction must have at least one line".to_string(),
            ));
        }
        for line in lines {
            if line.transaction_id != transaction_id {
                return Err(EngineError::InvariantViolation(
                    "line transaction_id mismatch".to_string(),
                ));
            }
            if !self.accounts.contains_key(&line.account_id) {
                return Err(EngineError::KeyNotFound(format!(
                    "account {}",
                    line.account_id
                )));
            }
        }
        Ok(())
    }

    /// Net signed delta per account for replacing `old` with `new`.
    fn net_deltas(old: &[Line], new: &[Line]) -> ResultEngine<HashMap<Uuid, Amount>> {
        let mut deltas: HashMap<Uuid, Amount> = HashMap::new();
        for line in old {
            let delta = balance_delta(Some(line), None)?;
            let entry = deltas.entry(line.account_id).or_insert(Amount::ZERO);
            *entry += delta;
        }
        for line in new {
            let delta = balance_delta(None, Some(line))?;
            let entry = deltas.entry(line.account_id).or_insert(Amount::ZERO);
            *entry += delta;
        }
        Ok(deltas)
    }

    fn apply_deltas(&mut self, deltas: HashMap<Uuid, Amount>) -> ResultEngine<()> {
        for (account_id, delta) in deltas {
            self.require_account_mut(account_id)?.apply_delta(delta)?;
        }
        Ok(())
    }
}

impl Store for MemStore {
    fn account(&self, id: Uuid) -> ResultEngine<Account> {
        self.accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::KeyNotFound(format!("account {id}")))
    }

    fn transaction(&self, id: Uuid) -> ResultEngine<Transaction> {
        self.transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::KeyNotFound(format!("transaction {id}")))
    }

    fn lines_for_transaction(&self, transaction_id: Uuid) -> ResultEngine<Vec<Line>> {
        Ok(self.transaction(transaction_id)?.lines)
    }

    fn lines_for_account_in_range(
        &self,
        account_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> ResultEngine<Vec<PostedLine>> {
        if !self.accounts.contains_key(&account_id) {
            return Err(EngineError::KeyNotFound(format!("account {account_id}")));
        }
        Ok(self
            .lines_in_range(from, to)
            .into_iter()
            .filter(|posted| posted.line.account_id == account_id)
            .collect())
    }

    fn insert_transaction(&mut self, tx: &Transaction) -> ResultEngine<()> {
        if self.transactions.contains_key(&tx.id) {
            return Err(EngineError::ExistingKey(tx.id.to_string()));
        }
        self.validate_lines(tx.id, &tx.lines)?;
        let deltas = Self::net_deltas(&[], &tx.lines)?;
        self.apply_deltas(deltas)?;
        self.transactions.insert(tx.id, tx.clone());
        debug!(transaction_id = %tx.id, lines = tx.lines.len(), "inserted transaction");
        Ok(())
    }

    fn replace_lines(&mut self, transaction_id: Uuid, lines: &[Line]) -> ResultEngine<()> {
        let old = self.lines_for_transaction(transaction_id)?;
        self.validate_lines(transaction_id, lines)?;
        let deltas = Self::net_deltas(&old, lines)?;
        self.apply_deltas(deltas)?;
        if let Some(tx) = self.transactions.get_mut(&transaction_id) {
            tx.lines = lines.to_vec();
        }
        debug!(%transaction_id, lines = lines.len(), "replaced line set");
        Ok(())
    }

    fn delete_transaction(&mut self, transaction_id: Uuid) -> ResultEngine<()> {
        let old = self.lines_for_transaction(transaction_id)?;
        let deltas = Self::net_deltas(&old, &[])?;
        self.apply_deltas(deltas)?;
        self.transactions.remove(&transaction_id);
        debug!(%transaction_id, "deleted transaction");
        Ok(())
    }

    fn find_or_create_shadow_account(
        &mut self,
        wallet_id: Uuid,
        currency_id: Uuid,
    ) -> ResultEngine<Account> {
        if !self.wallets.contains_key(&wallet_id) {
            return Err(EngineError::KeyNotFound(format!("wallet {wallet_id}")));
        }
        if !self.currencies.contains_key(&currency_id) {
            return Err(EngineError::KeyNotFound(format!("currency {currency_id}")));
        }
        if let Some(existing) = self
            .accounts
            .values()
            .find(|a| a.wallet_id == wallet_id && a.currency_id == currency_id)
        {
            return Ok(existing.clone());
        }
        let account = Account::shadow(wallet_id, currency_id);
        debug!(account_id = %account.id, %wallet_id, %currency_id, "created shadow account");
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    fn latest_rate(&self, currency_id: Uuid) -> ResultEngine<Option<Amount>> {
        if !self.currencies.contains_key(&currency_id) {
            return Err(EngineError::KeyNotFound(format!("currency {currency_id}")));
        }
        Ok(self.rates.get(&currency_id).copied())
    }

    fn set_latest_rate(&mut self, currency_id: Uuid, rate: Amount) -> ResultEngine<()> {
        if !self.currencies.contains_key(&currency_id) {
            return Err(EngineError::KeyNotFound(format!("currency {currency_id}")));
        }
        if !rate.is_positive() {
            return Err(EngineError::InvalidAmount("rate must be > 0".to_string()));
        }
        self.rates.insert(currency_id, rate);
        Ok(())
    }

    fn reference_currency(&self) -> ResultEngine<Uuid> {
        self.reference_currency
            .ok_or_else(|| EngineError::KeyNotFound("reference currency".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use engine::ops::replay_balance;

    use super::*;

    fn amt(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn store_with_account() -> (MemStore, Uuid) {
        let mut store = MemStore::new();
        let eur = store
            .add_currency(Currency::fiat("EUR", "€", 2).payment_default())
            .unwrap();
        let wallet = store.add_wallet(Wallet::new("Main").unwrap()).unwrap();
        let account = store.open_account(wallet, eur, Amount::ZERO).unwrap();
        (store, account)
    }

    fn expense_tx(account: Uuid, amount: &str) -> Transaction {
        let mut tx = Transaction::new(Utc::now(), None, None);
        tx.lines = vec![
            Line::new(
                tx.id,
                account,
                Uuid::new_v4(),
                Sign::Minus,
                amt(amount),
                Amount::ONE,
            )
            .unwrap(),
        ];
        tx
    }

    #[test]
    fn balances_track_inserts_updates_and_deletes() {
        let (mut store, account) = store_with_account();
        let tx = expense_tx(account, "12.5");
        store.insert_transaction(&tx).unwrap();
        assert_eq!(store.account(account).unwrap().balance, amt("-12.5"));

        // Sign flip plus magnitude change in one replace.
        let mut flipped = tx.lines[0].clone();
        flipped.sign = Sign::Plus;
        flipped.amount = amt("4");
        store.replace_lines(tx.id, &[flipped]).unwrap();
        assert_eq!(store.account(account).unwrap().balance, amt("4"));

        store.delete_transaction(tx.id).unwrap();
        assert!(store.account(account).unwrap().balance.is_zero());
    }

    #[test]
    fn balance_equals_replay_of_live_lines() {
        let (mut store, account) = store_with_account();
        for amount in ["12.5", "3", "0.01"] {
            store.insert_transaction(&expense_tx(account, amount)).unwrap();
        }
        let lines: Vec<Line> = store
            .transactions
            .values()
            .flat_map(|tx| tx.lines.clone())
            .collect();
        assert_eq!(
            store.account(account).unwrap().balance,
            replay_balance(Amount::ZERO, &lines)
        );
    }

    #[test]
    fn failed_inserts_leave_no_partial_state() {
        let (mut store, account) = store_with_account();
        let mut tx = expense_tx(account, "10");
        // Second line references an unknown account: the whole set must be
        // rejected before any delta applies.
        tx.lines.push(
            Line::new(
                tx.id,
                Uuid::new_v4(),
                Uuid::new_v4(),
                Sign::Minus,
                amt("5"),
                Amount::ONE,
            )
            .unwrap(),
        );
        assert!(store.insert_transaction(&tx).is_err());
        assert!(store.account(account).unwrap().balance.is_zero());
        assert!(store.transaction(tx.id).is_err());
    }

    #[test]
    fn opening_balances_are_initial_balance_transactions() {
        let mut store = MemStore::new();
        let eur = store
            .add_currency(Currency::fiat("EUR", "€", 2).payment_default())
            .unwrap();
        let wallet = store.add_wallet(Wallet::new("Main").unwrap()).unwrap();
        let account = store.open_account(wallet, eur, amt("250")).unwrap();
        assert_eq!(store.account(account).unwrap().balance, amt("250"));

        let tx = store.transactions.values().next().unwrap();
        assert!(tx.lines[0].is_tagged(SystemTag::InitialBalance));
    }

    #[test]
    fn shadow_accounts_are_reused_per_wallet_and_currency() {
        let mut store = MemStore::new();
        let eur = store
            .add_currency(Currency::fiat("EUR", "€", 2).payment_default())
            .unwrap();
        let usd = store.add_currency(Currency::fiat("USD", "$", 2)).unwrap();
        let wallet = store.add_wallet(Wallet::new("Main").unwrap()).unwrap();
        let _ = store.open_account(wallet, eur, Amount::ZERO).unwrap();

        let first = store.find_or_create_shadow_account(wallet, usd).unwrap();
        let second = store.find_or_create_shadow_account(wallet, usd).unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.is_shadow);
    }

    #[test]
    fn only_one_payment_default_currency() {
        let mut store = MemStore::new();
        store
            .add_currency(Currency::fiat("EUR", "€", 2).payment_default())
            .unwrap();
        let err = store
            .add_currency(Currency::fiat("USD", "$", 2).payment_default())
            .unwrap_err();
        assert!(matches!(err, EngineError::ExistingKey(_)));
    }
}
