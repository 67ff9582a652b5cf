//! Wallets and accounts.
//!
//! A [`Wallet`] groups the [`Account`]s of one real-world container (a bank,
//! a pocket). Each account holds a balance in exactly one currency; the
//! balance is denormalized and maintained incrementally through
//! [`balance_delta`](crate::ops::balance_delta) — never recomputed from
//! scratch on the hot path.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, EngineError, ResultEngine};

/// A group of accounts. At most one wallet is the default wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub name: String,
    pub is_default: bool,
}

impl Wallet {
    pub fn new(name: &str) -> ResultEngine<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(EngineError::validation(
                "name",
                "wallet name must not be empty",
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name: trimmed.to_string(),
            is_default: false,
        })
    }
}

/// One balance in one currency inside a wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub currency_id: Uuid,
    pub balance: Amount,
    /// At most one default account per wallet.
    pub is_default: bool,
    /// Auto-created landing account for mixed-currency expenses; UIs may
    /// hide it.
    pub is_shadow: bool,
}

impl Account {
    #[must_use]
    pub fn new(wallet_id: Uuid, currency_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            currency_id,
            balance: Amount::ZERO,
            is_default: false,
            is_shadow: false,
        }
    }

    /// Creates the same-wallet shadow account for a secondary currency.
    #[must_use]
    pub fn shadow(wallet_id: Uuid, currency_id: Uuid) -> Self {
        Self {
            is_shadow: true,
            ..Self::new(wallet_id, currency_id)
        }
    }

    /// Applies one signed balance delta.
    pub fn apply_delta(&mut self, delta: Amount) -> ResultEngine<()> {
        self.balance = self
            .balance
            .checked_add(delta)
            .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_accumulate_on_the_balance() {
        let mut account = Account::new(Uuid::new_v4(), Uuid::new_v4());
        account
            .apply_delta(Amount::from_decimal(10.0).unwrap())
            .unwrap();
        account
            .apply_delta(Amount::from_decimal(-2.5).unwrap())
            .unwrap();
        assert_eq!(account.balance, Amount::from_decimal(7.5).unwrap());
    }

    #[test]
    fn shadow_accounts_are_marked() {
        let shadow = Account::shadow(Uuid::new_v4(), Uuid::new_v4());
        assert!(shadow.is_shadow);
        assert!(shadow.balance.is_zero());
    }
}
