//! The transaction builder: user intent → canonical line set.
//!
//! `build` is pure and deterministic: it only returns data. Persisting the
//! lines and applying the returned rate-cache updates are separate effects
//! driven by the caller (see [`Ledger`](super::Ledger)).

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{Amount, EngineError, Line, ResultEngine, Sign, SystemTag};

/// One category sub-entry of an expense: its own tag and amount, so a single
/// real-world purchase can be split across categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CategoryEntry {
    pub tag_id: Uuid,
    pub amount: Amount,
}

/// How a common add-on's amount is determined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOnValue {
    Absolute(Amount),
    /// Fraction of the base (sum of category sub-entries before add-ons);
    /// `0.15` is a 15% tip. The percentage itself is persisted on the line.
    Percent(Amount),
}

/// A tip/fee/VAT/discount-style modifier on an expense.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddOn {
    pub tag_id: Uuid,
    pub value: AddOnValue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomeIntent {
    pub account_id: Uuid,
    pub tag_id: Uuid,
    pub amount: Amount,
}

/// Present when the categories are priced in a currency other than the
/// paying account's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpenseExchange {
    /// Amount leaving the paying account, in its own currency.
    pub paid: Amount,
    /// Currency the category sub-entries and add-ons are priced in.
    pub currency_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpenseIntent {
    /// The paying account.
    pub account_id: Uuid,
    pub entries: Vec<CategoryEntry>,
    pub addons: Vec<AddOn>,
    pub exchange: Option<ExpenseExchange>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferIntent {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Amount,
    /// Fee charged on the source account. A cleared (zero) fee drops the
    /// line and its tag association entirely.
    pub fee: Option<Amount>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeIntent {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    /// Magnitude leaving the source account, in its currency.
    pub amount_out: Amount,
    /// Magnitude landing on the destination account, in its currency.
    /// Independent of `amount_out`: conversion is not required to follow the
    /// cached rate.
    pub amount_in: Amount,
    pub fee: Option<Amount>,
}

/// A typed user intent. Expense stays a single closed concept regardless of
/// currency mixing; there is no separate "multi-currency expense" intent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    Income(IncomeIntent),
    Expense(ExpenseIntent),
    Transfer(TransferIntent),
    Exchange(ExchangeIntent),
}

/// Data the caller fetched from the store before building. Keeping it as
/// plain data keeps `build` pure.
#[derive(Clone, Debug, Default)]
pub struct BuildContext {
    pub reference_currency_id: Uuid,
    /// account id → currency id, for every account the intent references.
    pub account_currencies: HashMap<Uuid, Uuid>,
    /// currency id → latest cached rate against the reference currency.
    pub rates: HashMap<Uuid, Amount>,
    /// Same-wallet landing account for a mixed-currency expense, resolved by
    /// the caller via the store.
    pub shadow_account_id: Option<Uuid>,
}

impl BuildContext {
    fn currency_of(&self, account_id: Uuid) -> ResultEngine<Uuid> {
        self.account_currencies
            .get(&account_id)
            .copied()
            .ok_or_else(|| EngineError::KeyNotFound(format!("account {account_id}")))
    }

    /// Rate snapshot for a currency. The reference currency is always 1; an
    /// unknown currency falls back to 1 with a warning rather than failing
    /// the build.
    fn rate_of(&self, currency_id: Uuid) -> Amount {
        if currency_id == self.reference_currency_id {
            return Amount::ONE;
        }
        match self.rates.get(&currency_id) {
            Some(rate) => *rate,
            None => {
                warn!(%currency_id, "no cached rate for currency, snapshotting 1");
                Amount::ONE
            }
        }
    }
}

/// The builder's result: the canonical line set plus opportunistic rate-cache
/// updates implied by the realized amounts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildOutput {
    pub lines: Vec<Line>,
    pub rate_updates: Vec<(Uuid, Amount)>,
}

/// Expands a typed intent into the canonical line set for `transaction_id`.
///
/// Pure and deterministic apart from freshly minted line ids. Rejects
/// invalid intents without partially applying anything.
pub fn build(
    transaction_id: Uuid,
    intent: &Intent,
    ctx: &BuildContext,
) -> ResultEngine<BuildOutput> {
    let output = match intent {
        Intent::Income(income) => build_income(transaction_id, income, ctx)?,
        Intent::Expense(expense) => build_expense(transaction_id, expense, ctx)?,
        Intent::Transfer(transfer) => build_transfer(transaction_id, transfer, ctx)?,
        Intent::Exchange(exchange) => build_exchange(transaction_id, exchange, ctx)?,
    };
    debug!(
        %transaction_id,
        lines = output.lines.len(),
        rate_updates = output.rate_updates.len(),
        "built line set"
    );
    Ok(output)
}

fn build_income(
    transaction_id: Uuid,
    intent: &IncomeIntent,
    ctx: &BuildContext,
) -> ResultEngine<BuildOutput> {
    if !intent.amount.is_positive() {
        return Err(EngineError::validation(
            "amount",
            "income amount must be > 0",
        ));
    }
    let currency = ctx.currency_of(intent.account_id)?;
    let line = Line::new(
        transaction_id,
        intent.account_id,
        intent.tag_id,
        Sign::Plus,
        intent.amount,
        ctx.rate_of(currency),
    )?;
    Ok(BuildOutput {
        lines: vec![line],
        rate_updates: Vec::new(),
    })
}

/// Computed add-on, ready to turn into a line.
struct ResolvedAddOn {
    tag_id: Uuid,
    amount: Amount,
    pct_value: Option<Amount>,
}

/// Resolves add-ons against the base, dropping cleared (zero-amount) ones so
/// no dangling zero-amount fee line survives.
fn resolve_addons(addons: &[AddOn], base: Amount) -> ResultEngine<Vec<ResolvedAddOn>> {
    let mut resolved = Vec::with_capacity(addons.len());
    for addon in addons {
        let (amount, pct_value) = match addon.value {
            AddOnValue::Absolute(amount) => {
                if amount.is_negative() {
                    return Err(EngineError::validation(
                        "add-on",
                        "add-on amount must not be negative",
                    ));
                }
                (amount, None)
            }
            AddOnValue::Percent(pct) => {
                if pct.is_negative() {
                    return Err(EngineError::validation(
                        "add-on",
                        "add-on percentage must not be negative",
                    ));
                }
                (base.checked_mul(pct)?, Some(pct))
            }
        };
        if amount.is_zero() {
            continue;
        }
        resolved.push(ResolvedAddOn {
            tag_id: addon.tag_id,
            amount,
            pct_value,
        });
    }
    Ok(resolved)
}

/// Sum of the category sub-entries, each validated strictly positive.
fn expense_base(intent: &ExpenseIntent) -> ResultEngine<Amount> {
    if intent.entries.is_empty() {
        return Err(EngineError::validation(
            "category",
            "at least one category entry is required",
        ));
    }
    let mut base = Amount::ZERO;
    for entry in &intent.entries {
        if !entry.amount.is_positive() {
            return Err(EngineError::validation(
                "amount",
                "category amount must be > 0",
            ));
        }
        base += entry.amount;
    }
    Ok(base)
}

/// Net spend in the category currency: category entries plus fee-style
/// add-ons, minus discounts.
fn net_of(base: Amount, addons: &[ResolvedAddOn]) -> ResultEngine<Amount> {
    let mut net = base;
    for addon in addons {
        if addon.tag_id == SystemTag::Discount.id() {
            net = net
                .checked_sub(addon.amount)
                .ok_or_else(|| EngineError::InvalidAmount("amount overflow".to_string()))?;
        } else {
            net = net
                .checked_add(addon.amount)
                .ok_or_else(|| EngineError::InvalidAmount("amount overflow".to_string()))?;
        }
    }
    Ok(net)
}

/// Validates an expense intent and returns its net spend, without building
/// any lines. Shared by the builder and the pre-commit checks in
/// [`Ledger`](super::Ledger).
pub(crate) fn expense_net(intent: &ExpenseIntent) -> ResultEngine<Amount> {
    let base = expense_base(intent)?;
    let addons = resolve_addons(&intent.addons, base)?;
    net_of(base, &addons)
}

/// Rejects a mixed-currency expense whose exchange part cannot build. The
/// caller runs this before resolving a landing account: a rejected intent
/// must not mint a shadow account.
pub(crate) fn ensure_mixed_expense(
    exchange: &ExpenseExchange,
    paying_currency: Uuid,
    net: Amount,
) -> ResultEngine<()> {
    if exchange.currency_id == paying_currency {
        return Err(EngineError::CurrencyMismatch(
            "category currency equals the paying account currency".to_string(),
        ));
    }
    if !exchange.paid.is_positive() {
        return Err(EngineError::validation(
            "amount",
            "paid amount must be > 0",
        ));
    }
    if !net.is_positive() {
        return Err(EngineError::validation(
            "amount",
            "net category amount must be > 0",
        ));
    }
    Ok(())
}

fn build_expense(
    transaction_id: Uuid,
    intent: &ExpenseIntent,
    ctx: &BuildContext,
) -> ResultEngine<BuildOutput> {
    let base = expense_base(intent)?;
    let addons = resolve_addons(&intent.addons, base)?;
    let net = net_of(base, &addons)?;

    let paying_currency = ctx.currency_of(intent.account_id)?;
    let mut lines = Vec::new();
    let mut rate_updates = Vec::new();

    // Account the category/add-on lines live on, and the rate snapshot of
    // their currency.
    let (target_account, category_rate) = match &intent.exchange {
        None => (intent.account_id, ctx.rate_of(paying_currency)),
        Some(exchange) => {
            ensure_mixed_expense(exchange, paying_currency, net)?;
            let shadow = ctx.shadow_account_id.ok_or_else(|| {
                EngineError::validation(
                    "account",
                    "no landing account resolved for the category currency",
                )
            })?;

            // Independent snapshots; when one side is the reference
            // currency the realized ratio is authoritative and refreshes
            // the cache.
            let mut paying_rate = ctx.rate_of(paying_currency);
            let mut category_rate = ctx.rate_of(exchange.currency_id);
            if paying_currency == ctx.reference_currency_id {
                category_rate = exchange.paid.checked_div(net)?;
                rate_updates.push((exchange.currency_id, category_rate));
            } else if exchange.currency_id == ctx.reference_currency_id {
                paying_rate = net.checked_div(exchange.paid)?;
                rate_updates.push((paying_currency, paying_rate));
            }

            lines.push(Line::new(
                transaction_id,
                intent.account_id,
                SystemTag::Exchange.id(),
                Sign::Minus,
                exchange.paid,
                paying_rate,
            )?);
            lines.push(Line::new(
                transaction_id,
                shadow,
                SystemTag::Exchange.id(),
                Sign::Plus,
                net,
                category_rate,
            )?);
            (shadow, category_rate)
        }
    };

    for entry in &intent.entries {
        lines.push(Line::new(
            transaction_id,
            target_account,
            entry.tag_id,
            Sign::Minus,
            entry.amount,
            category_rate,
        )?);
    }
    for addon in addons {
        let sign = if addon.tag_id == SystemTag::Discount.id() {
            Sign::Plus
        } else {
            Sign::Minus
        };
        lines.push(
            Line::new(
                transaction_id,
                target_account,
                addon.tag_id,
                sign,
                addon.amount,
                category_rate,
            )?
            .as_common(addon.pct_value),
        );
    }

    Ok(BuildOutput {
        lines,
        rate_updates,
    })
}

/// Normalizes an optional fee: a cleared (zero) fee means "no fee line".
fn resolve_fee(fee: Option<Amount>) -> ResultEngine<Option<Amount>> {
    match fee {
        None => Ok(None),
        Some(fee) if fee.is_zero() => Ok(None),
        Some(fee) if fee.is_negative() => Err(EngineError::validation(
            "fee",
            "fee must not be negative",
        )),
        Some(fee) => Ok(Some(fee)),
    }
}

fn build_transfer(
    transaction_id: Uuid,
    intent: &TransferIntent,
    ctx: &BuildContext,
) -> ResultEngine<BuildOutput> {
    if !intent.amount.is_positive() {
        return Err(EngineError::validation(
            "amount",
            "transfer amount must be > 0",
        ));
    }
    if intent.to_account_id == intent.from_account_id {
        return Err(EngineError::validation(
            "destination",
            "transfer destination must differ from the source",
        ));
    }
    let from_currency = ctx.currency_of(intent.from_account_id)?;
    let to_currency = ctx.currency_of(intent.to_account_id)?;
    if from_currency != to_currency {
        return Err(EngineError::CurrencyMismatch(
            "transfer requires the same currency on both accounts".to_string(),
        ));
    }
    let rate = ctx.rate_of(from_currency);

    let mut lines = vec![
        Line::new(
            transaction_id,
            intent.from_account_id,
            SystemTag::Transfer.id(),
            Sign::Minus,
            intent.amount,
            rate,
        )?,
        Line::new(
            transaction_id,
            intent.to_account_id,
            SystemTag::Transfer.id(),
            Sign::Plus,
            intent.amount,
            rate,
        )?,
    ];
    if let Some(fee) = resolve_fee(intent.fee)? {
        lines.push(Line::new(
            transaction_id,
            intent.from_account_id,
            SystemTag::Fee.id(),
            Sign::Minus,
            fee,
            rate,
        )?);
    }

    Ok(BuildOutput {
        lines,
        rate_updates: Vec::new(),
    })
}

fn build_exchange(
    transaction_id: Uuid,
    intent: &ExchangeIntent,
    ctx: &BuildContext,
) -> ResultEngine<BuildOutput> {
    if !intent.amount_out.is_positive() {
        return Err(EngineError::validation(
            "amount",
            "exchange amount must be > 0",
        ));
    }
    if !intent.amount_in.is_positive() {
        return Err(EngineError::validation(
            "destination",
            "exchange destination amount must be > 0",
        ));
    }
    if intent.to_account_id == intent.from_account_id {
        return Err(EngineError::validation(
            "destination",
            "exchange destination must differ from the source",
        ));
    }
    let from_currency = ctx.currency_of(intent.from_account_id)?;
    let to_currency = ctx.currency_of(intent.to_account_id)?;
    if from_currency == to_currency {
        return Err(EngineError::CurrencyMismatch(
            "exchange requires two different currencies".to_string(),
        ));
    }

    let mut rate_updates = Vec::new();
    let mut from_rate = ctx.rate_of(from_currency);
    let mut to_rate = ctx.rate_of(to_currency);
    if from_currency == ctx.reference_currency_id {
        to_rate = intent.amount_out.checked_div(intent.amount_in)?;
        rate_updates.push((to_currency, to_rate));
    } else if to_currency == ctx.reference_currency_id {
        from_rate = intent.amount_in.checked_div(intent.amount_out)?;
        rate_updates.push((from_currency, from_rate));
    }

    let mut lines = vec![
        Line::new(
            transaction_id,
            intent.from_account_id,
            SystemTag::Exchange.id(),
            Sign::Minus,
            intent.amount_out,
            from_rate,
        )?,
        Line::new(
            transaction_id,
            intent.to_account_id,
            SystemTag::Exchange.id(),
            Sign::Plus,
            intent.amount_in,
            to_rate,
        )?,
    ];
    if let Some(fee) = resolve_fee(intent.fee)? {
        lines.push(Line::new(
            transaction_id,
            intent.from_account_id,
            SystemTag::Fee.id(),
            Sign::Minus,
            fee,
            from_rate,
        )?);
    }

    Ok(BuildOutput {
        lines,
        rate_updates,
    })
}
