//! The transaction classifier: persisted line set → transaction shape.
//!
//! Transactions carry no stored type. [`classify`] derives one from the line
//! set's structure, and [`decompose`] inverts the builder so the UI can edit
//! a transaction through the same intent it was entered with.
//!
//! Both functions are permutation-invariant over the line set.

use tracing::warn;
use uuid::Uuid;

use crate::{
    Amount, EngineError, Line, ResultEngine, Sign, SystemTag,
    ops::build::{AddOnValue, CategoryEntry},
};

/// Derived transaction shape, in classification priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Opening balance of an account; read-only.
    InitialBalance,
    /// Manual balance correction; read-only.
    Adjustment,
    Income,
    Expense,
    Transfer,
    Exchange,
}

impl Mode {
    /// System modes are read-only: they cannot be amended or erased.
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::InitialBalance | Self::Adjustment)
    }
}

fn is_exchange(line: &Line) -> bool {
    line.is_tagged(SystemTag::Exchange)
}

/// Returns `true` for a line that reads as a category sub-entry: money out,
/// not an exchange/transfer/fee leg, not a common add-on.
fn is_category_expense(line: &Line) -> bool {
    line.sign == Sign::Minus
        && !line.is_common
        && !line.is_tagged(SystemTag::Exchange)
        && !line.is_tagged(SystemTag::Transfer)
        && !line.is_tagged(SystemTag::Fee)
}

/// Classifies a line set. First match wins:
///
/// 1. any INITIAL-BALANCE / ADJUSTMENT marker tag ⇒ that system mode;
/// 2. exactly two EXCHANGE legs plus at least one category sub-entry ⇒
///    Expense (a mixed-currency purchase, not a standalone exchange);
/// 3. any EXCHANGE leg ⇒ Exchange;
/// 4. any TRANSFER leg ⇒ Transfer;
/// 5. otherwise by sign: any `+` non-add-on line ⇒ Income, else Expense.
///
/// Rule 5 doubles as the fallback for externally imported data that matches
/// no engine-produced shape; such sets are logged rather than rejected.
#[must_use]
pub fn classify(lines: &[Line]) -> Mode {
    if lines
        .iter()
        .any(|line| line.is_tagged(SystemTag::InitialBalance))
    {
        return Mode::InitialBalance;
    }
    if lines.iter().any(|line| line.is_tagged(SystemTag::Adjustment)) {
        return Mode::Adjustment;
    }

    let exchange_legs = lines.iter().filter(|line| is_exchange(line)).count();
    if exchange_legs == 2 && lines.iter().any(is_category_expense) {
        return Mode::Expense;
    }
    if exchange_legs > 0 {
        return Mode::Exchange;
    }
    if lines.iter().any(|line| line.is_tagged(SystemTag::Transfer)) {
        return Mode::Transfer;
    }

    if lines.is_empty() {
        warn!("classifying an empty line set, defaulting to expense");
        return Mode::Expense;
    }
    if lines
        .iter()
        .any(|line| line.sign == Sign::Plus && !line.is_common)
    {
        Mode::Income
    } else {
        Mode::Expense
    }
}

/// A common add-on as recovered for editing: the percentage is restored from
/// the line when it was percentage-based, so the UI redisplays "15%" rather
/// than a frozen computed amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddOnView {
    pub tag_id: Uuid,
    pub value: AddOnValue,
    /// The resulting amount, for display next to the percentage.
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpenseView {
    /// The paying account (the EXCHANGE-out leg's account when the expense
    /// crossed currencies).
    pub account_id: Uuid,
    pub entries: Vec<CategoryEntry>,
    pub addons: Vec<AddOnView>,
    /// Amount that left the paying account in its own currency, when the
    /// categories were priced in another currency.
    pub paid: Option<Amount>,
    /// Account the category lines were recorded against when the expense
    /// crossed currencies; its currency is the category currency, so the
    /// caller can rebuild the exchange part of the intent from it.
    pub landing_account_id: Option<Uuid>,
    /// `true` when one category sub-entry and only percentage add-ons: the
    /// UI can show a single editable amount field instead of a split view.
    pub simple: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferView {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Amount,
    pub fee: Option<Amount>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeView {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount_out: Amount,
    pub amount_in: Amount,
    /// Rate snapshots of the two legs; independent of each other.
    pub from_rate: Amount,
    pub to_rate: Amount,
    pub fee: Option<Amount>,
}

/// The editable shape recovered from a persisted line set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditableIntent {
    /// System transactions are displayed but never edited.
    ReadOnly(Mode),
    Income {
        account_id: Uuid,
        tag_id: Uuid,
        amount: Amount,
    },
    Expense(ExpenseView),
    Transfer(TransferView),
    Exchange(ExchangeView),
}

/// Inverts the builder: recovers the editable intent from a line set.
///
/// Total over engine-produced data; externally imported sets that miss an
/// expected leg are rejected with a field-level validation error at this
/// boundary instead of failing deeper in the engine.
pub fn decompose(lines: &[Line]) -> ResultEngine<EditableIntent> {
    match classify(lines) {
        mode @ (Mode::InitialBalance | Mode::Adjustment) => Ok(EditableIntent::ReadOnly(mode)),
        Mode::Income => decompose_income(lines),
        Mode::Expense => decompose_expense(lines),
        Mode::Transfer => decompose_transfer(lines),
        Mode::Exchange => decompose_exchange(lines),
    }
}

fn missing(what: &str) -> EngineError {
    EngineError::validation("lines", format!("line set is missing {what}"))
}

fn decompose_income(lines: &[Line]) -> ResultEngine<EditableIntent> {
    let line = lines
        .iter()
        .find(|line| line.sign == Sign::Plus && !line.is_common)
        .ok_or_else(|| missing("an income line"))?;
    Ok(EditableIntent::Income {
        account_id: line.account_id,
        tag_id: line.tag_id,
        amount: line.amount,
    })
}

fn decompose_expense(lines: &[Line]) -> ResultEngine<EditableIntent> {
    // Mixed-currency expenses carry two EXCHANGE legs to unwind first.
    let exchange_out = lines
        .iter()
        .find(|line| is_exchange(line) && line.sign == Sign::Minus);
    let paid = exchange_out.map(|line| line.amount);

    let mut entries = Vec::new();
    let mut addons = Vec::new();
    let mut entry_account = None;
    for line in lines {
        if is_exchange(line) {
            continue;
        }
        if line.is_common {
            let value = match line.pct_value {
                Some(pct) => AddOnValue::Percent(pct),
                None => AddOnValue::Absolute(line.amount),
            };
            addons.push(AddOnView {
                tag_id: line.tag_id,
                value,
                amount: line.amount,
            });
        } else {
            entry_account = Some(line.account_id);
            entries.push(CategoryEntry {
                tag_id: line.tag_id,
                amount: line.amount,
            });
        }
    }
    if entries.is_empty() {
        return Err(missing("a category sub-entry"));
    }

    // The paying account: the exchange-out leg's account when currencies
    // were mixed, the category lines' account otherwise. In the mixed case
    // the category lines' account is the landing account.
    let (account_id, landing_account_id) = match exchange_out {
        Some(line) => (line.account_id, entry_account),
        None => (
            entry_account.ok_or_else(|| missing("a category sub-entry"))?,
            None,
        ),
    };

    let simple = entries.len() == 1
        && addons
            .iter()
            .all(|addon| matches!(addon.value, AddOnValue::Percent(_)));

    Ok(EditableIntent::Expense(ExpenseView {
        account_id,
        entries,
        addons,
        paid,
        landing_account_id,
        simple,
    }))
}

fn find_fee(lines: &[Line]) -> Option<Amount> {
    lines
        .iter()
        .find(|line| line.is_tagged(SystemTag::Fee) && line.sign == Sign::Minus)
        .map(|line| line.amount)
}

fn decompose_transfer(lines: &[Line]) -> ResultEngine<EditableIntent> {
    let out = lines
        .iter()
        .find(|line| line.is_tagged(SystemTag::Transfer) && line.sign == Sign::Minus)
        .ok_or_else(|| missing("the transfer source leg"))?;
    let into = lines
        .iter()
        .find(|line| line.is_tagged(SystemTag::Transfer) && line.sign == Sign::Plus)
        .ok_or_else(|| missing("the transfer destination leg"))?;
    Ok(EditableIntent::Transfer(TransferView {
        from_account_id: out.account_id,
        to_account_id: into.account_id,
        amount: out.amount,
        fee: find_fee(lines),
    }))
}

fn decompose_exchange(lines: &[Line]) -> ResultEngine<EditableIntent> {
    let out = lines
        .iter()
        .find(|line| is_exchange(line) && line.sign == Sign::Minus)
        .ok_or_else(|| missing("the exchange source leg"))?;
    let into = lines
        .iter()
        .find(|line| is_exchange(line) && line.sign == Sign::Plus)
        .ok_or_else(|| missing("the exchange destination leg"))?;
    Ok(EditableIntent::Exchange(ExchangeView {
        from_account_id: out.account_id,
        to_account_id: into.account_id,
        amount_out: out.amount,
        amount_in: into.amount,
        from_rate: out.rate,
        to_rate: into.rate,
        fee: find_fee(lines),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn line(account: Uuid, tag: Uuid, sign: Sign, amount: &str) -> Line {
        Line::new(Uuid::new_v4(), account, tag, sign, amt(amount), Amount::ONE).unwrap()
    }

    #[test]
    fn marker_tags_win_over_everything() {
        let account = Uuid::new_v4();
        let lines = vec![
            line(account, SystemTag::InitialBalance.id(), Sign::Plus, "100"),
            line(account, SystemTag::Exchange.id(), Sign::Minus, "5"),
        ];
        assert_eq!(classify(&lines), Mode::InitialBalance);
        assert_eq!(
            decompose(&lines).unwrap(),
            EditableIntent::ReadOnly(Mode::InitialBalance)
        );
    }

    #[test]
    fn two_exchange_legs_with_a_category_line_read_as_expense() {
        let usd_account = Uuid::new_v4();
        let shadow = Uuid::new_v4();
        let category = Uuid::new_v4();
        let lines = vec![
            line(usd_account, SystemTag::Exchange.id(), Sign::Minus, "20"),
            line(shadow, SystemTag::Exchange.id(), Sign::Plus, "18.5"),
            line(shadow, category, Sign::Minus, "18.5"),
        ];
        assert_eq!(classify(&lines), Mode::Expense);

        let EditableIntent::Expense(view) = decompose(&lines).unwrap() else {
            panic!("expected an expense view");
        };
        assert_eq!(view.account_id, usd_account);
        assert_eq!(view.paid, Some(amt("20")));
        assert_eq!(view.landing_account_id, Some(shadow));
        assert_eq!(view.entries, vec![CategoryEntry { tag_id: category, amount: amt("18.5") }]);
    }

    #[test]
    fn a_bare_exchange_pair_is_an_exchange_not_a_transfer() {
        let lines = vec![
            line(Uuid::new_v4(), SystemTag::Exchange.id(), Sign::Minus, "50"),
            line(Uuid::new_v4(), SystemTag::Exchange.id(), Sign::Plus, "45"),
        ];
        assert_eq!(classify(&lines), Mode::Exchange);
    }

    #[test]
    fn transfer_legs_classify_as_transfer() {
        let from = Uuid::new_v4();
        let to = Uuid::new_v4();
        let lines = vec![
            line(from, SystemTag::Transfer.id(), Sign::Minus, "100"),
            line(to, SystemTag::Transfer.id(), Sign::Plus, "100"),
            line(from, SystemTag::Fee.id(), Sign::Minus, "1.5"),
        ];
        assert_eq!(classify(&lines), Mode::Transfer);
        let EditableIntent::Transfer(view) = decompose(&lines).unwrap() else {
            panic!("expected a transfer view");
        };
        assert_eq!(view.fee, Some(amt("1.5")));
        assert_eq!(view.from_account_id, from);
        assert_eq!(view.to_account_id, to);
    }

    #[test]
    fn classification_is_permutation_invariant() {
        let from = Uuid::new_v4();
        let shadow = Uuid::new_v4();
        let mut lines = vec![
            line(from, SystemTag::Exchange.id(), Sign::Minus, "20"),
            line(shadow, SystemTag::Exchange.id(), Sign::Plus, "18.5"),
            line(shadow, Uuid::new_v4(), Sign::Minus, "18.5"),
        ];
        let expected = classify(&lines);
        // Rotate through all cyclic permutations.
        for _ in 0..lines.len() {
            lines.rotate_left(1);
            assert_eq!(classify(&lines), expected);
        }
    }

    #[test]
    fn sign_fallback_ignores_common_addons() {
        let account = Uuid::new_v4();
        let discount =
            line(account, SystemTag::Discount.id(), Sign::Plus, "5").as_common(None);
        let lines = vec![line(account, Uuid::new_v4(), Sign::Minus, "50"), discount];
        assert_eq!(classify(&lines), Mode::Expense);
    }

    #[test]
    fn simple_view_requires_one_entry_and_percent_addons() {
        let account = Uuid::new_v4();
        let entry = line(account, Uuid::new_v4(), Sign::Minus, "40");
        let tip = line(account, Uuid::new_v4(), Sign::Minus, "6").as_common(Some(amt("0.15")));
        let EditableIntent::Expense(view) = decompose(&[entry.clone(), tip]).unwrap() else {
            panic!("expected an expense view");
        };
        assert!(view.simple);
        assert_eq!(view.landing_account_id, None);
        assert_eq!(view.addons[0].value, AddOnValue::Percent(amt("0.15")));
        assert_eq!(view.addons[0].amount, amt("6"));

        let absolute_fee =
            line(account, SystemTag::Fee.id(), Sign::Minus, "2").as_common(None);
        let EditableIntent::Expense(view) = decompose(&[entry, absolute_fee]).unwrap() else {
            panic!("expected an expense view");
        };
        assert!(!view.simple);
    }
}
