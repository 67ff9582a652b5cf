//! End-to-end scenarios over the ledger service with the in-memory store.

use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use engine::{
    Amount, Currency, EditableIntent, EngineError, Intent, Ledger, Mode, RecordCmd, Sign, Store,
    SystemTag, Transaction, Wallet,
    ops::{
        AddOn, AddOnValue, CategoryEntry, ExchangeIntent, ExpenseExchange, ExpenseIntent,
        IncomeIntent, TransferIntent, day_summaries, period_totals, replay_balance,
    },
};
use memstore::MemStore;

fn amt(s: &str) -> Amount {
    s.parse().unwrap()
}

struct Fixture {
    ledger: Ledger<MemStore>,
    eur: Uuid,
    usd: Uuid,
    /// EUR account in the main wallet.
    checking: Uuid,
    /// EUR account in the same wallet.
    savings: Uuid,
    /// USD account in a second wallet.
    usd_account: Uuid,
    /// The wallet holding only the USD account.
    travel: Uuid,
    groceries: Uuid,
    salary: Uuid,
}

fn fixture() -> Fixture {
    let mut store = MemStore::new();
    let eur = store
        .add_currency(Currency::fiat("EUR", "€", 2).payment_default())
        .unwrap();
    let usd = store.add_currency(Currency::fiat("USD", "$", 2)).unwrap();
    let main = store.add_wallet(Wallet::new("Main").unwrap()).unwrap();
    let travel = store.add_wallet(Wallet::new("Travel").unwrap()).unwrap();
    let checking = store.open_account(main, eur, amt("1000")).unwrap();
    let savings = store.open_account(main, eur, Amount::ZERO).unwrap();
    let usd_account = store.open_account(travel, usd, amt("500")).unwrap();
    Fixture {
        ledger: Ledger::new(store),
        eur,
        usd,
        checking,
        savings,
        usd_account,
        travel,
        groceries: Uuid::new_v4(),
        salary: Uuid::new_v4(),
    }
}

fn cmd(intent: Intent) -> RecordCmd {
    RecordCmd {
        intent,
        occurred_at: Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
        note: None,
        counterparty_id: None,
    }
}

fn simple_expense(account_id: Uuid, tag_id: Uuid, amount: &str) -> Intent {
    Intent::Expense(ExpenseIntent {
        account_id,
        entries: vec![CategoryEntry {
            tag_id,
            amount: amt(amount),
        }],
        addons: Vec::new(),
        exchange: None,
    })
}

fn balance(ledger: &Ledger<MemStore>, account: Uuid) -> Amount {
    ledger.store().account(account).unwrap().balance
}

#[test]
fn a_simple_expense_is_one_minus_line() {
    let mut fx = fixture();
    let tx = fx
        .ledger
        .record(cmd(simple_expense(fx.checking, fx.groceries, "12.5")))
        .unwrap();

    assert_eq!(balance(&fx.ledger, fx.checking), amt("987.5"));
    assert_eq!(fx.ledger.mode(tx).unwrap(), Mode::Expense);

    let lines = fx.ledger.store().lines_for_transaction(tx).unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].sign, Sign::Minus);
    assert_eq!(lines[0].tag_id, fx.groceries);

    let EditableIntent::Expense(view) = fx.ledger.editable(tx).unwrap() else {
        panic!("expected an expense view");
    };
    assert!(view.simple);
    assert_eq!(view.entries[0].amount, amt("12.5"));
    assert_eq!(view.paid, None);
    assert_eq!(view.landing_account_id, None);
}

#[test]
fn an_income_reads_back_as_the_intent_it_was_entered_with() {
    let mut fx = fixture();
    let tx = fx
        .ledger
        .record(cmd(Intent::Income(IncomeIntent {
            account_id: fx.checking,
            tag_id: fx.salary,
            amount: amt("1500"),
        })))
        .unwrap();

    assert_eq!(fx.ledger.mode(tx).unwrap(), Mode::Income);
    assert_eq!(
        fx.ledger.editable(tx).unwrap(),
        EditableIntent::Income {
            account_id: fx.checking,
            tag_id: fx.salary,
            amount: amt("1500"),
        }
    );
    assert_eq!(balance(&fx.ledger, fx.checking), amt("2500"));
}

#[test]
fn a_transfer_with_fee_moves_money_and_charges_the_source() {
    let mut fx = fixture();
    let tx = fx
        .ledger
        .record(cmd(Intent::Transfer(TransferIntent {
            from_account_id: fx.checking,
            to_account_id: fx.savings,
            amount: amt("100"),
            fee: Some(amt("1.5")),
        })))
        .unwrap();

    assert_eq!(fx.ledger.mode(tx).unwrap(), Mode::Transfer);
    assert_eq!(balance(&fx.ledger, fx.checking), amt("898.5"));
    assert_eq!(balance(&fx.ledger, fx.savings), amt("100"));

    let lines = fx.ledger.store().lines_for_transaction(tx).unwrap();
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().any(|l| l.is_tagged(SystemTag::Fee)));
}

#[test]
fn an_exchange_keeps_its_two_legs_independent() {
    let mut fx = fixture();
    let tx = fx
        .ledger
        .record(cmd(Intent::Exchange(ExchangeIntent {
            from_account_id: fx.checking,
            to_account_id: fx.usd_account,
            amount_out: amt("50"),
            amount_in: amt("45"),
            fee: None,
        })))
        .unwrap();

    assert_eq!(fx.ledger.mode(tx).unwrap(), Mode::Exchange);
    assert_eq!(balance(&fx.ledger, fx.checking), amt("950"));
    assert_eq!(balance(&fx.ledger, fx.usd_account), amt("545"));

    let EditableIntent::Exchange(view) = fx.ledger.editable(tx).unwrap() else {
        panic!("expected an exchange view");
    };
    assert_eq!(view.amount_out, amt("50"));
    assert_eq!(view.amount_in, amt("45"));
    assert_ne!(view.from_rate, view.to_rate);

    // The source side is the reference currency, so the realized ratio
    // refreshed the USD rate cache.
    let cached = fx.ledger.store().latest_rate(fx.usd).unwrap();
    assert_eq!(cached, Some(amt("50").checked_div(amt("45")).unwrap()));
}

#[test]
fn a_mixed_currency_expense_reads_back_as_one_expense() {
    let mut fx = fixture();
    let category = Uuid::new_v4();
    let tx = fx
        .ledger
        .record(cmd(Intent::Expense(ExpenseIntent {
            account_id: fx.usd_account,
            entries: vec![CategoryEntry {
                tag_id: category,
                amount: amt("18.5"),
            }],
            addons: Vec::new(),
            exchange: Some(ExpenseExchange {
                paid: amt("20"),
                currency_id: fx.eur,
            }),
        })))
        .unwrap();

    // Two EXCHANGE legs plus the category line: an expense, not an exchange.
    assert_eq!(fx.ledger.mode(tx).unwrap(), Mode::Expense);
    let lines = fx.ledger.store().lines_for_transaction(tx).unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines
            .iter()
            .filter(|l| l.is_tagged(SystemTag::Exchange))
            .count(),
        2
    );

    // 20 USD left the paying account; the EUR landing account nets to zero.
    assert_eq!(balance(&fx.ledger, fx.usd_account), amt("480"));
    let landing = lines
        .iter()
        .find(|l| l.is_tagged(SystemTag::Exchange) && l.sign == Sign::Plus)
        .unwrap()
        .account_id;
    assert!(balance(&fx.ledger, landing).is_zero());

    let EditableIntent::Expense(view) = fx.ledger.editable(tx).unwrap() else {
        panic!("expected an expense view");
    };
    assert_eq!(view.account_id, fx.usd_account);
    assert_eq!(view.paid, Some(amt("20")));
    assert_eq!(view.entries[0].amount, amt("18.5"));
    assert_eq!(view.landing_account_id, Some(landing));

    // The view alone rebuilds the full intent, exchange part included: the
    // landing account's currency is the category currency.
    let category_currency = fx.ledger.store().account(landing).unwrap().currency_id;
    assert_eq!(category_currency, fx.eur);
    let rebuilt = Intent::Expense(ExpenseIntent {
        account_id: view.account_id,
        entries: view.entries.clone(),
        addons: Vec::new(),
        exchange: Some(ExpenseExchange {
            paid: view.paid.unwrap(),
            currency_id: category_currency,
        }),
    });
    fx.ledger.amend(tx, &rebuilt).unwrap();
    assert_eq!(balance(&fx.ledger, fx.usd_account), amt("480"));

    // The category side is the reference currency, so 18.5/20 became the
    // cached USD rate.
    let cached = fx.ledger.store().latest_rate(fx.usd).unwrap();
    assert_eq!(cached, Some(amt("18.5").checked_div(amt("20")).unwrap()));
}

#[test]
fn a_rejected_mixed_expense_creates_no_shadow_account() {
    let mut fx = fixture();
    // A discount swallowing the whole base drives the net to zero, which the
    // exchange part cannot represent.
    let err = fx
        .ledger
        .record(cmd(Intent::Expense(ExpenseIntent {
            account_id: fx.usd_account,
            entries: vec![CategoryEntry {
                tag_id: fx.groceries,
                amount: amt("10"),
            }],
            addons: vec![AddOn {
                tag_id: SystemTag::Discount.id(),
                value: AddOnValue::Absolute(amt("10")),
            }],
            exchange: Some(ExpenseExchange {
                paid: amt("12"),
                currency_id: fx.eur,
            }),
        })))
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { field: "amount", .. }));

    let accounts = fx.ledger.store().accounts_in_wallet(fx.travel);
    assert_eq!(accounts.len(), 1);
    assert!(!accounts[0].is_shadow);
}

#[test]
fn percentage_addons_survive_the_round_trip() {
    let mut fx = fixture();
    let tip_tag = Uuid::new_v4();
    let tx = fx
        .ledger
        .record(cmd(Intent::Expense(ExpenseIntent {
            account_id: fx.checking,
            entries: vec![CategoryEntry {
                tag_id: fx.groceries,
                amount: amt("40"),
            }],
            addons: vec![AddOn {
                tag_id: tip_tag,
                value: AddOnValue::Percent(amt("0.15")),
            }],
            exchange: None,
        })))
        .unwrap();

    assert_eq!(balance(&fx.ledger, fx.checking), amt("954"));

    let EditableIntent::Expense(view) = fx.ledger.editable(tx).unwrap() else {
        panic!("expected an expense view");
    };
    assert_eq!(view.addons.len(), 1);
    assert_eq!(view.addons[0].value, AddOnValue::Percent(amt("0.15")));
    assert_eq!(view.addons[0].amount, amt("6"));
    assert!(view.simple);
}

#[test]
fn amend_replaces_the_line_set_and_the_balance_effect() {
    let mut fx = fixture();
    let tx = fx
        .ledger
        .record(cmd(simple_expense(fx.checking, fx.groceries, "12.5")))
        .unwrap();
    assert_eq!(balance(&fx.ledger, fx.checking), amt("987.5"));

    fx.ledger
        .amend(tx, &simple_expense(fx.checking, fx.groceries, "20"))
        .unwrap();
    assert_eq!(balance(&fx.ledger, fx.checking), amt("980"));

    // Amending into a different shape also works.
    fx.ledger
        .amend(
            tx,
            &Intent::Income(IncomeIntent {
                account_id: fx.checking,
                tag_id: fx.salary,
                amount: amt("5"),
            }),
        )
        .unwrap();
    assert_eq!(fx.ledger.mode(tx).unwrap(), Mode::Income);
    assert_eq!(balance(&fx.ledger, fx.checking), amt("1005"));
}

#[test]
fn erase_reverts_all_balance_effects() {
    let mut fx = fixture();
    let tx = fx
        .ledger
        .record(cmd(Intent::Transfer(TransferIntent {
            from_account_id: fx.checking,
            to_account_id: fx.savings,
            amount: amt("100"),
            fee: Some(amt("1.5")),
        })))
        .unwrap();

    fx.ledger.erase(tx).unwrap();
    assert_eq!(balance(&fx.ledger, fx.checking), amt("1000"));
    assert!(balance(&fx.ledger, fx.savings).is_zero());
    assert!(fx.ledger.store().transaction(tx).is_err());
}

#[test]
fn initial_balance_transactions_are_read_only() {
    let mut fx = fixture();
    let from = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap();
    let opening = fx
        .ledger
        .store()
        .lines_in_range(from, to)
        .into_iter()
        .find(|p| p.line.is_tagged(SystemTag::InitialBalance))
        .unwrap();
    let tx = opening.line.transaction_id;

    assert_eq!(fx.ledger.mode(tx).unwrap(), Mode::InitialBalance);
    assert_eq!(
        fx.ledger.editable(tx).unwrap(),
        EditableIntent::ReadOnly(Mode::InitialBalance)
    );

    let err = fx
        .ledger
        .amend(tx, &simple_expense(fx.checking, fx.groceries, "1"))
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
    assert!(fx.ledger.erase(tx).is_err());
    assert_eq!(balance(&fx.ledger, fx.checking), amt("1000"));
}

#[test]
fn balances_always_equal_the_replay_of_live_lines() {
    let mut fx = fixture();
    let first = fx
        .ledger
        .record(cmd(simple_expense(fx.checking, fx.groceries, "12.5")))
        .unwrap();
    fx.ledger
        .record(cmd(Intent::Income(IncomeIntent {
            account_id: fx.checking,
            tag_id: fx.salary,
            amount: amt("1500"),
        })))
        .unwrap();
    fx.ledger
        .record(cmd(Intent::Transfer(TransferIntent {
            from_account_id: fx.checking,
            to_account_id: fx.savings,
            amount: amt("200"),
            fee: None,
        })))
        .unwrap();
    fx.ledger
        .amend(first, &simple_expense(fx.checking, fx.groceries, "30"))
        .unwrap();

    let from = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
    let to = Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap();
    for account in [fx.checking, fx.savings] {
        let lines: Vec<_> = fx
            .ledger
            .store()
            .lines_for_account_in_range(account, from, to)
            .unwrap()
            .into_iter()
            .map(|p| p.line)
            .collect();
        assert_eq!(
            balance(&fx.ledger, account),
            replay_balance(Amount::ZERO, &lines),
            "account {account}"
        );
    }
}

#[test]
fn summaries_value_lines_in_the_reference_currency() {
    let mut fx = fixture();
    let day = |d: u32| Utc.with_ymd_and_hms(2026, 3, d, 12, 0, 0).unwrap();

    fx.ledger
        .record(RecordCmd {
            intent: Intent::Income(IncomeIntent {
                account_id: fx.checking,
                tag_id: fx.salary,
                amount: amt("1500"),
            }),
            occurred_at: day(2),
            note: None,
            counterparty_id: None,
        })
        .unwrap();
    fx.ledger
        .record(RecordCmd {
            intent: simple_expense(fx.checking, fx.groceries, "42.5"),
            occurred_at: day(3),
            note: None,
            counterparty_id: None,
        })
        .unwrap();
    fx.ledger
        .record(RecordCmd {
            intent: Intent::Transfer(TransferIntent {
                from_account_id: fx.checking,
                to_account_id: fx.savings,
                amount: amt("100"),
                fee: None,
            }),
            occurred_at: day(4),
            note: None,
            counterparty_id: None,
        })
        .unwrap();

    let lines = fx.ledger.store().lines_in_range(day(1), day(6));
    let totals = period_totals(&lines).unwrap();
    assert_eq!(totals.income, amt("1500"));
    assert_eq!(totals.expense, amt("42.5"));
    assert_eq!(totals.net(), amt("1457.5"));

    // The transfer nets to zero across the two legs, so the running balance
    // still closes at income minus expense.
    let from = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let to = NaiveDate::from_ymd_opt(2026, 3, 6).unwrap();
    let summaries = day_summaries(&lines, from, to, amt("1457.5")).unwrap();
    assert_eq!(summaries.len(), 5);
    assert_eq!(summaries[0].end_balance, Amount::ZERO);
    assert_eq!(summaries[1].end_balance, amt("1500"));
    assert_eq!(summaries[2].end_balance, amt("1457.5"));
    assert!(summaries[3].net.is_zero());
    assert_eq!(summaries[4].end_balance, amt("1457.5"));
}

#[test]
fn transactions_round_trip_through_json() {
    let mut fx = fixture();
    let tip = AddOn {
        tag_id: Uuid::new_v4(),
        value: AddOnValue::Percent(amt("0.15")),
    };
    let tx = fx
        .ledger
        .record(cmd(Intent::Expense(ExpenseIntent {
            account_id: fx.checking,
            entries: vec![CategoryEntry {
                tag_id: fx.groceries,
                amount: amt("40"),
            }],
            addons: vec![tip],
            exchange: None,
        })))
        .unwrap();

    let stored = fx.ledger.store().transaction(tx).unwrap();
    let json = serde_json::to_string(&stored).unwrap();
    let decoded: Transaction = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, stored);
    // The fixed-point pair and the stored percentage survive as data.
    assert!(json.contains("pct_value"));
}
