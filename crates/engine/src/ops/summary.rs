//! Read-only aggregations over posted lines.
//!
//! Everything here is re-derivable from the line set at any time: the engine
//! keeps no hidden aggregate state. Amounts are valued in the reference
//! currency through each line's rate snapshot, so historical summaries stay
//! stable when the live rate cache moves.
//!
//! TRANSFER- and EXCHANGE-tagged lines move money between accounts without
//! changing net worth; they are excluded from income/expense figures but do
//! take part in per-day nets and running balances.

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{Amount, EngineError, PostedLine, ResultEngine, Sign, SystemTag};

/// Income/expense pair for one grouping key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rollup {
    pub income: Amount,
    pub expense: Amount,
}

impl Rollup {
    #[must_use]
    pub fn net(self) -> Amount {
        self.income - self.expense
    }

    fn absorb(&mut self, posted: &PostedLine) -> ResultEngine<()> {
        let value = posted.line.reference_value()?.abs();
        let slot = match posted.line.sign {
            Sign::Plus => &mut self.income,
            Sign::Minus => &mut self.expense,
        };
        *slot = slot
            .checked_add(value)
            .ok_or_else(|| EngineError::InvalidAmount("amount overflow".to_string()))?;
        Ok(())
    }
}

fn is_movement(posted: &PostedLine) -> bool {
    posted.line.is_tagged(SystemTag::Transfer) || posted.line.is_tagged(SystemTag::Exchange)
}

/// Income and expense totals for a window of posted lines.
pub fn period_totals(lines: &[PostedLine]) -> ResultEngine<Rollup> {
    let mut totals = Rollup::default();
    for posted in lines {
        if is_movement(posted) {
            continue;
        }
        totals.absorb(posted)?;
    }
    Ok(totals)
}

/// One day of a period summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub income: Amount,
    pub expense: Amount,
    /// Net over *all* lines of the day, movements included.
    pub net: Amount,
    /// Balance at the end of this day.
    pub end_balance: Amount,
}

/// Per-day summaries for `[from, to)`, with running end-of-day balances
/// derived *backward* from the known balance at the end of the period:
/// starting at `end_balance`, each day records the running value and then
/// peels its own net off before stepping to the previous day.
pub fn day_summaries(
    lines: &[PostedLine],
    from: NaiveDate,
    to: NaiveDate,
    end_balance: Amount,
) -> ResultEngine<Vec<DaySummary>> {
    if from >= to {
        return Err(EngineError::validation(
            "range",
            "from must be before to",
        ));
    }

    let mut by_day: HashMap<NaiveDate, (Rollup, Amount)> = HashMap::new();
    for posted in lines {
        let date = posted.occurred_at.date_naive();
        if date < from || date >= to {
            continue;
        }
        let (rollup, net) = by_day.entry(date).or_default();
        if !is_movement(posted) {
            rollup.absorb(posted)?;
        }
        *net = net
            .checked_add(posted.line.reference_value()?)
            .ok_or_else(|| EngineError::InvalidAmount("amount overflow".to_string()))?;
    }

    let days: Vec<NaiveDate> = from.iter_days().take_while(|day| *day < to).collect();
    let mut summaries = Vec::with_capacity(days.len());
    let mut running = end_balance;
    for date in days.iter().rev() {
        let (rollup, net) = by_day.get(date).copied().unwrap_or_default();
        summaries.push(DaySummary {
            date: *date,
            income: rollup.income,
            expense: rollup.expense,
            net,
            end_balance: running,
        });
        running -= net;
    }
    summaries.reverse();
    Ok(summaries)
}

/// Net/income/expense per tag, movements excluded.
pub fn tag_rollup(lines: &[PostedLine]) -> ResultEngine<HashMap<Uuid, Rollup>> {
    let mut rollups: HashMap<Uuid, Rollup> = HashMap::new();
    for posted in lines {
        if is_movement(posted) {
            continue;
        }
        rollups
            .entry(posted.line.tag_id)
            .or_default()
            .absorb(posted)?;
    }
    Ok(rollups)
}

/// Net/income/expense per counterparty; lines without one are skipped.
pub fn counterparty_rollup(lines: &[PostedLine]) -> ResultEngine<HashMap<Uuid, Rollup>> {
    let mut rollups: HashMap<Uuid, Rollup> = HashMap::new();
    for posted in lines {
        if is_movement(posted) {
            continue;
        }
        let Some(counterparty_id) = posted.counterparty_id else {
            continue;
        };
        rollups
            .entry(counterparty_id)
            .or_default()
            .absorb(posted)?;
    }
    Ok(rollups)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::Line;

    fn amt(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn posted(tag: Uuid, sign: Sign, amount: &str, day: u32) -> PostedLine {
        let line = Line::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            tag,
            sign,
            amt(amount),
            Amount::ONE,
        )
        .unwrap();
        PostedLine {
            line,
            occurred_at: Utc.with_ymd_and_hms(2026, 2, day, 10, 0, 0).unwrap(),
            counterparty_id: None,
        }
    }

    #[test]
    fn totals_skip_transfers_and_exchanges() {
        let lines = vec![
            posted(Uuid::new_v4(), Sign::Plus, "1000", 1),
            posted(Uuid::new_v4(), Sign::Minus, "300", 2),
            posted(SystemTag::Transfer.id(), Sign::Minus, "500", 3),
            posted(SystemTag::Exchange.id(), Sign::Plus, "500", 3),
        ];
        let totals = period_totals(&lines).unwrap();
        assert_eq!(totals.income, amt("1000"));
        assert_eq!(totals.expense, amt("300"));
        assert_eq!(totals.net(), amt("700"));
    }

    #[test]
    fn running_balance_walks_backward_from_the_period_end() {
        let lines = vec![
            posted(Uuid::new_v4(), Sign::Plus, "100", 1),
            posted(Uuid::new_v4(), Sign::Minus, "30", 2),
            posted(Uuid::new_v4(), Sign::Minus, "20", 4),
        ];
        let from = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 2, 5).unwrap();
        let summaries = day_summaries(&lines, from, to, amt("50")).unwrap();

        assert_eq!(summaries.len(), 4);
        // End-of-period balance is 50; day nets are +100, -30, 0, -20.
        assert_eq!(summaries[3].end_balance, amt("50"));
        assert_eq!(summaries[2].end_balance, amt("70"));
        assert_eq!(summaries[1].end_balance, amt("70"));
        assert_eq!(summaries[0].end_balance, amt("100"));
        // Day 3 has no lines but still gets a row.
        assert!(summaries[2].net.is_zero());
    }

    #[test]
    fn rollups_group_by_tag_and_counterparty() {
        let groceries = Uuid::new_v4();
        let shop = Uuid::new_v4();
        let mut a = posted(groceries, Sign::Minus, "30", 1);
        a.counterparty_id = Some(shop);
        let mut b = posted(groceries, Sign::Minus, "12.5", 2);
        b.counterparty_id = Some(shop);
        let other = posted(Uuid::new_v4(), Sign::Plus, "100", 3);

        let lines = vec![a, b, other];
        let by_tag = tag_rollup(&lines).unwrap();
        assert_eq!(by_tag[&groceries].expense, amt("42.5"));
        assert_eq!(by_tag.len(), 2);

        let by_counterparty = counterparty_rollup(&lines).unwrap();
        assert_eq!(by_counterparty[&shop].expense, amt("42.5"));
        assert_eq!(by_counterparty.len(), 1);
    }

    #[test]
    fn empty_ranges_are_rejected() {
        let day = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        assert!(day_summaries(&[], day, day, Amount::ZERO).is_err());
    }
}
