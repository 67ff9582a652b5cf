//! Personal multi-currency ledger engine.
//!
//! The engine records money movements (spending, income, transfers,
//! currency exchanges) as sets of signed ledger [`Line`]s, keeps per-account
//! balances consistent with those lines through exact incremental deltas,
//! and reconstructs a human-editable transaction shape from a persisted line
//! set that carries no explicit type tag.
//!
//! It is pure compute over data already fetched: persistence lives behind
//! the [`Store`] port (see the `memstore` crate for the in-memory reference
//! implementation). The main entry points are:
//!
//! - [`ops::build`]: typed intent → canonical line set
//! - [`ops::classify`] / [`ops::decompose`]: line set → shape / editable
//!   intent
//! - [`ops::balance_delta`]: the delta the store applies with each line
//!   write
//! - [`ops::period_totals`], [`ops::day_summaries`] and friends: read-only
//!   aggregations
//! - [`Ledger`]: orchestration of all of the above over a [`Store`]

pub use accounts::{Account, Wallet};
pub use budgets::{Budget, BudgetProgress};
pub use counterparties::Counterparty;
pub use currency::Currency;
pub use error::EngineError;
pub use lines::{Line, PostedLine, Sign};
pub use money::{Amount, SCALE};
pub use ops::{EditableIntent, Intent, Ledger, Mode, RecordCmd};
pub use store::Store;
pub use tags::{SystemTag, Tag, TagCatalog, TagParentage};
pub use transactions::Transaction;

mod accounts;
mod budgets;
mod counterparties;
mod currency;
mod error;
mod lines;
mod money;
pub mod ops;
mod store;
mod tags;
mod transactions;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
