//! Tags and the tag DAG.
//!
//! A [`Tag`] labels ledger lines: categories ("groceries"), add-on kinds
//! (tip, VAT) and the engine's own markers. Tags form a DAG, not a tree — a
//! user tag may sit under both EXPENSE and INCOME at once ("both" type).
//!
//! A small closed set of [`SystemTag`]s carries reserved ids with semantics
//! the engine recognizes everywhere (classification, builder output, read-only
//! transactions). Everything else is open reference data in a [`TagCatalog`].

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::normalize_name};

/// Reserved tags with engine-recognized meaning.
///
/// Their ids are fixed constants so persisted lines can be interpreted
/// without a catalog lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemTag {
    Default,
    Expense,
    Income,
    Transfer,
    Exchange,
    Fee,
    Discount,
    Archived,
    /// Marks the opening-balance transaction of an account (read-only).
    InitialBalance,
    /// Marks a manual balance correction (read-only).
    Adjustment,
}

impl SystemTag {
    pub const ALL: [SystemTag; 10] = [
        Self::Default,
        Self::Expense,
        Self::Income,
        Self::Transfer,
        Self::Exchange,
        Self::Fee,
        Self::Discount,
        Self::Archived,
        Self::InitialBalance,
        Self::Adjustment,
    ];

    /// The reserved id of this system tag.
    #[must_use]
    pub const fn id(self) -> Uuid {
        Uuid::from_u128(match self {
            Self::Default => 1,
            Self::Expense => 2,
            Self::Income => 3,
            Self::Transfer => 4,
            Self::Exchange => 5,
            Self::Fee => 6,
            Self::Discount => 7,
            Self::Archived => 8,
            Self::InitialBalance => 9,
            Self::Adjustment => 10,
        })
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Expense => "expense",
            Self::Income => "income",
            Self::Transfer => "transfer",
            Self::Exchange => "exchange",
            Self::Fee => "fee",
            Self::Discount => "discount",
            Self::Archived => "archived",
            Self::InitialBalance => "initial balance",
            Self::Adjustment => "adjustment",
        }
    }

    /// Resolves a reserved id back to its system tag.
    #[must_use]
    pub fn from_id(id: Uuid) -> Option<SystemTag> {
        Self::ALL.into_iter().find(|tag| tag.id() == id)
    }

    /// Returns `true` if `id` is one of the reserved system-tag ids.
    #[must_use]
    pub fn is_system(id: Uuid) -> bool {
        Self::from_id(id).is_some()
    }
}

/// Where a freshly minted user tag hangs in the DAG.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagParentage {
    Expense,
    Income,
    /// Under both EXPENSE and INCOME at once.
    Both,
}

/// A single tag node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub name_norm: String,
    pub parents: BTreeSet<Uuid>,
}

impl Tag {
    pub fn new(name: &str, parents: impl IntoIterator<Item = Uuid>) -> ResultEngine<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(EngineError::validation("name", "tag name must not be empty"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name: trimmed.to_string(),
            name_norm: normalize_name(trimmed),
            parents: parents.into_iter().collect(),
        })
    }
}

/// The set of tags loaded for one ledger, system tags included.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TagCatalog {
    tags: HashMap<Uuid, Tag>,
}

impl TagCatalog {
    /// Creates a catalog pre-seeded with every [`SystemTag`].
    #[must_use]
    pub fn with_system_tags() -> Self {
        let mut catalog = Self::default();
        for system in SystemTag::ALL {
            let name = system.name();
            catalog.tags.insert(
                system.id(),
                Tag {
                    id: system.id(),
                    name: name.to_string(),
                    name_norm: normalize_name(name),
                    parents: BTreeSet::new(),
                },
            );
        }
        catalog
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Tag> {
        self.tags.get(&id)
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Tag> {
        let key = normalize_name(name);
        self.tags.values().find(|tag| tag.name_norm == key)
    }

    /// Inserts an externally created tag, rejecting id and name collisions.
    pub fn insert(&mut self, tag: Tag) -> ResultEngine<()> {
        if self.tags.contains_key(&tag.id) {
            return Err(EngineError::ExistingKey(tag.id.to_string()));
        }
        if self.find_by_name(&tag.name).is_some() {
            return Err(EngineError::ExistingKey(tag.name.clone()));
        }
        self.tags.insert(tag.id, tag);
        Ok(())
    }

    /// Mints a new user tag under INCOME and/or EXPENSE.
    ///
    /// Returns the existing tag's id if the normalized name is already
    /// taken, so repeated entry of the same category name never forks tags.
    pub fn mint(&mut self, name: &str, parentage: TagParentage) -> ResultEngine<Uuid> {
        if let Some(existing) = self.find_by_name(name) {
            return Ok(existing.id);
        }
        let parents: Vec<Uuid> = match parentage {
            TagParentage::Expense => vec![SystemTag::Expense.id()],
            TagParentage::Income => vec![SystemTag::Income.id()],
            TagParentage::Both => vec![SystemTag::Expense.id(), SystemTag::Income.id()],
        };
        let tag = Tag::new(name, parents)?;
        let id = tag.id;
        self.tags.insert(id, tag);
        Ok(id)
    }

    /// Returns `true` if `ancestor` is reachable from `tag_id` through parent
    /// edges (a tag is its own ancestor).
    ///
    /// Walks the DAG with a visited set, so diamonds and (malformed) cycles
    /// terminate.
    #[must_use]
    pub fn has_ancestor(&self, tag_id: Uuid, ancestor: Uuid) -> bool {
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut stack = vec![tag_id];
        while let Some(current) = stack.pop() {
            if current == ancestor {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(tag) = self.tags.get(&current) {
                stack.extend(tag.parents.iter().copied());
            }
        }
        false
    }

    /// Returns `true` if the tag sits under EXPENSE.
    #[must_use]
    pub fn is_expense_tag(&self, tag_id: Uuid) -> bool {
        self.has_ancestor(tag_id, SystemTag::Expense.id())
    }

    /// Returns `true` if the tag sits under INCOME.
    #[must_use]
    pub fn is_income_tag(&self, tag_id: Uuid) -> bool {
        self.has_ancestor(tag_id, SystemTag::Income.id())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }
}
