use crate::error::Result;
use crate::transaction::Transaction;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, BTreeSet};

/// Period of a budget transaction (`~ Monthly` / `~ Yearly`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    Monthly,
    Yearly,
}

impl Period {
    pub fn name(self) -> &'static str {
        match self {
            Period::Monthly => "Monthly",
            Period::Yearly => "Yearly",
        }
    }

    /// Budgets carry no dates of their own; they are pinned to the epoch.
    pub fn date(self) -> NaiveDate {
        NaiveDate::default()
    }
}

/// All transactions of a journal together with account categories and budgets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub account_labels: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub budget_monthly: Option<Transaction>,
    #[serde(default)]
    pub budget_yearly: Option<Transaction>,
}

impl Wallet {
    pub fn new() -> Wallet {
        Default::default()
    }

    pub fn build(transactions: Vec<Transaction>) -> Wallet {
        Wallet {
            transactions,
            ..Default::default()
        }
    }

    /// Declared accounts, or every account used by a transfer when none are declared.
    pub fn accounts(&self) -> Vec<String> {
        if !self.account_labels.is_empty() {
            return self.account_labels.keys().cloned().collect();
        }

        self.transactions
            .iter()
            .flat_map(|t| t.transfers.iter().map(|tt| tt.account.as_str()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn time_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.transactions.iter().map(|t| t.trans_date).min()?;
        let last = self.transactions.iter().map(|t| t.trans_date).max()?;
        Some((first, last))
    }

    pub fn budget(&self, period: Period) -> Option<&Transaction> {
        match period {
            Period::Monthly => self.budget_monthly.as_ref(),
            Period::Yearly => self.budget_yearly.as_ref(),
        }
    }

    /// Sets a budget unless one is already defined. Returns whether it was set.
    pub fn set_budget(&mut self, period: Period, budget: Transaction) -> bool {
        let slot = match period {
            Period::Monthly => &mut self.budget_monthly,
            Period::Yearly => &mut self.budget_yearly,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(budget);
        true
    }

    /// Balances every transaction and both budgets, e.g. after reading a
    /// wallet that was not built through the parser.
    pub fn balance(&mut self) -> Result<()> {
        self.transactions
            .iter_mut()
            .chain(self.budget_monthly.iter_mut())
            .chain(self.budget_yearly.iter_mut())
            .try_for_each(Transaction::balance)
    }

    /// Appends everything read from another journal, e.g. an included file.
    pub fn merge(&mut self, other: Wallet) {
        self.transactions.extend(other.transactions);
        self.account_labels.extend(other.account_labels);
        if let Some(budget) = other.budget_monthly {
            self.set_budget(Period::Monthly, budget);
        }
        if let Some(budget) = other.budget_yearly {
            self.set_budget(Period::Yearly, budget);
        }
    }
}
