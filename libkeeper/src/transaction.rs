use crate::amount::Money;
use crate::comment::Metadata;
use crate::error::{Error, Result};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::trace;

use std::collections::{BTreeMap, BTreeSet};

/// One posting of a transaction.
///
/// `amount` is the quantity moved, `price` its value in the settlement
/// currency. Both are `None` for an elided transfer, whose value is inferred
/// by [`Transaction::balance`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub account: String,
    pub amount: Option<Money>,
    pub price: Option<Money>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub comments: Vec<String>,
}

impl Transfer {
    /// A plain posting settled in its own currency.
    pub fn new(account: &str, amount: Money) -> Transfer {
        Transfer {
            account: account.to_string(),
            price: Some(amount.clone()),
            amount: Some(amount),
            ..Default::default()
        }
    }

    /// A commodity posting with a separate settlement value.
    pub fn priced(account: &str, amount: Money, price: Money) -> Transfer {
        Transfer {
            account: account.to_string(),
            amount: Some(amount),
            price: Some(price),
            ..Default::default()
        }
    }

    pub fn elided(account: &str) -> Transfer {
        Transfer {
            account: account.to_string(),
            ..Default::default()
        }
    }

    pub fn is_elided(&self) -> bool {
        self.amount.is_none()
    }

    /// Settlement value, falling back to the amount when no price was given.
    pub fn value(&self) -> Option<&Money> {
        self.price.as_ref().or(self.amount.as_ref())
    }

    pub fn absorb(&mut self, metadata: Metadata) {
        metadata.merge_into(&mut self.labels, &mut self.properties, &mut self.comments);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub trans_date: NaiveDate,
    pub book_date: NaiveDate,
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub comments: Vec<String>,
    pub transfers: Vec<Transfer>,
}

impl Transaction {
    /// Builds a transaction without checking that it balances.
    pub fn raw(
        trans_date: Option<NaiveDate>,
        book_date: NaiveDate,
        name: &str,
        transfers: Vec<Transfer>,
    ) -> Transaction {
        Transaction {
            trans_date: trans_date.unwrap_or(book_date),
            book_date,
            name: name.to_string(),
            labels: Vec::new(),
            properties: BTreeMap::new(),
            comments: Vec::new(),
            transfers,
        }
    }

    /// Builds a transaction and balances it, inferring the elided transfer.
    pub fn new(
        trans_date: Option<NaiveDate>,
        book_date: NaiveDate,
        name: &str,
        transfers: Vec<Transfer>,
    ) -> Result<Transaction> {
        let mut transaction = Transaction::raw(trans_date, book_date, name, transfers);
        transaction.balance()?;
        Ok(transaction)
    }

    pub fn absorb(&mut self, metadata: Metadata) {
        metadata.merge_into(&mut self.labels, &mut self.properties, &mut self.comments);
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        if self.trans_date == self.book_date {
            format!("{} {}", self.trans_date.format("%Y-%m-%d"), self.name)
        } else {
            format!(
                "{}={} {}",
                self.trans_date.format("%Y-%m-%d"),
                self.book_date.format("%Y-%m-%d"),
                self.name
            )
        }
    }

    /// Double-entry check: the values of all transfers must sum up to zero.
    /// At most one transfer may be elided; it receives the remainder.
    pub fn balance(&mut self) -> Result<()> {
        let elided = self.transfers.iter().filter(|t| t.is_elided()).count();
        if elided > 1 {
            return Err(Error::TooManyOpenTransfers {
                transaction: self.describe(),
            });
        }

        let values: Vec<&Money> = self
            .transfers
            .iter()
            .filter(|t| !t.is_elided())
            .filter_map(Transfer::value)
            .collect();

        let currencies: BTreeSet<Option<&str>> = values.iter().map(|m| m.currency()).collect();
        if currencies.len() > 1 {
            return Err(Error::MixedCurrencies {
                transaction: self.describe(),
                currencies: currencies
                    .into_iter()
                    .map(|c| c.unwrap_or("<none>").to_string())
                    .collect(),
            });
        }

        let currency = currencies.into_iter().next().flatten();
        let mut delta = Money::zero(currency);
        for value in values {
            delta = delta.checked_sub(value)?;
        }

        match self.transfers.iter_mut().find(|t| t.is_elided()) {
            Some(open) => {
                trace!(account = %open.account, %delta, "inferred elided transfer");
                open.amount = Some(delta.clone());
                open.price = Some(delta);
                Ok(())
            }
            None if !delta.is_zero() => Err(Error::UnbalancedTransaction {
                transaction: self.describe(),
                delta: delta.to_string(),
            }),
            None => Ok(()),
        }
    }
}
