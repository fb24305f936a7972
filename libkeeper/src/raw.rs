use crate::amount::Money;
use crate::date::DateLayout;
use crate::error::{Error, Result};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Keys a bank-export record may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Account,
    Institution,
    Status,
    Valdate,
    Addinfo,
    CreditorName,
    CreditorAccount,
    DebtorName,
    DebtorAccount,
    Amount,
    Currency,
    Message,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::Account,
        Field::Institution,
        Field::Status,
        Field::Valdate,
        Field::Addinfo,
        Field::CreditorName,
        Field::CreditorAccount,
        Field::DebtorName,
        Field::DebtorAccount,
        Field::Amount,
        Field::Currency,
        Field::Message,
    ];

    const REQUIRED: [Field; 4] = [Field::Account, Field::Amount, Field::Currency, Field::Valdate];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Account => "account",
            Field::Institution => "institution",
            Field::Status => "status",
            Field::Valdate => "valdate",
            Field::Addinfo => "addinfo",
            Field::CreditorName => "creditor_name",
            Field::CreditorAccount => "creditor_account",
            Field::DebtorName => "debtor_name",
            Field::DebtorAccount => "debtor_account",
            Field::Amount => "amount",
            Field::Currency => "currency",
            Field::Message => "message",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Field> {
        Field::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| Error::InvalidRawRecord {
                field: s.to_string(),
                reason: "unknown field".to_string(),
            })
    }
}

/// An unassigned record as emitted by a bank-export reader.
///
/// Construction checks that the required fields are present, that `amount`
/// is a decimal and that `valdate` is a `YYYY-MM-DD` date, so the classifier
/// can rely on them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RawTransaction {
    properties: BTreeMap<Field, String>,
    #[serde(skip)]
    valdate: NaiveDate,
    #[serde(skip)]
    amount: Decimal,
}

impl RawTransaction {
    pub fn new<I, K, V>(properties: I) -> Result<RawTransaction>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let properties = properties
            .into_iter()
            .map(|(key, value)| Ok((key.as_ref().parse::<Field>()?, value.into())))
            .collect::<Result<BTreeMap<Field, String>>>()?;

        if let Some(missing) = Field::REQUIRED
            .into_iter()
            .find(|field| !properties.contains_key(field))
        {
            return Err(Error::InvalidRawRecord {
                field: missing.to_string(),
                reason: "required field is missing".to_string(),
            });
        }

        let invalid = |field: Field, reason: &str| Error::InvalidRawRecord {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        let amount = Decimal::from_str_exact(properties[&Field::Amount].trim())
            .map_err(|_| invalid(Field::Amount, "not a decimal number"))?;
        let valdate = DateLayout::Iso
            .parse(properties[&Field::Valdate].trim())
            .ok_or_else(|| invalid(Field::Valdate, "not a YYYY-MM-DD date"))?;

        Ok(RawTransaction {
            properties,
            valdate,
            amount,
        })
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.properties.get(&field).map(String::as_str)
    }

    pub fn properties(&self) -> impl Iterator<Item = (Field, &str)> {
        self.properties.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn valdate(&self) -> NaiveDate {
        self.valdate
    }

    /// `amount` in `currency`, as booked on the statement account.
    pub fn amount(&self) -> Money {
        Money::from_decimal(self.amount, self.get(Field::Currency))
    }

    pub fn message(&self) -> &str {
        self.get(Field::Message).unwrap_or_default()
    }
}

impl<'de> Deserialize<'de> for RawTransaction {
    fn deserialize<D>(deserializer: D) -> std::result::Result<RawTransaction, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Bag {
            properties: BTreeMap<String, String>,
        }

        let bag = Bag::deserialize(deserializer)?;
        RawTransaction::new(bag.properties).map_err(serde::de::Error::custom)
    }
}
