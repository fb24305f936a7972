use crate::error::{Error, Result};
use crate::parser;
use crate::wallet::Wallet;
use crate::writer::{self, WriterOptions};

use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Group name the JSON writer emits the whole wallet under.
pub const JSON_GROUP: &str = "wallet.json";

/// Textual representations a wallet can be read from and written to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Ledger,
    Json,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Ledger => "ledger",
            Format::Json => "json",
        }
    }

    pub fn read(self, path: &Path) -> Result<Wallet> {
        match self {
            Format::Ledger => parser::parse_file(path),
            Format::Json => {
                let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
                let mut wallet: Wallet = serde_json::from_str(&text)?;
                wallet.balance()?;
                Ok(wallet)
            }
        }
    }

    /// Renders the wallet into named output groups.
    pub fn render(
        self,
        wallet: &Wallet,
        options: &WriterOptions,
    ) -> Result<BTreeMap<String, String>> {
        match self {
            Format::Ledger => writer::render(wallet, options),
            Format::Json => {
                let mut groups = BTreeMap::new();
                groups.insert(JSON_GROUP.to_string(), serde_json::to_string_pretty(wallet)?);
                Ok(groups)
            }
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Format> {
        match s.to_lowercase().as_str() {
            "ledger" => Ok(Format::Ledger),
            "json" => Ok(Format::Json),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::amount::Money;
    use crate::error::Error;
    use crate::format::{Format, JSON_GROUP};
    use crate::transaction::{Transaction, Transfer};
    use crate::wallet::Wallet;
    use crate::writer::WriterOptions;
    use chrono::NaiveDate;

    use anyhow::{anyhow, Result};
    use std::fs;

    #[test]
    fn format_names() -> Result<()> {
        assert_eq!("ledger".parse::<Format>()?, Format::Ledger);
        assert_eq!("JSON".parse::<Format>()?, Format::Json);
        assert!(matches!(
            "xml".parse::<Format>(),
            Err(Error::UnknownFormat(name)) if name == "xml"
        ));
        assert_eq!(Format::Json.to_string(), "json");
        Ok(())
    }

    #[test]
    fn json_round_trip() -> Result<()> {
        let date = NaiveDate::from_ymd_opt(2022, 12, 24).ok_or(anyhow!("invalid date"))?;
        let wallet = Wallet::build(vec![Transaction::new(
            None,
            date,
            "Presents",
            vec![
                Transfer::new("Expenses:Gifts", Money::new("80.00", Some("EUR"))?),
                Transfer::elided("Assets:Cash"),
            ],
        )?]);

        let groups = Format::Json.render(&wallet, &WriterOptions::default())?;
        assert_eq!(groups.len(), 1);
        let parsed: Wallet = serde_json::from_str(&groups[JSON_GROUP])?;
        assert_eq!(parsed, wallet);
        Ok(())
    }

    fn write_json(dir: &tempfile::TempDir, wallet: &Wallet) -> Result<std::path::PathBuf> {
        let path = dir.path().join("wallet.json");
        fs::write(&path, serde_json::to_string(wallet)?)?;
        Ok(path)
    }

    #[test]
    fn json_read_rejects_unbalanced_wallet() -> Result<()> {
        let date = NaiveDate::from_ymd_opt(2022, 12, 24).ok_or(anyhow!("invalid date"))?;
        let wallet = Wallet::build(vec![Transaction::raw(
            None,
            date,
            "Presents",
            vec![
                Transfer::new("Expenses:Gifts", Money::new("80.00", Some("EUR"))?),
                Transfer::new("Assets:Cash", Money::new("-70.00", Some("EUR"))?),
            ],
        )]);

        let dir = tempfile::tempdir()?;
        let path = write_json(&dir, &wallet)?;
        assert!(matches!(
            Format::Json.read(&path),
            Err(Error::UnbalancedTransaction { .. })
        ));
        Ok(())
    }

    #[test]
    fn json_read_infers_elided_transfer() -> Result<()> {
        let date = NaiveDate::from_ymd_opt(2022, 12, 24).ok_or(anyhow!("invalid date"))?;
        let wallet = Wallet::build(vec![Transaction::raw(
            None,
            date,
            "Presents",
            vec![
                Transfer::new("Expenses:Gifts", Money::new("80.00", Some("EUR"))?),
                Transfer::elided("Assets:Cash"),
            ],
        )]);

        let dir = tempfile::tempdir()?;
        let read = Format::Json.read(&write_json(&dir, &wallet)?)?;
        assert_eq!(
            read.transactions[0].transfers[1].amount,
            Some(Money::new("-80", Some("EUR"))?)
        );
        Ok(())
    }
}
