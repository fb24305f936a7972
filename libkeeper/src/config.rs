use crate::error::{Error, Result};
use crate::format::Format;
use crate::rules::{Rule, RuleSet};
use crate::writer::WriterOptions;

use serde::{Deserialize, Serialize};

use std::fs;
use std::path::Path;

/// Settings for one translation run, read from JSON.
///
/// ```json
/// {
///     "rules": { "rent": { "match": {"message": "miete"}, "from_account": "Assets:Checking", "to_account": "Expenses:Rent" } },
///     "fallback": { "from_account": "Assets:Checking", "to_account": "Expenses:Unsorted" },
///     "output": { "group_by": "Category", "prefix": "2023-" },
///     "writer": "ledger"
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rules: RuleSet,
    pub fallback: Option<Rule>,
    pub output: WriterOptions,
    pub reader: Format,
    pub writer: Format,
}

impl Config {
    pub fn from_json(text: &str) -> Result<Config> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Config::from_json(&text)
    }
}
