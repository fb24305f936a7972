use crate::error::{Error, Result};
use crate::raw::Field;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Either a single value or a list of them, as written in rule files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::One(value) => std::slice::from_ref(value).iter(),
            OneOrMany::Many(values) => values.iter(),
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> OneOrMany<T> {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> OneOrMany<T> {
        OneOrMany::One(value)
    }
}

/// Field name to regex; every pair has to match.
pub type MatchSpec = IndexMap<String, String>;

/// A regex extracting a number from the message, and the commodity or
/// currency that number is in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern: String,
    pub name: String,
}

/// How to turn a raw record into a balanced transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "match", default)]
    pub matches: OneOrMany<MatchSpec>,
    pub from_account: String,
    pub to_account: OneOrMany<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Raw fields copied into the transaction properties.
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commodity: Option<Pattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Pattern>,
}

/// Rules by name, in the order they are tried.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(IndexMap<String, Rule>);

impl RuleSet {
    pub fn new() -> RuleSet {
        Default::default()
    }

    pub fn from_json(text: &str) -> Result<RuleSet> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<RuleSet> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        RuleSet::from_json(&text)
    }

    /// Appends a rule, or replaces one of the same name in place.
    pub fn insert(&mut self, name: &str, rule: Rule) {
        self.0.insert(name.to_string(), rule);
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.0.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::raw::Field;
    use crate::rules::{OneOrMany, RuleSet};

    use anyhow::{anyhow, Result};

    const RULES: &str = r#"{
        "salary": {
            "match": {"creditor_name": "acme", "message": "lohn"},
            "from_account": "Assets:Checking",
            "to_account": "Income:Salary",
            "fields": ["creditor_name"]
        },
        "groceries": {
            "match": [{"message": "aldi"}, {"message": "lidl"}],
            "from_account": "Assets:Checking",
            "to_account": ["Expenses:Groceries"],
            "labels": ["food"],
            "properties": {"Category": "common"}
        },
        "fonds": {
            "match": {"message": "depot"},
            "from_account": "Assets:Checking",
            "to_account": "Assets:Broker",
            "commodity": {"pattern": "stk ([0-9,]+)", "name": "SHR"},
            "price": {"pattern": "kurs ([0-9,]+)", "name": "EUR"}
        }
    }"#;

    #[test]
    fn rules_keep_file_order() -> Result<()> {
        let rules = RuleSet::from_json(RULES)?;
        let names: Vec<&str> = rules.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["salary", "groceries", "fonds"]);
        Ok(())
    }

    #[test]
    fn single_and_list_forms() -> Result<()> {
        let rules = RuleSet::from_json(RULES)?;
        let salary = rules.get("salary").ok_or(anyhow!("missing rule"))?;
        assert!(matches!(salary.matches, OneOrMany::One(_)));
        assert_eq!(salary.to_account.iter().collect::<Vec<_>>(), vec!["Income:Salary"]);
        assert_eq!(salary.fields, vec![Field::CreditorName]);

        let groceries = rules.get("groceries").ok_or(anyhow!("missing rule"))?;
        assert_eq!(groceries.matches.iter().count(), 2);
        assert_eq!(groceries.properties["Category"], "common");

        let fonds = rules.get("fonds").ok_or(anyhow!("missing rule"))?;
        assert_eq!(
            fonds.commodity.as_ref().map(|c| c.name.as_str()),
            Some("SHR")
        );
        Ok(())
    }

    #[test]
    fn unknown_field_is_rejected() {
        let result = RuleSet::from_json(
            r#"{"bad": {"from_account": "A", "to_account": "B", "fields": ["iban"]}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn rule_without_match_parses() -> Result<()> {
        let rules = RuleSet::from_json(r#"{"rest": {"from_account": "A", "to_account": "B"}}"#)?;
        let rest = rules.get("rest").ok_or(anyhow!("missing rule"))?;
        assert_eq!(rest.matches.iter().count(), 0);
        Ok(())
    }
}
