use crate::amount::Money;
use crate::date::DateLayout;
use crate::error::{Error, Result};
use crate::raw::{Field, RawTransaction};
use crate::rules::{Pattern, Rule, RuleSet};
use crate::transaction::{Transaction, Transfer};

use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info, trace};

/// Name given to transactions built by the fallback rule.
pub const FALLBACK: &str = "fallback";

fn compile(rule: &str, pattern: &str, anchored: bool) -> Result<Regex> {
    let source = if anchored {
        format!("^(?:{})", pattern)
    } else {
        pattern.to_string()
    };
    RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|source| Error::RegexCompileError {
            rule: rule.to_string(),
            pattern: pattern.to_string(),
            source,
        })
}

/// `Xyz` from `xYZ`.
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Last date found in the message, ISO layout first.
fn message_date(message: &str) -> Option<NaiveDate> {
    [DateLayout::Iso, DateLayout::Dotted]
        .into_iter()
        .find_map(|layout| {
            layout
                .find_all(message)
                .into_iter()
                .filter_map(|token| layout.parse(token))
                .last()
        })
}

/// First capture group, or the whole match, with decimal commas turned into points.
fn extract(regex: &Regex, message: &str) -> Option<String> {
    let captures = regex.captures(message)?;
    let found = captures.get(1).or_else(|| captures.get(0))?;
    Some(found.as_str().trim().replace(',', "."))
}

struct Extractor<'r> {
    regex: Regex,
    pattern: &'r Pattern,
}

impl<'r> Extractor<'r> {
    fn new(rule: &str, pattern: &'r Pattern) -> Result<Extractor<'r>> {
        Ok(Extractor {
            regex: compile(rule, &pattern.pattern, false)?,
            pattern,
        })
    }
}

/// A rule with its patterns compiled.
struct Compiled<'r> {
    name: &'r str,
    rule: &'r Rule,
    specs: Vec<Vec<(Field, Regex)>>,
    commodity: Option<Extractor<'r>>,
    price: Option<Extractor<'r>>,
}

impl<'r> Compiled<'r> {
    fn new(name: &'r str, rule: &'r Rule) -> Result<Compiled<'r>> {
        let specs = rule
            .matches
            .iter()
            .map(|spec| {
                spec.iter()
                    .map(|(field, pattern)| {
                        let field = field.parse::<Field>().map_err(|_| Error::UnknownRuleField {
                            rule: name.to_string(),
                            field: field.clone(),
                        })?;
                        Ok((field, compile(name, pattern, true)?))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Compiled {
            name,
            rule,
            specs,
            commodity: rule
                .commodity
                .as_ref()
                .map(|p| Extractor::new(name, p))
                .transpose()?,
            price: rule
                .price
                .as_ref()
                .map(|p| Extractor::new(name, p))
                .transpose()?,
        })
    }

    /// Any spec matches when all of its fields do. A field absent from the
    /// record never matches.
    fn matches(&self, raw: &RawTransaction) -> bool {
        self.specs.iter().any(|spec| {
            spec.iter().all(|(field, regex)| match raw.get(*field) {
                Some(value) => regex.is_match(value),
                None => false,
            })
        })
    }

    /// Commodity quantity and settlement price, if the message mentions a commodity.
    fn commodity(&self, message: &str) -> Result<Option<(Money, Money)>> {
        let commodity = match &self.commodity {
            Some(commodity) => commodity,
            None => return Ok(None),
        };
        let quantity = match extract(&commodity.regex, message) {
            Some(quantity) => quantity,
            None => return Ok(None),
        };

        let not_found = |pattern: &str| Error::CommodityPriceNotFound {
            rule: self.name.to_string(),
            pattern: pattern.to_string(),
            message: message.to_string(),
        };
        let price = self.price.as_ref().ok_or_else(|| not_found(""))?;
        let rate =
            extract(&price.regex, message).ok_or_else(|| not_found(&price.pattern.pattern))?;

        let currency = Some(price.pattern.name.as_str());
        let value =
            Money::new(&rate, currency)?.checked_mul(&Money::new(&quantity, currency)?)?;
        let amount = Money::new(&quantity, Some(commodity.pattern.name.as_str()))?;
        trace!(rule = self.name, %amount, %value, "extracted commodity");
        Ok(Some((amount, value)))
    }

    fn apply(&self, raw: &RawTransaction) -> Result<Transaction> {
        let message = raw.message();
        let valdate = raw.valdate();
        let trans_date = message_date(message).unwrap_or(valdate);

        let mut amount = raw.amount();
        if raw.get(Field::DebtorAccount) == raw.get(Field::Account) {
            amount = -&amount;
        }

        let mut transfers = vec![Transfer::new(&self.rule.from_account, amount)];
        let commodity = self.commodity(message)?;
        for account in self.rule.to_account.iter() {
            transfers.push(match &commodity {
                Some((quantity, value)) => {
                    Transfer::priced(account, quantity.clone(), value.clone())
                }
                None => Transfer::elided(account),
            });
        }

        let mut transaction = Transaction::new(Some(trans_date), valdate, self.name, transfers)?;
        transaction.labels = self.rule.labels.clone();
        transaction.properties = self.rule.properties.clone();
        for field in &self.rule.fields {
            transaction.properties.insert(
                capitalize(field.as_str()),
                capitalize(raw.get(*field).unwrap_or_default()),
            );
        }
        Ok(transaction)
    }
}

/// Outcome of a classification run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classification {
    pub transactions: Vec<Transaction>,
    pub unmatched: Vec<RawTransaction>,
}

/// Assigns raw records to rules, first matching rule wins.
pub struct Classifier<'r> {
    rules: Vec<Compiled<'r>>,
}

impl<'r> Classifier<'r> {
    /// Compiles every pattern up front so a bad rule fails before any record is touched.
    pub fn new(rules: &'r RuleSet) -> Result<Classifier<'r>> {
        let rules = rules
            .iter()
            .map(|(name, rule)| Compiled::new(name, rule))
            .collect::<Result<Vec<_>>>()?;
        Ok(Classifier { rules })
    }

    /// Name of the first rule matching the record.
    pub fn rule_for(&self, raw: &RawTransaction) -> Option<&str> {
        self.position(raw).map(|idx| self.rules[idx].name)
    }

    fn position(&self, raw: &RawTransaction) -> Option<usize> {
        self.rules.iter().position(|rule| rule.matches(raw))
    }

    pub fn classify(&self, records: Vec<RawTransaction>) -> Result<Classification> {
        let assigned: Vec<Option<usize>> =
            records.iter().map(|raw| self.position(raw)).collect();

        let mut classification = Classification::default();
        for (raw, rule) in records.into_iter().zip(assigned) {
            match rule {
                Some(idx) => {
                    let rule = &self.rules[idx];
                    debug!(rule = rule.name, valdate = %raw.valdate(), "matched record");
                    classification.transactions.push(rule.apply(&raw)?);
                }
                None => classification.unmatched.push(raw),
            }
        }

        info!(
            matched = classification.transactions.len(),
            unmatched = classification.unmatched.len(),
            "classified records"
        );
        Ok(classification)
    }

    /// Builds transactions from every record with `fallback`, ignoring its
    /// match patterns.
    pub fn render_with(
        fallback: &Rule,
        records: &[RawTransaction],
    ) -> Result<Vec<Transaction>> {
        let compiled = Compiled::new(FALLBACK, fallback)?;
        records.iter().map(|raw| compiled.apply(raw)).collect()
    }
}
