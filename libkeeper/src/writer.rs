use crate::amount::Money;
use crate::error::Result;
use crate::transaction::{Transaction, Transfer};
use crate::wallet::{Period, Wallet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use std::collections::BTreeMap;
use std::fmt::Write;

/// Group for transactions lacking the grouping property.
pub const UNGROUPED: &str = "ungrouped";
/// Group holding the `~ Monthly` / `~ Yearly` blocks.
pub const BUDGET: &str = "budget";
/// Group holding the `account` declarations.
pub const ACCOUNTS: &str = "accounts";

const INDENT: &str = "    ";
const ACCOUNT_WIDTH: usize = 38;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// Transaction property whose lower-cased value names the output group.
    pub group_by: String,
    /// Prepended to every output file name.
    pub prefix: String,
}

impl Default for WriterOptions {
    fn default() -> WriterOptions {
        WriterOptions {
            group_by: "Category".to_string(),
            prefix: String::new(),
        }
    }
}

/// Keeps a value on its own metadata line: line breaks and `;` would start
/// new lines or segments when read back.
fn one_line(text: &str) -> String {
    text.replace(|c: char| matches!(c, '\r' | '\n' | ';'), " ")
}

fn write_metadata(
    out: &mut String,
    labels: &[String],
    properties: &BTreeMap<String, String>,
    comments: &[String],
) -> Result<()> {
    for comment in comments {
        writeln!(out, "{}; {}", INDENT, one_line(comment))?;
    }
    if !labels.is_empty() {
        writeln!(out, "{}; :{}:", INDENT, one_line(&labels.join(":")))?;
    }
    for (key, value) in properties {
        writeln!(out, "{}; {}: {}", INDENT, one_line(key), one_line(value))?;
    }
    Ok(())
}

fn posting(out: &mut String, account: &str, money: &Money, scale: u32) -> Result<()> {
    write!(
        out,
        "{}{:<width$}  {:>10} {}",
        INDENT,
        account,
        money.format_magnitude(scale),
        money.currency().unwrap_or_default(),
        width = ACCOUNT_WIDTH
    )?;
    Ok(())
}

fn write_transfer(out: &mut String, transfer: &Transfer) -> Result<()> {
    match (&transfer.amount, &transfer.price) {
        (Some(amount), price) if amount.currency().is_some() => match price {
            Some(price) if price != amount => {
                posting(out, &transfer.account, amount, 4)?;
                writeln!(
                    out,
                    " @@ {} {}",
                    price.format_magnitude(4),
                    price.currency().unwrap_or_default()
                )?;
            }
            _ => {
                posting(out, &transfer.account, amount, 2)?;
                writeln!(out)?;
            }
        },
        // No amount, or a currency-less zero left by balancing.
        _ => writeln!(out, "{}{}", INDENT, transfer.account)?,
    }

    write_metadata(
        out,
        &transfer.labels,
        &transfer.properties,
        &transfer.comments,
    )
}

fn write_body(out: &mut String, transaction: &Transaction) -> Result<()> {
    write_metadata(
        out,
        &transaction.labels,
        &transaction.properties,
        &transaction.comments,
    )?;
    for transfer in &transaction.transfers {
        write_transfer(out, transfer)?;
    }
    writeln!(out)?;
    Ok(())
}

/// Renders one transaction followed by its blank separator line.
pub fn render_transaction(transaction: &Transaction) -> Result<String> {
    let mut out = String::new();
    let name = one_line(&transaction.name);
    let header = if transaction.trans_date == transaction.book_date {
        format!("{} {}", transaction.trans_date.format("%Y-%m-%d"), name)
    } else {
        format!(
            "{}={} {}",
            transaction.trans_date.format("%Y-%m-%d"),
            transaction.book_date.format("%Y-%m-%d"),
            name
        )
    };
    writeln!(out, "{}", header.trim_end())?;
    write_body(&mut out, transaction)?;
    Ok(out)
}

pub fn render_transactions(transactions: &[Transaction]) -> Result<String> {
    let mut out = String::new();
    for transaction in transactions {
        out.push_str(&render_transaction(transaction)?);
    }
    Ok(out)
}

fn render_budget(out: &mut String, period: Period, budget: &Transaction) -> Result<()> {
    writeln!(out, "~ {}", period.name())?;
    write_body(out, budget)
}

fn render_accounts(wallet: &Wallet) -> Result<String> {
    let mut out = String::new();
    for (account, category) in &wallet.account_labels {
        match category {
            Some(category) => writeln!(out, "account {};{}", account, category)?,
            None => writeln!(out, "account {}", account)?,
        }
    }
    Ok(out)
}

/// Turns a property value into a single file name component inside the
/// output directory.
fn file_component(value: &str) -> String {
    let name: String = value
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match name.trim_start_matches('.') {
        "" => UNGROUPED.to_string(),
        name => name.to_string(),
    }
}

/// Group a transaction is written to.
pub fn group_of(transaction: &Transaction, options: &WriterOptions) -> String {
    transaction
        .properties
        .get(&options.group_by)
        .map(|value| file_component(value))
        .unwrap_or_else(|| UNGROUPED.to_string())
}

/// Renders a whole wallet into named groups, one output file each.
/// Nothing is written to disk here.
pub fn render(wallet: &Wallet, options: &WriterOptions) -> Result<BTreeMap<String, String>> {
    let mut groups: BTreeMap<String, String> = BTreeMap::new();

    if !wallet.account_labels.is_empty() {
        groups.insert(ACCOUNTS.to_string(), render_accounts(wallet)?);
    }

    let mut budgets = String::new();
    for period in [Period::Monthly, Period::Yearly] {
        if let Some(budget) = wallet.budget(period) {
            render_budget(&mut budgets, period, budget)?;
        }
    }
    if !budgets.is_empty() {
        groups.insert(BUDGET.to_string(), budgets);
    }

    for transaction in &wallet.transactions {
        let text = render_transaction(transaction)?;
        groups
            .entry(group_of(transaction, options))
            .or_default()
            .push_str(&text);
    }

    debug!(groups = groups.len(), "rendered wallet");
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use crate::amount::Money;
    use crate::parser::parse_str;
    use crate::transaction::{Transaction, Transfer};
    use crate::wallet::{Period, Wallet};
    use crate::writer::{
        group_of, render, render_transaction, render_transactions, WriterOptions,
    };
    use chrono::NaiveDate;

    use anyhow::{anyhow, Result};
    use std::path::Path;

    fn day(d: u32) -> Result<NaiveDate> {
        NaiveDate::from_ymd_opt(2021, 4, d).ok_or(anyhow!("invalid date"))
    }

    fn rent() -> Result<Transaction> {
        let mut transfer = Transfer::new("Expenses:Rent", Money::new("650", Some("EUR"))?);
        transfer.comments.push("April".to_string());
        let mut transaction = Transaction::new(
            Some(day(1)?),
            day(3)?,
            "Rent",
            vec![transfer, Transfer::elided("Assets:Checking")],
        )?;
        transaction.labels = vec!["home".to_string(), "fixed".to_string()];
        transaction
            .properties
            .insert("Category".to_string(), "Living".to_string());
        Ok(transaction)
    }

    #[test]
    fn render_plain_transaction() -> Result<()> {
        let text = render_transaction(&rent()?)?;
        let expected = format!(
            "2021-04-01=2021-04-03 Rent\n    ; :home:fixed:\n    ; Category: Living\n    {:<38}  {:>10} EUR\n    ; April\n    {:<38}  {:>10} EUR\n\n",
            "Expenses:Rent", "650.00", "Assets:Checking", "-650.00"
        );
        assert_eq!(text, expected);
        Ok(())
    }

    #[test]
    fn render_commodity_transfer() -> Result<()> {
        let transaction = Transaction::new(
            None,
            day(2)?,
            "Buy fonds",
            vec![
                Transfer::priced(
                    "Assets:Broker",
                    Money::new("2", Some("SHR"))?,
                    Money::new("300.5", Some("EUR"))?,
                ),
                Transfer::elided("Assets:Checking"),
            ],
        )?;
        let text = render_transaction(&transaction)?;
        assert!(text.starts_with("2021-04-02 Buy fonds\n"));
        assert!(text.contains(&format!(
            "    {:<38}  {:>10} SHR @@ 300.5000 EUR\n",
            "Assets:Broker", "2.0000"
        )));
        assert!(text.contains(&format!("    {:<38}  {:>10} EUR\n", "Assets:Checking", "-300.50")));
        Ok(())
    }

    #[test]
    fn long_account_keeps_two_spaces() -> Result<()> {
        let account = "Expenses:Household:Kitchen:Appliances:Dishwasher";
        let transaction = Transaction::new(
            None,
            day(2)?,
            "Dishwasher",
            vec![
                Transfer::new(account, Money::new("499.999", Some("EUR"))?),
                Transfer::elided("Assets:Checking"),
            ],
        )?;
        let text = render_transaction(&transaction)?;
        assert!(text.contains(&format!("{}     499.999 EUR", account)));
        Ok(())
    }

    #[test]
    fn currency_less_zero_is_written_elided() -> Result<()> {
        let transaction = Transaction::new(
            None,
            day(2)?,
            "Placeholder",
            vec![Transfer::elided("Equity:Opening")],
        )?;
        assert_eq!(
            render_transaction(&transaction)?,
            "2021-04-02 Placeholder\n    Equity:Opening\n\n"
        );
        Ok(())
    }

    #[test]
    fn group_by_property() -> Result<()> {
        let mut other = rent()?;
        other.properties.clear();
        let mut shouting = rent()?;
        shouting
            .properties
            .insert("Category".to_string(), "LIVING".to_string());

        let wallet = Wallet::build(vec![rent()?, other.clone(), shouting]);
        let groups = render(&wallet, &WriterOptions::default())?;

        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["living", "ungrouped"]);
        assert_eq!(groups["ungrouped"], render_transactions(&[other])?);
        assert_eq!(groups["living"].matches("2021-04-01=2021-04-03 Rent").count(), 2);
        Ok(())
    }

    #[test]
    fn custom_group_property() -> Result<()> {
        let mut transaction = rent()?;
        transaction
            .properties
            .insert("Owner".to_string(), "Alice".to_string());
        let options = WriterOptions {
            group_by: "Owner".to_string(),
            prefix: "2021-".to_string(),
        };
        let groups = render(&Wallet::build(vec![transaction]), &options)?;
        assert!(groups.contains_key("alice"));
        Ok(())
    }

    #[test]
    fn budgets_and_accounts_have_their_own_groups() -> Result<()> {
        let mut wallet = Wallet::new();
        wallet
            .account_labels
            .insert("Assets:Checking".to_string(), Some("Bank".to_string()));
        wallet.account_labels.insert("Expenses:Food".to_string(), None);
        let budget = Transaction::new(
            Some(Period::Monthly.date()),
            Period::Monthly.date(),
            Period::Monthly.name(),
            vec![
                Transfer::new("Expenses:Food", Money::new("300", Some("EUR"))?),
                Transfer::elided("Assets:Checking"),
            ],
        )?;
        wallet.set_budget(Period::Monthly, budget);

        let groups = render(&wallet, &WriterOptions::default())?;
        assert_eq!(
            groups["accounts"],
            "account Assets:Checking;Bank\naccount Expenses:Food\n"
        );
        assert!(groups["budget"].starts_with("~ Monthly\n    Expenses:Food"));
        assert!(!groups.contains_key("ungrouped"));
        Ok(())
    }

    #[test]
    fn group_names_stay_inside_output_dir() -> Result<()> {
        let options = WriterOptions::default();
        let mut transaction = rent()?;
        for (category, group) in [
            ("../escaped", "_escaped"),
            ("Bank/Fees", "bank_fees"),
            ("..\\..\\windows", "_.._windows"),
            ("..", "ungrouped"),
            (".hidden", "hidden"),
        ] {
            transaction
                .properties
                .insert("Category".to_string(), category.to_string());
            assert_eq!(group_of(&transaction, &options), group, "{}", category);
        }
        Ok(())
    }

    #[test]
    fn multi_line_values_stay_on_their_line() -> Result<()> {
        let mut transaction = rent()?;
        transaction.comments.push("paid;twice\r\nonce refunded".to_string());
        transaction.properties.insert(
            "Message".to_string(),
            "REWE SAGT DANKE\n2023-05-01 FILIALE 123".to_string(),
        );

        let text = render_transaction(&transaction)?;
        let parsed = parse_str(&text, Path::new("roundtrip.ledger"))?;

        assert_eq!(parsed.transactions.len(), 1);
        let read = &parsed.transactions[0];
        assert_eq!(read.name, "Rent");
        assert_eq!(read.transfers.len(), 2);
        assert_eq!(read.comments, vec!["paid twice once refunded"]);
        assert_eq!(
            read.properties["Message"],
            "REWE SAGT DANKE 2023-05-01 FILIALE 123"
        );
        Ok(())
    }

    #[test]
    fn written_text_parses_back() -> Result<()> {
        let mut wallet = Wallet::build(vec![rent()?]);
        wallet
            .account_labels
            .insert("Assets:Checking".to_string(), Some("Bank".to_string()));

        let text: String = render(&wallet, &WriterOptions::default())?
            .into_values()
            .collect();
        let parsed = parse_str(&text, Path::new("roundtrip.ledger"))?;
        assert_eq!(parsed, wallet);
        Ok(())
    }
}
