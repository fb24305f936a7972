use crate::amount::Money;
use crate::comment::Metadata;
use crate::date::DateLayout;
use crate::error::{Error, Result};
use crate::transaction::{Transaction, Transfer};
use crate::wallet::{Period, Wallet};

use chrono::NaiveDate;
use pest::Parser;
use tracing::{debug, trace, warn};

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[grammar = "ledger.pest"]
pub struct LedgerParser;

/// Reads a ledger file, following its `include` directives.
pub fn parse_file(path: &Path) -> Result<Wallet> {
    Loader::default().load(path)
}

/// Parses ledger text. `origin` names the source in errors and anchors
/// relative `include` paths.
pub fn parse_str(input: &str, origin: &Path) -> Result<Wallet> {
    let mut loader = Loader::default();
    if let Ok(key) = fs::canonicalize(origin) {
        loader.stack.push(key);
    }
    loader.parse(input, origin)
}

/// Tracks the chain of files being read to reject include cycles.
#[derive(Default)]
struct Loader {
    stack: Vec<PathBuf>,
}

impl Loader {
    fn load(&mut self, path: &Path) -> Result<Wallet> {
        let key = fs::canonicalize(path).map_err(|e| Error::io(path, e))?;
        if self.stack.contains(&key) {
            return Err(Error::IncludeCycle(path.to_path_buf()));
        }

        let input = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        debug!(path = %path.display(), "reading ledger");

        self.stack.push(key);
        let wallet = self.parse(&input, path);
        self.stack.pop();
        wallet
    }

    fn parse(&mut self, input: &str, path: &Path) -> Result<Wallet> {
        let mut state = ParserState::new(path);
        for (idx, line) in input.lines().enumerate() {
            state.step(line, idx + 1, self)?;
        }
        state.finish()
    }
}

/// One physical line, classified before it is fed to the state machine.
#[derive(Debug, PartialEq)]
enum Line<'l> {
    Blank,
    Include(&'l str),
    Account(&'l str, Option<&'l str>),
    Budget(Period),
    Header(&'l str),
    Comment(&'l str),
    Entry(&'l str),
}

impl<'l> Line<'l> {
    fn classify(line: &'l str) -> Line<'l> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Line::Blank;
        }

        if let Some(comment) = trimmed.strip_prefix(';') {
            return Line::Comment(comment);
        }

        if !line.starts_with(char::is_whitespace) {
            if let Some(path) = line.strip_prefix("include ") {
                return Line::Include(path.trim());
            }

            if let Some(declaration) = line.strip_prefix("account ") {
                return match declaration.split_once(';') {
                    Some((name, category)) => {
                        let category = category.trim();
                        Line::Account(name.trim(), (!category.is_empty()).then_some(category))
                    }
                    None => Line::Account(declaration.trim(), None),
                };
            }

            let mut tokens = trimmed.split_whitespace();
            if tokens.next() == Some("~") {
                match (tokens.next(), tokens.next()) {
                    (Some("Monthly"), None) => return Line::Budget(Period::Monthly),
                    (Some("Yearly"), None) => return Line::Budget(Period::Yearly),
                    _ => {}
                }
            }

            if !DateLayout::Iso.find_all(line).is_empty() {
                return Line::Header(trimmed);
            }
        }

        Line::Entry(trimmed)
    }
}

#[derive(Debug, PartialEq)]
struct Header {
    trans_date: NaiveDate,
    book_date: NaiveDate,
    name: String,
}

impl Header {
    fn parse(text: &str, line: usize, path: &Path) -> Result<Header> {
        let malformed = || Error::MalformedDateLine {
            line,
            path: path.to_path_buf(),
        };

        if DateLayout::Iso.find_all(text).len() > 2 {
            return Err(malformed());
        }

        let pairs = LedgerParser::parse(Rule::header, text).map_err(|_| malformed())?;
        let mut dates = Vec::new();
        let mut name = "";
        for token in pairs.flat_map(|pair| pair.into_inner()) {
            match token.as_rule() {
                Rule::date => {
                    let date = DateLayout::Iso
                        .parse(token.as_str())
                        .ok_or_else(malformed)?;
                    dates.push(date)
                }
                Rule::name => name = token.as_str().trim(),
                _ => {}
            }
        }

        match dates.as_slice() {
            [date] => Ok(Header {
                trans_date: *date,
                book_date: *date,
                name: name.to_string(),
            }),
            [trans_date, book_date] => Ok(Header {
                trans_date: *trans_date,
                book_date: *book_date,
                name: name.to_string(),
            }),
            _ => Err(malformed()),
        }
    }
}

/// Accumulator for the transaction or budget being read.
#[derive(Debug, Default)]
struct Scope {
    metadata: Metadata,
    transfers: Vec<Transfer>,
    open: Option<Transfer>,
}

impl Scope {
    fn annotate(&mut self, metadata: Metadata) {
        match &mut self.open {
            Some(transfer) => transfer.absorb(metadata),
            None => self.metadata.extend(metadata),
        }
    }

    fn push(&mut self, transfer: Transfer) {
        if let Some(previous) = self.open.replace(transfer) {
            self.transfers.push(previous);
        }
    }

    fn into_transaction(
        mut self,
        trans_date: NaiveDate,
        book_date: NaiveDate,
        name: &str,
    ) -> Transaction {
        if let Some(last) = self.open.take() {
            self.transfers.push(last);
        }
        let mut transaction = Transaction::raw(Some(trans_date), book_date, name, self.transfers);
        transaction.absorb(self.metadata);
        transaction
    }
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    InTransaction(Header, Scope),
    InMonthlyBudget(Scope),
    InYearlyBudget(Scope),
}

/// Line-by-line state of one file being parsed.
struct ParserState<'p> {
    path: &'p Path,
    line: usize,
    state: State,
    wallet: Wallet,
}

impl<'p> ParserState<'p> {
    fn new(path: &'p Path) -> ParserState<'p> {
        ParserState {
            path,
            line: 0,
            state: State::Idle,
            wallet: Wallet::new(),
        }
    }

    fn step(&mut self, text: &str, line: usize, loader: &mut Loader) -> Result<()> {
        self.line = line;
        self.consume(Line::classify(text), loader)
            .map_err(|e| e.at(self.path, line))
    }

    fn consume(&mut self, line: Line<'_>, loader: &mut Loader) -> Result<()> {
        match line {
            Line::Blank => self.close(),
            Line::Include(target) => {
                self.close()?;
                let base = self.path.parent().unwrap_or_else(|| Path::new(""));
                let included = loader.load(&base.join(target))?;
                debug!(
                    from = %self.path.display(),
                    include = target,
                    transactions = included.transactions.len(),
                    "merged include"
                );
                self.wallet.merge(included);
                Ok(())
            }
            Line::Account(name, category) => {
                self.wallet
                    .account_labels
                    .insert(name.to_string(), category.map(str::to_string));
                Ok(())
            }
            Line::Budget(period) => {
                self.close()?;
                self.state = match period {
                    Period::Monthly => State::InMonthlyBudget(Scope::default()),
                    Period::Yearly => State::InYearlyBudget(Scope::default()),
                };
                Ok(())
            }
            Line::Header(text) => {
                let header = Header::parse(text, self.line, self.path)?;
                self.close()?;
                self.state = State::InTransaction(header, Scope::default());
                Ok(())
            }
            Line::Comment(text) => {
                let line = self.line;
                match self.scope() {
                    Some(scope) => scope.annotate(Metadata::parse(text)?),
                    None => trace!(line, "comment outside of a transaction"),
                }
                Ok(())
            }
            Line::Entry(text) => {
                let (line, path) = (self.line, self.path);
                match self.scope() {
                    Some(scope) => scope.push(parse_transfer(text, line, path)?),
                    None => trace!(line, "skipping line outside of a transaction"),
                }
                Ok(())
            }
        }
    }

    fn scope(&mut self) -> Option<&mut Scope> {
        match &mut self.state {
            State::Idle => None,
            State::InTransaction(_, scope)
            | State::InMonthlyBudget(scope)
            | State::InYearlyBudget(scope) => Some(scope),
        }
    }

    /// Builds and balances whatever scope is open, then returns to idle.
    fn close(&mut self) -> Result<()> {
        match std::mem::take(&mut self.state) {
            State::Idle => Ok(()),
            State::InTransaction(header, scope) => {
                let mut transaction =
                    scope.into_transaction(header.trans_date, header.book_date, &header.name);
                transaction.balance()?;
                self.wallet.transactions.push(transaction);
                Ok(())
            }
            State::InMonthlyBudget(scope) => self.close_budget(Period::Monthly, scope),
            State::InYearlyBudget(scope) => self.close_budget(Period::Yearly, scope),
        }
    }

    fn close_budget(&mut self, period: Period, scope: Scope) -> Result<()> {
        let mut budget = scope.into_transaction(period.date(), period.date(), period.name());
        budget.balance()?;
        if !self.wallet.set_budget(period, budget) {
            warn!(
                path = %self.path.display(),
                line = self.line,
                "{} budget already defined, keeping the first one",
                period.name()
            );
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Wallet> {
        let (path, line) = (self.path, self.line);
        self.close().map_err(|e| e.at(path, line))?;
        Ok(self.wallet)
    }
}

/// Splits off the account name, which ends at the first double space or tab.
fn split_account(entry: &str) -> (&str, &str) {
    let end = [entry.find("  "), entry.find('\t')]
        .into_iter()
        .flatten()
        .min();
    match end {
        Some(idx) => (entry[..idx].trim_end(), &entry[idx..]),
        None => (entry, ""),
    }
}

/// Parses a transfer line such as `Assets:Broker  2.0000 SHR @ 150.0000 EUR ; :fonds:`.
pub fn parse_transfer(text: &str, line: usize, path: &Path) -> Result<Transfer> {
    let (entry, metadata) = match text.split_once(';') {
        Some((entry, comment)) => (entry, Some(Metadata::parse(comment)?)),
        None => (text, None),
    };

    let (account, rest) = split_account(entry.trim());
    let fields: Vec<&str> = rest.split_whitespace().collect();

    let mut transfer = match fields[..] {
        [] => Transfer::elided(account),
        [quantity, currency] => Transfer::new(account, Money::new(quantity, Some(currency))?),
        [quantity, currency, op, rate, settlement] => {
            let amount = Money::new(quantity, Some(currency))?;
            let price = match op {
                "@" => Money::new(quantity, Some(settlement))?
                    .checked_mul(&Money::new(rate, Some(settlement))?)?,
                "@@" => Money::new(rate, Some(settlement))?,
                _ => {
                    return Err(Error::MalformedTransferLine {
                        line,
                        path: path.to_path_buf(),
                    })
                }
            };
            Transfer::priced(account, amount, price)
        }
        _ => {
            return Err(Error::MalformedTransferLine {
                line,
                path: path.to_path_buf(),
            })
        }
    };

    if let Some(metadata) = metadata {
        transfer.absorb(metadata);
    }

    Ok(transfer)
}
