use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while reading, balancing, classifying or
/// writing a wallet.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid amount `{0}'")]
    InvalidAmount(String),

    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    #[error("amount overflow in {left} {op} {right}")]
    Overflow {
        left: String,
        op: &'static str,
        right: String,
    },

    #[error("transaction `{transaction}' cannot be balanced: only one transfer may be left empty")]
    TooManyOpenTransfers { transaction: String },

    #[error("transaction `{transaction}' is off by {delta} and has no empty transfer to absorb it")]
    UnbalancedTransaction { transaction: String, delta: String },

    #[error("transaction `{transaction}' mixes currencies {currencies:?}")]
    MixedCurrencies {
        transaction: String,
        currencies: Vec<String>,
    },

    #[error("unknown transfer definition on line {line} of {}", .path.display())]
    MalformedTransferLine { line: usize, path: PathBuf },

    #[error("unknown date definition on line {line} of {}", .path.display())]
    MalformedDateLine { line: usize, path: PathBuf },

    #[error("rule `{rule}' has an invalid pattern `{pattern}': {source}")]
    RegexCompileError {
        rule: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule `{rule}' matches on unknown field `{field}'")]
    UnknownRuleField { rule: String, field: String },

    #[error("rule `{rule}': pattern `{pattern}' was not found in `{message}'")]
    CommodityPriceNotFound {
        rule: String,
        pattern: String,
        message: String,
    },

    #[error("{}:{line}: {source}", .path.display())]
    Located {
        path: PathBuf,
        line: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("include cycle through {}", .0.display())]
    IncludeCycle(PathBuf),

    #[error("invalid raw record field `{field}': {reason}")]
    InvalidRawRecord { field: String, reason: String },

    #[error("unknown format `{0}'")]
    UnknownFormat(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}

impl Error {
    /// Attach a source location, leaving already located errors alone.
    pub fn at(self, path: impl Into<PathBuf>, line: usize) -> Error {
        match self {
            located @ (Error::Located { .. }
            | Error::MalformedTransferLine { .. }
            | Error::MalformedDateLine { .. }) => located,
            other => Error::Located {
                path: path.into(),
                line,
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Error {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
