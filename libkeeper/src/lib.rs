//! Libkeeper - ledger translation engine
//! ---
//!
//! Reads transactions from a plain-text ledger (or from raw bank-export records),
//! keeps them in a balanced double-entry model, assigns unclassified records to
//! accounts through an ordered set of pattern rules, and writes the result back
//! as ledger text or JSON.
//!

extern crate pest;
#[macro_use]
extern crate pest_derive;

/// Exact, currency-tagged amounts.
pub mod amount;

/// Rule based assignment of raw records to accounts.
///
/// Rules are tried in the order they are configured, the first one matching a
/// record decides its accounts. See [`Classifier`][classifier::Classifier].
pub mod classifier;

mod comment;
pub mod config;
mod date;
pub mod error;
pub mod format;

/// Our main parser entrypoints.
pub mod parser;

pub mod raw;
pub mod rules;

/// Transactions, transfers and the double-entry balancing rule.
pub mod transaction;

pub mod translate;
pub mod wallet;

/// Ledger text output.
pub mod writer;

pub use amount::Money;
pub use classifier::{Classification, Classifier};
pub use comment::Metadata;
pub use config::Config;
pub use error::{Error, Result};
pub use format::Format;
pub use parser::{parse_file, parse_str};
pub use raw::{Field, RawTransaction};
pub use rules::{Rule, RuleSet};
pub use transaction::{Transaction, Transfer};
pub use wallet::{Period, Wallet};
pub use writer::WriterOptions;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Installs a global fmt subscriber, filtered through `RUST_LOG` and
/// defaulting to `libkeeper=info`. Only the first call has an effect.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let mut filter = EnvFilter::from_default_env();
        if let Ok(directive) = "libkeeper=info".parse() {
            filter = filter.add_directive(directive);
        }

        // another subscriber may already be installed by the host application
        let _ = fmt().with_env_filter(filter).try_init();
    });
}
