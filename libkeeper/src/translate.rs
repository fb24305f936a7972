use crate::classifier::Classifier;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::raw::RawTransaction;
use crate::rules::Rule;
use crate::wallet::Wallet;
use crate::writer::{self, WriterOptions};

use tracing::{debug, info};

use std::fs;
use std::path::{Path, PathBuf};

/// File the records no rule matched are written to, after the prefix.
pub const UNMATCHED: &str = "unmatched.ledger";

/// Classifies raw records and assembles the matched ones into a wallet.
/// Records no rule matched are handed back untouched.
pub fn classify_into_wallet(
    classifier: &Classifier<'_>,
    records: Vec<RawTransaction>,
) -> Result<(Wallet, Vec<RawTransaction>)> {
    let classification = classifier.classify(records)?;
    Ok((
        Wallet::build(classification.transactions),
        classification.unmatched,
    ))
}

fn write_all(dir: &Path, files: Vec<(PathBuf, String)>) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(files.len());
    for (path, text) in files {
        fs::write(&path, text).map_err(|e| Error::io(&path, e))?;
        debug!(path = %path.display(), "wrote output");
        written.push(path);
    }
    info!(dir = %dir.display(), files = written.len(), "output written");
    Ok(written)
}

/// Renders every group of the wallet, then writes `{prefix}{group}` files into `dir`.
pub fn write_outputs(
    dir: &Path,
    format: Format,
    options: &WriterOptions,
    wallet: &Wallet,
) -> Result<Vec<PathBuf>> {
    let files = format
        .render(wallet, options)?
        .into_iter()
        .map(|(group, text)| (dir.join(format!("{}{}", options.prefix, group)), text))
        .collect();
    write_all(dir, files)
}

/// Writes `{prefix}unmatched.ledger` with the records rendered through the
/// fallback rule. Nothing is written when every record was matched.
pub fn write_unmatched(
    dir: &Path,
    options: &WriterOptions,
    fallback: &Rule,
    unmatched: &[RawTransaction],
) -> Result<Option<PathBuf>> {
    if unmatched.is_empty() {
        return Ok(None);
    }

    let transactions = Classifier::render_with(fallback, unmatched)?;
    let text = writer::render_transactions(&transactions)?;
    let path = dir.join(format!("{}{}", options.prefix, UNMATCHED));
    Ok(write_all(dir, vec![(path, text)])?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use crate::classifier::Classifier;
    use crate::format::Format;
    use crate::raw::RawTransaction;
    use crate::rules::{Rule, RuleSet};
    use crate::translate::{classify_into_wallet, write_outputs, write_unmatched};
    use crate::writer::WriterOptions;

    use anyhow::Result;
    use std::fs;

    fn record(message: &str) -> Result<RawTransaction> {
        Ok(RawTransaction::new(vec![
            ("account", "DE01"),
            ("amount", "12.00"),
            ("currency", "EUR"),
            ("valdate", "2023-05-02"),
            ("message", message),
        ])?)
    }

    #[test]
    fn writes_groups_and_unmatched() -> Result<()> {
        let rules = RuleSet::from_json(
            r#"{"food": {"match": {"message": "rewe"}, "from_account": "Assets:Checking",
                         "to_account": "Expenses:Food", "properties": {"Category": "Common"}}}"#,
        )?;
        let fallback: Rule = serde_json::from_str(
            r#"{"from_account": "Assets:Checking", "to_account": "Expenses:Unsorted"}"#,
        )?;
        let classifier = Classifier::new(&rules)?;
        let (wallet, unmatched) =
            classify_into_wallet(&classifier, vec![record("REWE 123")?, record("EDEKA")?])?;
        assert_eq!(wallet.transactions.len(), 1);
        assert_eq!(unmatched.len(), 1);

        let dir = tempfile::tempdir()?;
        let options = WriterOptions {
            prefix: "2023-".to_string(),
            ..Default::default()
        };
        let written = write_outputs(dir.path(), Format::Ledger, &options, &wallet)?;
        assert_eq!(written, vec![dir.path().join("2023-common")]);
        assert!(fs::read_to_string(&written[0])?.starts_with("2023-05-02 food\n"));

        let path = write_unmatched(dir.path(), &options, &fallback, &unmatched)?;
        assert_eq!(path, Some(dir.path().join("2023-unmatched.ledger")));
        let text = fs::read_to_string(dir.path().join("2023-unmatched.ledger"))?;
        assert!(text.contains("Expenses:Unsorted"));
        Ok(())
    }

    #[test]
    fn group_files_stay_in_output_dir() -> Result<()> {
        let rules = RuleSet::from_json(
            r#"{"food": {"match": {"message": "rewe"},
                         "from_account": "Assets:Checking", "to_account": "Expenses:Food",
                         "properties": {"Category": "../escaped"}}}"#,
        )?;
        let classifier = Classifier::new(&rules)?;
        let (wallet, _) = classify_into_wallet(&classifier, vec![record("REWE 123")?])?;

        let root = tempfile::tempdir()?;
        let dir = root.path().join("out");
        fs::create_dir(&dir)?;
        let written = write_outputs(&dir, Format::Ledger, &WriterOptions::default(), &wallet)?;

        assert_eq!(written, vec![dir.join("_escaped")]);
        assert!(!root.path().join("escaped").exists());
        assert_eq!(fs::read_dir(root.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn nothing_unmatched_writes_nothing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let fallback = Rule::default();
        let path = write_unmatched(dir.path(), &WriterOptions::default(), &fallback, &[])?;
        assert_eq!(path, None);
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }
}
