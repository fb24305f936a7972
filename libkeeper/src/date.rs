use chrono::NaiveDate;
use regex::Regex;

use std::sync::OnceLock;

/// Date layouts recognized in free text.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DateLayout {
    /// `2021-04-01`
    Iso,
    /// `01.04.2021`
    Dotted,
}

fn iso_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("iso date regex"))
}

fn dotted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]{2}\.[0-9]{2}\.[0-9]{4}").expect("dotted date regex"))
}

impl DateLayout {
    fn regex(self) -> &'static Regex {
        match self {
            DateLayout::Iso => iso_re(),
            DateLayout::Dotted => dotted_re(),
        }
    }

    fn format(self) -> &'static str {
        match self {
            DateLayout::Iso => "%Y-%m-%d",
            DateLayout::Dotted => "%d.%m.%Y",
        }
    }

    /// All non-overlapping date-shaped tokens, left to right.
    pub fn find_all(self, text: &str) -> Vec<&str> {
        self.regex().find_iter(text).map(|m| m.as_str()).collect()
    }

    pub fn parse(self, token: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(token, self.format()).ok()
    }
}
