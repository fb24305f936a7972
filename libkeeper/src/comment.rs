use crate::error::{Error, Result};
use crate::parser::{LedgerParser, Rule};
use pest::Parser;

use std::collections::BTreeMap;

/// Labels, properties and free-text comments attached to a transaction or a
/// transfer through `;` lines.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, String>,
    pub comments: Vec<String>,
}

impl Metadata {
    /// Parses the text following the first `;`. Further `;` start new segments.
    pub fn parse(text: &str) -> Result<Metadata> {
        let mut metadata = Metadata::default();
        for segment in text.split(';') {
            metadata.extend(Metadata::parse_segment(segment)?);
        }
        Ok(metadata)
    }

    fn parse_segment(segment: &str) -> Result<Metadata> {
        let pairs = LedgerParser::parse(Rule::segment, segment)
            .map_err(|e| Error::Syntax(e.to_string()))?;

        let mut metadata = Metadata::default();
        let mut words = Vec::new();
        for token in pairs.flat_map(|pair| pair.into_inner()) {
            match token.as_rule() {
                Rule::labels => metadata
                    .labels
                    .extend(token.into_inner().map(|label| label.as_str().to_string())),
                Rule::property => {
                    let mut inner = token.into_inner();
                    let key = inner.next().ok_or_else(|| {
                        Error::Syntax(format!("property without key in `{}'", segment))
                    })?;
                    let value = inner.next().map(|v| v.as_str().trim()).unwrap_or("");
                    metadata
                        .properties
                        .insert(key.as_str().to_string(), value.to_string());
                }
                Rule::word => words.push(token.as_str()),
                _ => {}
            }
        }

        if !words.is_empty() {
            metadata.comments.push(words.join(" "));
        }

        Ok(metadata)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.properties.is_empty() && self.comments.is_empty()
    }

    pub fn extend(&mut self, other: Metadata) {
        self.labels.extend(other.labels);
        self.properties.extend(other.properties);
        self.comments.extend(other.comments);
    }

    pub fn merge_into(
        self,
        labels: &mut Vec<String>,
        properties: &mut BTreeMap<String, String>,
        comments: &mut Vec<String>,
    ) {
        labels.extend(self.labels);
        properties.extend(self.properties);
        comments.extend(self.comments);
    }
}
