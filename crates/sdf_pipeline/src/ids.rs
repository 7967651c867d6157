//! Record id extractors.
//!
//! Every extractor returns an empty string when the id is missing; ids are
//! never validated or deduplicated.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use sdf_protocol::Record;
use thiserror::Error;

static MCULE_TAG: LazyLock<Regex> = LazyLock::new(|| tag_pattern("Mcule_ID").unwrap());

pub type BoxedExtractor = Box<dyn Fn(&Record) -> String + Send + Sync>;

/// Which metadata field identifies a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSource {
    /// Value of the `<Mcule_ID>` data field
    Mcule,
    /// First whitespace-separated token of the record (the CID title line)
    Pubchem,
    /// Value of an arbitrary `> <NAME>` data field
    Tag(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown id source '{0}' (expected mcule, pubchem or tag:<NAME>)")]
pub struct UnknownIdSource(String);

impl FromStr for IdSource {
    type Err = UnknownIdSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mcule" => Ok(IdSource::Mcule),
            "pubchem" => Ok(IdSource::Pubchem),
            other => match other.strip_prefix("tag:") {
                Some(name) if !name.trim().is_empty() => Ok(IdSource::Tag(name.trim().to_string())),
                _ => Err(UnknownIdSource(s.to_string())),
            },
        }
    }
}

impl fmt::Display for IdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdSource::Mcule => write!(f, "mcule"),
            IdSource::Pubchem => write!(f, "pubchem"),
            IdSource::Tag(name) => write!(f, "tag:{}", name),
        }
    }
}

impl IdSource {
    pub fn extractor(&self) -> Result<BoxedExtractor, regex::Error> {
        let extractor: BoxedExtractor = match self {
            IdSource::Mcule => Box::new(|record: &Record| mcule_id(record.text())),
            IdSource::Pubchem => Box::new(|record: &Record| pubchem_id(record.text())),
            IdSource::Tag(name) => {
                let pattern = tag_pattern(name)?;
                Box::new(move |record: &Record| tag_value(&pattern, record.text()))
            }
        };
        Ok(extractor)
    }
}

pub fn mcule_id(text: &str) -> String {
    tag_value(&MCULE_TAG, text)
}

pub fn pubchem_id(text: &str) -> String {
    text.split_whitespace().next().unwrap_or_default().to_string()
}

/// Header line of an SDF data item: `> <NAME>` with optional extras.
fn tag_pattern(name: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?m)^>.*<{}>.*$", regex::escape(name)))
}

/// Lines after the header up to the next blank line, trimmed.
fn tag_value(header: &Regex, text: &str) -> String {
    let Some(found) = header.find(text) else {
        return String::new();
    };
    text[found.end()..]
        .lines()
        .skip(1)
        .take_while(|line| !line.trim().is_empty())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}
