use std::fmt;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

static ACCESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(GCA|GCF)_\d+\.\d+").unwrap());

/// Which sylph abundance column feeds the Krona chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum AbundanceColumn {
    #[default]
    #[serde(rename = "tax")]
    #[value(name = "tax")]
    Taxonomic,
    #[serde(rename = "seq")]
    #[value(name = "seq")]
    Sequence,
}

impl AbundanceColumn {
    pub fn column_name(&self) -> &'static str {
        match self {
            AbundanceColumn::Taxonomic => "Taxonomic_abundance",
            AbundanceColumn::Sequence => "Sequence_abundance",
        }
    }
}

impl fmt::Display for AbundanceColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbundanceColumn::Taxonomic => write!(f, "tax"),
            AbundanceColumn::Sequence => write!(f, "seq"),
        }
    }
}

/// Versioned assembly accession such as `GCF_000005845.2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Accession(String);

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pulls the first `GCA_`/`GCF_` accession (with version) out of a genome path.
pub fn extract_accession(genome_file: &str) -> Option<Accession> {
    ACCESSION_RE
        .find(genome_file)
        .map(|found| Accession(found.as_str().to_string()))
}

pub fn safe_file_name(value: &str) -> String {
    value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
