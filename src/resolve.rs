use serde::Serialize;
use tracing::debug;

use crate::domain::{AbundanceColumn, extract_accession};
use crate::error::KronaError;
use crate::fallback::fallback_from_contig;
use crate::profile::ProfileRow;
use crate::taxonomy::{TaxonomyIndex, krona_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathSource {
    Taxonomy,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    pub sample: String,
    pub path: String,
    pub abundance: f64,
    pub source: PathSource,
}

pub struct RecordResolver<'a> {
    index: &'a TaxonomyIndex,
    column: AbundanceColumn,
}

impl<'a> RecordResolver<'a> {
    pub fn new(index: &'a TaxonomyIndex, column: AbundanceColumn) -> Self {
        Self { index, column }
    }

    pub fn resolve(&self, row: &ProfileRow) -> Result<ResolvedRecord, KronaError> {
        let abundance = parse_abundance(row, self.column)?;
        let accession = extract_accession(&row.genome_file);
        let lineage = self.index.lookup(accession.as_ref().map(|acc| acc.as_str()));

        let (path, source) = match krona_path(lineage) {
            Some(path) => (path, PathSource::Taxonomy),
            None => {
                debug!(
                    line = row.line,
                    accession = accession.as_ref().map(|acc| acc.as_str()),
                    "no GTDB entry, deriving path from contig name"
                );
                (fallback_from_contig(&row.contig_name), PathSource::Fallback)
            }
        };

        Ok(ResolvedRecord {
            sample: row.sample.clone(),
            path,
            abundance,
            source,
        })
    }

    pub fn resolve_all(&self, rows: &[ProfileRow]) -> Result<Vec<ResolvedRecord>, KronaError> {
        rows.iter().map(|row| self.resolve(row)).collect()
    }
}

fn parse_abundance(row: &ProfileRow, column: AbundanceColumn) -> Result<f64, KronaError> {
    let raw = row.abundance.trim();
    if raw.is_empty() {
        return Err(KronaError::MissingValue {
            line: row.line,
            column: column.column_name().to_string(),
        });
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(KronaError::InvalidAbundance {
            line: row.line,
            column: column.column_name().to_string(),
            value: row.abundance.clone(),
        }),
    }
}
