use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::str::FromStr;

use tracing::info;

use crate::domain::AbundanceColumn;
use crate::error::KronaError;
use crate::fs_util::{decode_reader, open_text};

pub const SAMPLE_COLUMN: &str = "Sample_file";
pub const GENOME_COLUMN: &str = "Genome_file";
pub const CONTIG_COLUMN: &str = "Contig_name";

/// Where the sylph profile is read from; `-` selects stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    Path(PathBuf),
}

impl FromStr for InputSource {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == "-" {
            Ok(InputSource::Stdin)
        } else {
            Ok(InputSource::Path(PathBuf::from(value)))
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Stdin => write!(f, "<stdin>"),
            InputSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRow {
    /// 1-based line number in the profile, header included.
    pub line: usize,
    pub sample: String,
    pub genome_file: String,
    pub contig_name: String,
    pub abundance: String,
}

#[derive(Debug, Clone)]
pub struct ProfileTable {
    pub abundance_column: AbundanceColumn,
    pub rows: Vec<ProfileRow>,
}

struct ColumnIndex {
    sample: usize,
    genome: usize,
    contig: usize,
    abundance: usize,
}

impl ProfileTable {
    pub fn open(source: &InputSource, abundance_column: AbundanceColumn) -> Result<Self, KronaError> {
        let reader = match source {
            InputSource::Stdin => decode_reader(Box::new(BufReader::new(io::stdin()))),
            InputSource::Path(path) => open_text(path),
        }
        .map_err(|err| KronaError::ProfileRead(format!("{source}: {err}")))?;
        let table = Self::read(reader, abundance_column)?;
        info!(source = %source, rows = table.rows.len(), "loaded sylph profile");
        Ok(table)
    }

    pub fn read<R: BufRead>(reader: R, abundance_column: AbundanceColumn) -> Result<Self, KronaError> {
        let mut lines = reader.lines().enumerate().filter_map(|(idx, line)| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(Ok((idx + 1, line.trim_end_matches('\r').to_string()))),
            Err(err) => Some(Err(KronaError::ProfileRead(err.to_string()))),
        });

        let (_, header) = lines.next().ok_or(KronaError::EmptyProfile)??;
        let columns = locate_columns(&header, abundance_column)?;

        let mut rows = Vec::new();
        for entry in lines {
            let (line, text) = entry?;
            let fields = text.split('\t').collect::<Vec<_>>();
            let field = |idx: usize| fields.get(idx).copied().unwrap_or_default().to_string();
            let sample = field(columns.sample);
            if sample.is_empty() {
                return Err(KronaError::MissingValue {
                    line,
                    column: SAMPLE_COLUMN.to_string(),
                });
            }
            rows.push(ProfileRow {
                line,
                sample,
                genome_file: field(columns.genome),
                contig_name: field(columns.contig),
                abundance: field(columns.abundance),
            });
        }

        Ok(Self {
            abundance_column,
            rows,
        })
    }
}

fn locate_columns(header: &str, abundance_column: AbundanceColumn) -> Result<ColumnIndex, KronaError> {
    let names = header.split('\t').map(str::trim).collect::<Vec<_>>();
    let position = |name: &str| names.iter().position(|candidate| *candidate == name);

    let required = [
        SAMPLE_COLUMN,
        GENOME_COLUMN,
        CONTIG_COLUMN,
        abundance_column.column_name(),
    ];
    let missing = required
        .iter()
        .filter(|name| position(name).is_none())
        .copied()
        .collect::<BTreeSet<_>>();
    if !missing.is_empty() {
        return Err(KronaError::MissingColumns(
            missing.into_iter().collect::<Vec<_>>().join(", "),
        ));
    }

    let index = |name: &str| position(name).unwrap_or_default();
    Ok(ColumnIndex {
        sample: index(SAMPLE_COLUMN),
        genome: index(GENOME_COLUMN),
        contig: index(CONTIG_COLUMN),
        abundance: index(abundance_column.column_name()),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const HEADER: &str = "Sample_file\tGenome_file\tTaxonomic_abundance\tSequence_abundance\tAdjusted_ANI\tContig_name\n";

    #[test]
    fn reads_rows_by_header_position() {
        let text = format!(
            "{HEADER}s1.fq\tdb/GCF_000123456.1_genomic.fna.gz\t5.0\t7.5\t98.1\tGCF_000123456.1: chr1, complete genome\n"
        );
        let table = ProfileTable::read(text.as_bytes(), AbundanceColumn::Sequence).unwrap();
        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!(row.line, 2);
        assert_eq!(row.sample, "s1.fq");
        assert_eq!(row.genome_file, "db/GCF_000123456.1_genomic.fna.gz");
        assert_eq!(row.abundance, "7.5");
        assert_eq!(row.contig_name, "GCF_000123456.1: chr1, complete genome");
    }

    #[test]
    fn missing_columns_are_listed_sorted() {
        let text = "Sample_file\tTaxonomic_abundance\n";
        let err = ProfileTable::read(text.as_bytes(), AbundanceColumn::Sequence).unwrap_err();
        assert_matches!(err, KronaError::MissingColumns(ref cols)
            if cols == "Contig_name, Genome_file, Sequence_abundance");
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = ProfileTable::read("\n\n".as_bytes(), AbundanceColumn::Taxonomic).unwrap_err();
        assert_matches!(err, KronaError::EmptyProfile);
    }

    #[test]
    fn short_rows_read_as_empty_cells() {
        let text = format!("{HEADER}\ns1\tgenome.fna\n");
        let table = ProfileTable::read(text.as_bytes(), AbundanceColumn::Taxonomic).unwrap();
        assert_eq!(table.rows[0].line, 3);
        assert_eq!(table.rows[0].abundance, "");
        assert_eq!(table.rows[0].contig_name, "");
    }

    #[test]
    fn empty_sample_is_an_error() {
        let text = format!("{HEADER}\tg.fna\t1\t1\t99\tc\n");
        let err = ProfileTable::read(text.as_bytes(), AbundanceColumn::Taxonomic).unwrap_err();
        assert_matches!(err, KronaError::MissingValue { line: 2, .. });
    }

    #[test]
    fn dash_means_stdin() {
        assert_eq!("-".parse::<InputSource>().unwrap(), InputSource::Stdin);
        assert_eq!(
            "p.tsv".parse::<InputSource>().unwrap(),
            InputSource::Path(PathBuf::from("p.tsv"))
        );
    }
}
