//! GTDB taxonomy lookup keyed by accession variants, and conversion of
//! GTDB lineages into Krona paths.

use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::KronaError;
use crate::fs_util::open_text;

const SOURCE_PREFIXES: [&str; 2] = ["RS_", "GB_"];
const RANK_PREFIXES: [u8; 8] = [b'd', b'p', b'c', b'o', b'f', b'g', b's', b't'];

pub const KRONA_ROOT: &str = "root";

/// Immutable map from accession variants to GTDB lineage strings.
///
/// Every table row is registered under its raw id (`RS_GCF_000123456.1`),
/// the id without source prefix (`GCF_000123456.1`) and the unversioned
/// bare id (`GCF_000123456`).
#[derive(Debug, Clone, Default)]
pub struct TaxonomyIndex {
    entries: HashMap<String, String>,
    rows: usize,
}

impl TaxonomyIndex {
    /// Loads the given tables in order. `None` entries and paths that do
    /// not exist contribute no rows.
    pub fn from_paths(paths: &[Option<PathBuf>]) -> Result<Self, KronaError> {
        let mut builder = IndexBuilder::default();
        for path in paths {
            let Some(path) = path else {
                continue;
            };
            if !path.exists() {
                warn!(path = %path.display(), "taxonomy table not found, skipping");
                continue;
            }
            let reader = open_text(path).map_err(|err| taxonomy_read(path, err))?;
            builder
                .add_table(reader)
                .map_err(|err| taxonomy_read(path, err))?;
        }
        let index = builder.finish();
        info!(rows = index.rows, keys = index.len(), "taxonomy index ready");
        Ok(index)
    }

    pub fn from_readers<R: BufRead>(readers: Vec<R>) -> std::io::Result<Self> {
        let mut builder = IndexBuilder::default();
        for reader in readers {
            builder.add_table(reader)?;
        }
        Ok(builder.finish())
    }

    pub fn lookup(&self, accession: Option<&str>) -> Option<&str> {
        accession.and_then(|key| self.entries.get(key).map(String::as_str))
    }

    /// Number of distinct rows indexed after dropping duplicate ids.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Default)]
struct IndexBuilder {
    seen: HashSet<String>,
    rows: Vec<(String, String)>,
}

impl IndexBuilder {
    fn add_table<R: BufRead>(&mut self, reader: R) -> std::io::Result<()> {
        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let id = fields.next().unwrap_or_default().to_string();
            let taxonomy = fields.next().unwrap_or_default().to_string();
            if self.seen.insert(id.clone()) {
                self.rows.push((id, taxonomy));
            }
        }
        Ok(())
    }

    fn finish(self) -> TaxonomyIndex {
        let rows = self.rows.len();
        let mut entries = HashMap::with_capacity(rows * 3);
        for (id, taxonomy) in self.rows {
            let bare = strip_source_prefix(&id).to_string();
            let unversioned = strip_version(&bare).to_string();
            entries.insert(unversioned, taxonomy.clone());
            entries.insert(bare, taxonomy.clone());
            entries.insert(id, taxonomy);
        }
        TaxonomyIndex { entries, rows }
    }
}

fn strip_source_prefix(id: &str) -> &str {
    SOURCE_PREFIXES
        .iter()
        .find_map(|prefix| id.strip_prefix(prefix))
        .unwrap_or(id)
}

fn strip_version(id: &str) -> &str {
    match id.rsplit_once('.') {
        Some((head, version))
            if !version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()) =>
        {
            head
        }
        _ => id,
    }
}

fn taxonomy_read(path: &Path, err: std::io::Error) -> KronaError {
    KronaError::TaxonomyRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Turns `d__Bacteria;p__Firmicutes` into `root;Bacteria;Firmicutes`.
pub fn krona_path(taxonomy: Option<&str>) -> Option<String> {
    let taxonomy = taxonomy.filter(|value| !value.is_empty())?;
    let mut path = String::with_capacity(taxonomy.len() + KRONA_ROOT.len() + 1);
    path.push_str(KRONA_ROOT);
    for segment in taxonomy.split(';') {
        path.push(';');
        path.push_str(strip_rank_prefix(segment));
    }
    Some(path)
}

fn strip_rank_prefix(segment: &str) -> &str {
    match segment.as_bytes() {
        [rank, b'_', b'_', ..] if RANK_PREFIXES.contains(rank) => &segment[3..],
        _ => segment,
    }
}
