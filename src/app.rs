use std::path::PathBuf;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::Aggregator;
use crate::config::ResolvedConfig;
use crate::error::KronaError;
use crate::gtdb::{ReferenceFetcher, ReleaseClient, find_local};
use crate::output::{KronaWriter, WrittenFile, ktimport_command};
use crate::profile::{InputSource, ProfileTable};
use crate::resolve::{PathSource, RecordResolver};
use crate::taxonomy::TaxonomyIndex;

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// GTDB release reported by the mirrors; only probed when references were downloaded.
    pub release: Option<String>,
    pub abundance_column: String,
    pub references: Vec<PathBuf>,
    pub taxonomy_rows: usize,
    pub profile_rows: usize,
    pub taxonomy_hits: usize,
    pub fallback_hits: usize,
    pub outdir: Utf8PathBuf,
    pub files: Vec<WrittenFile>,
    pub command: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

struct References {
    paths: Vec<Option<PathBuf>>,
    release: Option<String>,
}

/// Runs the sylph → GTDB → Krona pipeline.
pub struct App<C: ReleaseClient> {
    client: C,
}

impl<C: ReleaseClient> App<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn run(
        &self,
        input: &InputSource,
        config: &ResolvedConfig,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, KronaError> {
        let started = Instant::now();

        sink.event(ProgressEvent {
            message: "phase=References; locating GTDB taxonomy".to_string(),
            elapsed: None,
        });
        let references = self.prepare_references(config)?;

        sink.event(ProgressEvent {
            message: "phase=Index; loading taxonomy tables".to_string(),
            elapsed: Some(started.elapsed()),
        });
        let index = TaxonomyIndex::from_paths(&references.paths)?;

        sink.event(ProgressEvent {
            message: format!("phase=Profile; reading {input}"),
            elapsed: Some(started.elapsed()),
        });
        let profile = ProfileTable::open(input, config.abundance)?;

        sink.event(ProgressEvent {
            message: format!("phase=Resolve; {} rows", profile.rows.len()),
            elapsed: Some(started.elapsed()),
        });
        let resolver = RecordResolver::new(&index, profile.abundance_column);
        let records = resolver.resolve_all(&profile.rows)?;
        let taxonomy_hits = records
            .iter()
            .filter(|record| record.source == PathSource::Taxonomy)
            .count();
        let fallback_hits = records.len() - taxonomy_hits;
        info!(taxonomy_hits, fallback_hits, "resolved profile rows");

        let mut aggregator = Aggregator::new();
        aggregator.extend(records);
        let samples = aggregator.into_samples();

        sink.event(ProgressEvent {
            message: format!("phase=Emit; {} samples", samples.len()),
            elapsed: Some(started.elapsed()),
        });
        let writer = KronaWriter::new(config.outdir.clone());
        let files = writer.write_samples(&samples)?;
        let command = ktimport_command(&files, writer.outdir());

        sink.event(ProgressEvent {
            message: "phase=Done".to_string(),
            elapsed: Some(started.elapsed()),
        });

        Ok(RunResult {
            release: references.release,
            abundance_column: profile.abundance_column.column_name().to_string(),
            references: references.paths.into_iter().flatten().collect(),
            taxonomy_rows: index.rows(),
            profile_rows: profile.rows.len(),
            taxonomy_hits,
            fallback_hits,
            outdir: config.outdir.clone(),
            files,
            command,
        })
    }

    fn prepare_references(&self, config: &ResolvedConfig) -> Result<References, KronaError> {
        let names = [&config.bac, &config.ar];
        if config.offline {
            return Ok(References {
                paths: names.iter().map(|name| find_local(name)).collect(),
                release: None,
            });
        }

        let fetcher = ReferenceFetcher::new(&self.client, &config.mirrors);
        let mut paths = Vec::with_capacity(names.len());
        let mut downloaded = false;
        for name in names {
            let local = fetcher.ensure_local(name)?;
            downloaded |= local.downloaded;
            paths.push(Some(local.path));
        }

        let release = if downloaded {
            let release = fetcher.release_version();
            warn!(
                "GTDB taxonomy files are downloaded for version {release}. Make sure that this version matches your sylph database!"
            );
            Some(release)
        } else {
            None
        };

        Ok(References { paths, release })
    }
}
