use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;

use sylph_krona::app::{App, ProgressEvent, ProgressSink};
use sylph_krona::config::{ResolvedConfig, default_mirrors};
use sylph_krona::domain::AbundanceColumn;
use sylph_krona::error::KronaError;
use sylph_krona::gtdb::ReleaseClient;
use sylph_krona::profile::InputSource;

const HEADER: &str = "Sample_file\tGenome_file\tTaxonomic_abundance\tSequence_abundance\tAdjusted_ANI\tContig_name";

struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

/// Serves fixed payloads keyed by URL.
#[derive(Default)]
struct StaticRelease {
    payloads: HashMap<String, Vec<u8>>,
}

impl ReleaseClient for StaticRelease {
    fn fetch_text(&self, url: &str) -> Result<String, KronaError> {
        self.payloads
            .get(url)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .ok_or_else(|| KronaError::ReleaseHttp(format!("unreachable: {url}")))
    }

    fn download(&self, url: &str, destination: &Path) -> Result<(), KronaError> {
        let bytes = self
            .payloads
            .get(url)
            .ok_or_else(|| KronaError::ReleaseHttp(format!("unreachable: {url}")))?;
        std::fs::write(destination, bytes).map_err(|err| KronaError::Filesystem(err.to_string()))
    }
}

fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn config(root: &Path, offline: bool) -> ResolvedConfig {
    ResolvedConfig {
        abundance: AbundanceColumn::Taxonomic,
        outdir: Utf8PathBuf::from_path_buf(root.join("krona_out")).unwrap(),
        bac: root.join("bac120_taxonomy.tsv"),
        ar: root.join("ar53_taxonomy.tsv"),
        mirrors: default_mirrors(),
        offline,
    }
}

fn write_profile(root: &Path, rows: &[&str]) -> InputSource {
    let path = root.join("profile.tsv");
    let mut text = format!("{HEADER}\n");
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    std::fs::write(&path, text).unwrap();
    InputSource::Path(path)
}

#[test]
fn resolves_taxonomy_and_fallback_into_one_file() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(
        temp.path().join("bac120_taxonomy.tsv.gz"),
        gzip("RS_GCF_000123456.1\td__Bacteria;p__Firmicutes;c__Bacilli\n"),
    )
    .unwrap();
    let input = write_profile(
        temp.path(),
        &[
            "S1\tdb/GCF_000123456.1_genomic.fna.gz\t5.0\t4.0\t99.1\tGCF_000123456.1: chr1, complete genome",
            "S1\tdb/GCF_000999999.1_genomic.fna.gz\t2\t1.0\t97.0\tunknown_bin: putative organism X, partial",
        ],
    );

    let app = App::new(StaticRelease::default());
    let result = app.run(&input, &config(temp.path(), true), &NoopSink).unwrap();

    assert_eq!(result.taxonomy_rows, 1);
    assert_eq!(result.taxonomy_hits, 1);
    assert_eq!(result.fallback_hits, 1);
    assert_eq!(result.release, None);
    assert_eq!(result.files.len(), 1);

    let file = &result.files[0];
    assert_eq!(file.sample, "S1");
    assert!(file.path.ends_with("krona_out/S1_krona.txt"));
    assert_eq!(
        std::fs::read_to_string(file.path.as_std_path()).unwrap(),
        "5.0\troot\tBacteria\tFirmicutes\tBacilli\n2.0\troot\tputative\torganism\tX\n"
    );
    assert_eq!(
        result.command,
        format!(
            "ktImportText {},S1 -o {}",
            file.path,
            result.outdir.join("sylph2krona.html")
        )
    );
}

#[test]
fn aggregates_per_sample_with_sanitized_names() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(
        temp.path().join("ar53_taxonomy.tsv"),
        "GB_GCA_000000001.2\td__Archaea;p__Halobacteriota\n",
    )
    .unwrap();
    let input = write_profile(
        temp.path(),
        &[
            "reads/a 1.fq\tGCA_000000001.2.fa\t1.5\t0\t99\tx",
            "reads/a 1.fq\tGCA_000000001.2.fa\t2.5\t0\t99\tx",
            "reads/a 1.fq\tother.fa\t1\t0\t99\tx: , partial",
            "b.fq\tGCA_000000001.1.fa\t4\t0\t99\tbin",
        ],
    );

    let app = App::new(StaticRelease::default());
    let result = app.run(&input, &config(temp.path(), true), &NoopSink).unwrap();

    let names = result
        .files
        .iter()
        .map(|file| file.path.file_name().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["b.fq_krona.txt", "reads_a_1.fq_krona.txt"]);

    let reads = std::fs::read_to_string(result.files[1].path.as_std_path()).unwrap();
    assert_eq!(
        reads,
        "4.0\troot\tArchaea\tHalobacteriota\n1.0\troot\tunclassified\t\n"
    );
    // GCA_000000001.1 is a different assembly version than the indexed .2
    let other_version = std::fs::read_to_string(result.files[0].path.as_std_path()).unwrap();
    assert_eq!(other_version, "4.0\troot\tunclassified\n");
}

#[test]
fn sequence_abundance_column_is_selectable() {
    let temp = tempfile::tempdir().unwrap();
    let input = write_profile(temp.path(), &["S1\tg.fa\t1\t0.75\t99\tacc: Foo bar"]);
    let mut config = config(temp.path(), true);
    config.abundance = AbundanceColumn::Sequence;

    let app = App::new(StaticRelease::default());
    let result = app.run(&input, &config, &NoopSink).unwrap();

    assert_eq!(result.abundance_column, "Sequence_abundance");
    assert_eq!(
        std::fs::read_to_string(result.files[0].path.as_std_path()).unwrap(),
        "0.75\troot\tFoo\tbar\n"
    );
}

#[test]
fn downloads_missing_references_before_resolving() {
    let temp = tempfile::tempdir().unwrap();
    let mirror = "https://mirror.example/latest";
    let mut payloads = HashMap::new();
    payloads.insert(
        format!("{mirror}/bac120_taxonomy.tsv.gz"),
        gzip("RS_GCF_000123456.1\td__Bacteria;p__Firmicutes\n"),
    );
    payloads.insert(
        format!("{mirror}/ar53_taxonomy.tsv.gz"),
        gzip("GB_GCA_000000001.1\td__Archaea\n"),
    );
    payloads.insert(format!("{mirror}/VERSION.txt"), b"v226\n".to_vec());

    let input = write_profile(temp.path(), &["S1\tGCF_000123456.1.fa\t3\t0\t99\tc"]);
    let mut config = config(temp.path(), false);
    config.mirrors = vec![mirror.to_string()];

    let app = App::new(StaticRelease { payloads });
    let result = app.run(&input, &config, &NoopSink).unwrap();

    assert_eq!(result.release.as_deref(), Some("v226"));
    assert_eq!(result.taxonomy_rows, 2);
    assert_eq!(
        result.references,
        vec![
            temp.path().join("bac120_taxonomy.tsv.gz"),
            temp.path().join("ar53_taxonomy.tsv.gz"),
        ]
    );
    assert_eq!(
        std::fs::read_to_string(result.files[0].path.as_std_path()).unwrap(),
        "3.0\troot\tBacteria\tFirmicutes\n"
    );
}

#[test]
fn missing_columns_abort_before_output() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("profile.tsv");
    std::fs::write(&path, "Sample_file\tGenome_file\nS1\tg.fa\n").unwrap();

    let app = App::new(StaticRelease::default());
    let err = app
        .run(&InputSource::Path(path), &config(temp.path(), true), &NoopSink)
        .unwrap_err();

    assert_matches!(err, KronaError::MissingColumns(ref cols)
        if cols == "Contig_name, Taxonomic_abundance");
    assert!(!temp.path().join("krona_out").exists());
}

#[test]
fn bad_abundance_aborts_before_output() {
    let temp = tempfile::tempdir().unwrap();
    let input = write_profile(
        temp.path(),
        &["S1\tg.fa\t1.0\t0\t99\tc", "S2\tg.fa\tn/a\t0\t99\tc"],
    );

    let app = App::new(StaticRelease::default());
    let err = app.run(&input, &config(temp.path(), true), &NoopSink).unwrap_err();

    assert_matches!(err, KronaError::InvalidAbundance { line: 3, ref value, .. } if value == "n/a");
    assert!(!temp.path().join("krona_out").exists());
}

#[test]
fn unreachable_mirrors_are_fatal_when_online() {
    let temp = tempfile::tempdir().unwrap();
    let input = write_profile(temp.path(), &["S1\tg.fa\t1\t0\t99\tc"]);
    let app = App::new(StaticRelease::default());
    let err = app.run(&input, &config(temp.path(), false), &NoopSink).unwrap_err();
    assert_matches!(err, KronaError::DownloadFailed(_));
    assert!(!temp.path().join("krona_out").exists());
}
