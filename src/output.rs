use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, info};

use crate::app::RunResult;
use crate::domain::safe_file_name;
use crate::error::KronaError;
use crate::fs_util::write_atomic;

pub const KRONA_SUFFIX: &str = "_krona.txt";
pub const KRONA_HTML: &str = "sylph2krona.html";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub sample: String,
    pub path: Utf8PathBuf,
}

/// Writes one `ktImportText` input file per sample.
#[derive(Debug, Clone)]
pub struct KronaWriter {
    outdir: Utf8PathBuf,
}

impl KronaWriter {
    pub fn new(outdir: Utf8PathBuf) -> Self {
        Self { outdir }
    }

    pub fn outdir(&self) -> &Utf8Path {
        &self.outdir
    }

    pub fn sample_path(&self, sample: &str) -> Utf8PathBuf {
        self.outdir
            .join(format!("{}{KRONA_SUFFIX}", safe_file_name(sample)))
    }

    pub fn write_samples(
        &self,
        samples: &BTreeMap<String, Vec<(String, f64)>>,
    ) -> Result<Vec<WrittenFile>, KronaError> {
        fs::create_dir_all(self.outdir.as_std_path()).map_err(|err| {
            KronaError::Filesystem(format!("create output directory {}: {err}", self.outdir))
        })?;

        let mut written = Vec::with_capacity(samples.len());
        for (sample, rows) in samples {
            let path = self.sample_path(sample);
            write_atomic(path.as_std_path(), |writer| write_krona_rows(writer, rows))?;
            info!(sample = %sample, path = %path, rows = rows.len(), "wrote krona file");
            written.push(WrittenFile {
                sample: sample.clone(),
                path,
            });
        }
        Ok(written)
    }
}

/// `abundance\tseg0\tseg1...`, padded with empty cells to the longest path in `rows`.
pub fn write_krona_rows(writer: &mut dyn Write, rows: &[(String, f64)]) -> io::Result<()> {
    let width = rows
        .iter()
        .map(|(path, _)| path.split(';').count())
        .max()
        .unwrap_or(0);
    for (path, abundance) in rows {
        write!(writer, "{}", format_abundance(*abundance))?;
        let segments = path.split(';').collect::<Vec<_>>();
        for idx in 0..width {
            write!(writer, "\t{}", segments.get(idx).copied().unwrap_or_default())?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Shortest round-trip form, always with a fractional part (`5.0`, `0.25`).
pub fn format_abundance(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains(['.', 'e']) {
        format!("{text}.0")
    } else {
        text
    }
}

pub fn ktimport_command(written: &[WrittenFile], outdir: &Utf8Path) -> String {
    let inputs = written
        .iter()
        .map(|file| format!("{},{}", file.path, file.sample))
        .collect::<Vec<_>>()
        .join(" ");
    format!("ktImportText {inputs} -o {}", outdir.join(KRONA_HTML))
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunResult) -> io::Result<()> {
        let json = serde_json::to_string_pretty(result).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl crate::app::ProgressSink for JsonOutput {
    fn event(&self, _event: crate::app::ProgressEvent) {}
}

/// Forwards pipeline phases to the tracing subscriber.
pub struct LogSink;

impl crate::app::ProgressSink for LogSink {
    fn event(&self, event: crate::app::ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => debug!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => debug!("{}", event.message),
        }
    }
}
