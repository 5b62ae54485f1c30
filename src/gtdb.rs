use std::cell::OnceCell;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tempfile::Builder;
use tracing::{info, warn};

use crate::error::KronaError;
use crate::fs_util::md5_file;

pub const DEFAULT_MIRRORS: [&str; 2] = [
    "https://data.ace.uq.edu.au/public/gtdb/data/releases/latest",
    "https://data.gtdb.ecogenomic.org/releases/latest",
];

pub const BAC_TAXONOMY: &str = "bac120_taxonomy.tsv";
pub const AR_TAXONOMY: &str = "ar53_taxonomy.tsv";

const UNKNOWN_RELEASE: &str = "unknown";

static RELEASE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_r\d+").unwrap());

pub trait ReleaseClient: Send + Sync {
    fn fetch_text(&self, url: &str) -> Result<String, KronaError>;
    fn download(&self, url: &str, destination: &Path) -> Result<(), KronaError>;
}

#[derive(Clone)]
pub struct GtdbHttpClient {
    client: Client,
}

impl GtdbHttpClient {
    pub fn new() -> Result<Self, KronaError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("sylph2krona/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KronaError::ReleaseHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| KronaError::ReleaseHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, KronaError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| KronaError::ReleaseHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "GTDB request failed".to_string());
            return Err(KronaError::ReleaseStatus { status, message });
        }
        Ok(response)
    }
}

impl ReleaseClient for GtdbHttpClient {
    fn fetch_text(&self, url: &str) -> Result<String, KronaError> {
        self.get(url)?
            .text()
            .map_err(|err| KronaError::ReleaseHttp(err.to_string()))
    }

    fn download(&self, url: &str, destination: &Path) -> Result<(), KronaError> {
        let mut response = self.get(url)?;
        let mut file =
            File::create(destination).map_err(|err| KronaError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| KronaError::ReleaseHttp(err.to_string()))?;
        Ok(())
    }
}

/// Checksums from a release's `MD5SUM.txt`, addressable by file name with or
/// without the `_r<release>` tag.
#[derive(Debug, Clone, Default)]
pub struct Md5Manifest {
    entries: HashMap<String, String>,
}

impl Md5Manifest {
    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();
        for line in text.lines() {
            let mut parts = line.split_whitespace();
            let (Some(hash), Some(name)) = (parts.next(), parts.next()) else {
                continue;
            };
            let file_name = Path::new(name)
                .file_name()
                .map(|value| value.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.to_string());
            let generic = RELEASE_TAG_RE.replace_all(&file_name, "").into_owned();
            entries.insert(generic, hash.to_string());
            entries.insert(file_name, hash.to_string());
        }
        Self { entries }
    }

    pub fn get(&self, file_name: &str) -> Option<&str> {
        self.entries.get(file_name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalReference {
    pub path: PathBuf,
    pub downloaded: bool,
}

/// Resolves GTDB reference files locally, downloading them from the
/// configured mirrors (tried in order) when absent.
pub struct ReferenceFetcher<'a, C: ReleaseClient> {
    client: &'a C,
    mirrors: &'a [String],
    manifest: OnceCell<Md5Manifest>,
}

impl<'a, C: ReleaseClient> ReferenceFetcher<'a, C> {
    pub fn new(client: &'a C, mirrors: &'a [String]) -> Self {
        Self {
            client,
            mirrors,
            manifest: OnceCell::new(),
        }
    }

    pub fn release_version(&self) -> String {
        for mirror in self.mirrors {
            let url = mirror_url(mirror, "VERSION.txt");
            match self.client.fetch_text(&url) {
                Ok(text) => {
                    return text.lines().next().unwrap_or_default().trim().to_string();
                }
                Err(err) => warn!(url = %url, error = %err, "failed to fetch GTDB version"),
            }
        }
        UNKNOWN_RELEASE.to_string()
    }

    pub fn manifest(&self) -> &Md5Manifest {
        self.manifest.get_or_init(|| {
            for mirror in self.mirrors {
                let url = mirror_url(mirror, "MD5SUM.txt");
                match self.client.fetch_text(&url) {
                    Ok(text) => return Md5Manifest::parse(&text),
                    Err(err) => warn!(url = %url, error = %err, "failed to fetch MD5 checksums"),
                }
            }
            Md5Manifest::default()
        })
    }

    /// Returns `name`, or `name.gz` when only the compressed copy exists,
    /// downloading the compressed file when neither is present.
    pub fn ensure_local(&self, name: &Path) -> Result<LocalReference, KronaError> {
        if let Some(path) = find_local(name) {
            return Ok(LocalReference {
                path,
                downloaded: false,
            });
        }

        let target = gz_path(name);
        let file_name = target
            .file_name()
            .map(|value| value.to_string_lossy().into_owned())
            .ok_or_else(|| KronaError::DownloadFailed(name.display().to_string()))?;
        let expected = self.manifest().get(&file_name).map(str::to_string);
        let dir = target
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).map_err(|err| KronaError::Filesystem(err.to_string()))?;

        for mirror in self.mirrors {
            let url = mirror_url(mirror, &file_name);
            info!(url = %url, "downloading {file_name}");
            let temp = Builder::new()
                .prefix(".sylph2krona-")
                .tempfile_in(dir)
                .map_err(|err| KronaError::Filesystem(err.to_string()))?;
            if let Err(err) = self.client.download(&url, temp.path()) {
                warn!(url = %url, error = %err, "download failed");
                continue;
            }

            match &expected {
                Some(expected) => {
                    let actual = md5_file(temp.path())
                        .map_err(|err| KronaError::Filesystem(err.to_string()))?;
                    if !actual.eq_ignore_ascii_case(expected) {
                        return Err(KronaError::ChecksumMismatch {
                            file: file_name,
                            expected: expected.clone(),
                            actual,
                        });
                    }
                }
                None => warn!(file = %file_name, "no MD5 checksum available for verification"),
            }

            temp.persist(&target)
                .map_err(|err| KronaError::Filesystem(err.error.to_string()))?;
            info!(path = %target.display(), "saved {file_name}");
            return Ok(LocalReference {
                path: target,
                downloaded: true,
            });
        }

        Err(KronaError::DownloadFailed(name.display().to_string()))
    }
}

/// `name` if it exists, else `name.gz` if that exists.
pub fn find_local(name: &Path) -> Option<PathBuf> {
    if name.exists() {
        return Some(name.to_path_buf());
    }
    let compressed = gz_path(name);
    (compressed != name && compressed.exists()).then_some(compressed)
}

fn gz_path(name: &Path) -> PathBuf {
    if name.extension().is_some_and(|ext| ext == "gz") {
        return name.to_path_buf();
    }
    let mut with_ext = name.as_os_str().to_os_string();
    with_ext.push(".gz");
    PathBuf::from(with_ext)
}

fn mirror_url(mirror: &str, file_name: &str) -> String {
    format!("{}/{}", mirror.trim_end_matches('/'), file_name)
}
