use std::sync::LazyLock;

use regex::Regex;

use crate::taxonomy::KRONA_ROOT;

static LEADING_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^:]+:\s*").unwrap());

const STOPWORDS: [&str; 5] = ["bin", "isolate", "strain", "mag", "tpa_asm"];

pub const UNCLASSIFIED: &str = "unclassified";

/// Best-effort Krona path from a contig description, used when the genome
/// has no GTDB entry. `GCA_1.1: Foo bar strain X, whole genome` becomes
/// `root;Foo;bar;X`.
pub fn fallback_from_contig(contig_name: &str) -> String {
    let stripped = LEADING_LABEL_RE.replace(contig_name, "");
    let head = match stripped.split_once(',') {
        Some((head, _)) => head,
        None => &*stripped,
    }
    .trim();
    if head.is_empty() {
        return format!("{KRONA_ROOT};{UNCLASSIFIED}");
    }

    let mut tokens = head
        .split_whitespace()
        .filter(|token| !STOPWORDS.contains(&token.to_lowercase().as_str()))
        .map(sanitize_token)
        .collect::<Vec<_>>();
    if tokens.is_empty() {
        tokens.push(UNCLASSIFIED.to_string());
    }
    format!("{KRONA_ROOT};{}", tokens.join(";"))
}

fn sanitize_token(token: &str) -> String {
    token
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
