use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{WikiError, WikiResult};

pub const MIN_SEGMENT_LEN: usize = 3;
pub const MAX_SUGGESTIONS: usize = 5;

/// Short segments a writer is allowed to use; they are expanded before the
/// minimum-length policy is applied.
const SEGMENT_EXPANSIONS: &[(&str, &str)] = &[
    ("ai", "artificial-intelligence"),
    ("db", "database"),
    ("qa", "quality-assurance"),
    ("ci", "continuous-integration"),
    ("cd", "continuous-delivery"),
    ("ml", "machine-learning"),
];

pub const DEFAULT_ALLOWED_ROOTS: &[&str] = &[
    "homelab",
    "projects",
    "ai",
    "personal",
    "community",
    "meta",
];

/// Keyword-to-root hints, scored in declaration order. A hint only fires
/// when the hinted root is itself in the allowed set.
const KEYWORD_ROOT_HINTS: &[(&str, &[&str])] = &[
    ("gpu-vm", &["homelab"]),
    ("proxmox", &["homelab"]),
    ("openwebui", &["ai", "homelab"]),
    ("ollama", &["ai", "homelab"]),
];

static SEGMENT_SEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ _]+").expect("segment separator regex"));
static SEGMENT_BAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9-]+").expect("segment charset regex"));
static MULTI_HYPHEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-{2,}").expect("hyphen run regex"));

/// Canonicalize one path segment. Total: never fails, but may return an
/// empty string, which callers drop.
pub fn normalize_segment(raw: &str) -> String {
    let segment = raw.trim().to_lowercase();
    let segment = SEGMENT_SEP_RE.replace_all(&segment, "-");
    let segment = SEGMENT_BAD_RE.replace_all(&segment, "-");
    let segment = MULTI_HYPHEN_RE.replace_all(&segment, "-");
    segment.trim_matches('-').to_string()
}

/// Canonicalize a full path into the leading-slash normalized form.
/// Re-normalizing a normalized path is the identity. A path with no
/// surviving segments normalizes to the root path `/`.
pub fn normalize_path(raw: &str) -> String {
    let mut parts = Vec::new();
    for piece in raw.split('/') {
        let segment = normalize_segment(piece);
        if !segment.is_empty() {
            parts.push(segment);
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// The slash-stripped form the upstream stores and accepts on the wire.
/// The root path maps to the empty string.
pub fn wire_path(raw: &str) -> String {
    normalize_path(raw).trim_start_matches('/').to_string()
}

/// Apply the minimum-segment-length policy to a (raw or normalized) path,
/// expanding known abbreviations first. Returns the normalized, possibly
/// expanded path.
pub fn enforce_path_policy(path: &str) -> WikiResult<String> {
    let normalized = normalize_path(path);
    if normalized == "/" {
        return Ok(normalized);
    }

    let mut fixed = Vec::new();
    for segment in normalized.trim_start_matches('/').split('/') {
        let mut adjusted = segment.to_string();
        if adjusted.len() < MIN_SEGMENT_LEN
            && let Some((_, expansion)) = SEGMENT_EXPANSIONS
                .iter()
                .find(|(short, _)| short.eq_ignore_ascii_case(&adjusted))
        {
            adjusted = (*expansion).to_string();
        }
        if adjusted.len() < MIN_SEGMENT_LEN {
            return Err(WikiError::policy_violation(segment, MIN_SEGMENT_LEN));
        }
        fixed.push(adjusted);
    }
    Ok(format!("/{}", fixed.join("/")))
}

/// First segment of a normalized path, or `None` for the root path.
pub fn root_from_path(path: &str) -> Option<String> {
    let normalized = normalize_path(path);
    if normalized == "/" {
        return None;
    }
    normalized
        .trim_start_matches('/')
        .split('/')
        .next()
        .map(ToString::to_string)
}

/// Parse a comma-separated allowed-root list into normalized, de-duplicated
/// segments, falling back to the defaults when unset or empty.
pub fn parse_allowed_roots(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return default_allowed_roots();
    };

    let mut roots = Vec::new();
    let mut seen = BTreeSet::new();
    for item in raw.split(',') {
        let segment = normalize_segment(item);
        if !segment.is_empty() && seen.insert(segment.clone()) {
            roots.push(segment);
        }
    }
    if roots.is_empty() {
        default_allowed_roots()
    } else {
        roots
    }
}

fn default_allowed_roots() -> Vec<String> {
    DEFAULT_ALLOWED_ROOTS
        .iter()
        .map(|root| (*root).to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub input: String,
    pub normalized: String,
    pub is_valid_root: bool,
    pub root: Option<String>,
    pub allowed_roots: Vec<String>,
    pub suggestions: Vec<String>,
    pub warnings: Vec<String>,
}

/// Analyze a candidate path against the allowed-root taxonomy before any
/// write is attempted, proposing alternatives when the root is not allowed.
pub fn preflight_analysis(
    raw_path: &str,
    allowed_roots: &[String],
    existing_paths: &[String],
) -> PreflightReport {
    let normalized = normalize_path(raw_path);
    let root = root_from_path(&normalized);
    let is_valid_root = root
        .as_deref()
        .is_some_and(|root| allowed_roots.iter().any(|allowed| allowed == root));

    let mut warnings = Vec::new();
    if normalized == "/" {
        warnings.push("Path normalizes to root '/' and should include a page slug.".to_string());
    } else if let Some(root) = &root
        && !is_valid_root
    {
        warnings.push(format!("Root '{root}' is not in allowed roots."));
    }

    let mut suggestions: Vec<String> = Vec::new();

    // Everything after the root, kept verbatim so a hinted root can be
    // swapped in without re-deriving the rest of the path.
    let suffix = match &root {
        Some(root) => {
            let remainder = &normalized[format!("/{root}").len()..];
            if remainder == "/" { "" } else { remainder }
        }
        None => "",
    };

    if !is_valid_root && normalized != "/" {
        for hinted_root in keyword_root_hints(&normalized, allowed_roots) {
            let candidate = format!("/{hinted_root}{suffix}");
            if !suggestions.contains(&candidate) {
                suggestions.push(candidate);
            }
        }
    }

    let mut scored: Vec<(usize, String)> = Vec::new();
    for path in existing_paths {
        let candidate = normalize_path(path);
        let score = segment_overlap_score(&normalized, &candidate);
        if score > 0 {
            scored.push((score, candidate));
        }
    }
    scored.sort_by(|left, right| right.0.cmp(&left.0).then_with(|| left.1.cmp(&right.1)));

    for (_, candidate) in scored {
        if suggestions.len() >= MAX_SUGGESTIONS {
            break;
        }
        if !suggestions.contains(&candidate) {
            suggestions.push(candidate);
        }
    }

    PreflightReport {
        input: raw_path.to_string(),
        normalized,
        is_valid_root,
        root,
        allowed_roots: allowed_roots.to_vec(),
        suggestions,
        warnings,
    }
}

fn keyword_root_hints(normalized: &str, allowed_roots: &[String]) -> Vec<String> {
    let mut hints = Vec::new();
    for (keyword, roots) in KEYWORD_ROOT_HINTS {
        if normalized.contains(keyword) {
            for root in *roots {
                hints.push((*root).to_string());
            }
        }
    }

    let mut out = Vec::new();
    for root in hints {
        if allowed_roots.contains(&root) && !out.contains(&root) {
            out.push(root);
        }
    }
    out
}

fn segment_overlap_score(path_a: &str, path_b: &str) -> usize {
    let segments_a: BTreeSet<&str> = path_a
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    let segments_b: BTreeSet<&str> = path_b
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    segments_a.intersection(&segments_b).count()
}
