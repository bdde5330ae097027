//! Semantic feature extraction from raw source code
//!
//! Features here carry meaning the normalizer is allowed to erase: HTTP
//! status codes, logical operators, and opposite-semantics method calls.
//! Every extractor takes `raw_code` — running them on normalized text is
//! the classic bug in this pipeline, and the [`crate::normalize`] module
//! documents the required ordering.
//!
//! All repetitions in the patterns are bounded (`\s{0,20}`) so no input
//! can trigger catastrophic backtracking.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Semantic markers extracted from raw code before normalization.
///
/// Ordered sets so feature comparisons and debug output are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SemanticFeatures {
    /// Status codes from `res.status(NNN)` / `response.status(NNN)` calls
    pub http_status_codes: BTreeSet<u16>,
    /// Logical operators present (`===`, `!==`, `&&`, ...)
    pub logical_operators: BTreeSet<String>,
    /// Opposite-semantics method calls (`Math.max`, `.toUpperCase`, ...)
    pub semantic_methods: BTreeSet<String>,
}

// Alternation ordered compound-before-simple: a `!` that is really part of
// `!==` or `!=` is consumed by the longer branch, so the lone-`!` branch
// only fires when the next char is not `=`.
static LOGICAL_OPERATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!==|===|!=|==|&&|\|\||!").unwrap());

static HTTP_STATUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:res|response)\.status\s{0,20}\(\s{0,20}(\d{3})\s{0,20}\)").unwrap()
});

static SEMANTIC_METHOD_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"Math\.max\s{0,20}\(", "Math.max"),
        (r"Math\.min\s{0,20}\(", "Math.min"),
        (r"Math\.floor\s{0,20}\(", "Math.floor"),
        (r"Math\.ceil\s{0,20}\(", "Math.ceil"),
        (r"Math\.round\s{0,20}\(", "Math.round"),
        (r"console\.log\s{0,20}\(", "console.log"),
        (r"console\.error\s{0,20}\(", "console.error"),
        (r"console\.warn\s{0,20}\(", "console.warn"),
        (r"\.reverse\s{0,20}\(", ".reverse"),
        (r"\.toUpperCase\s{0,20}\(", ".toUpperCase"),
        (r"\.toLowerCase\s{0,20}\(", ".toLowerCase"),
    ]
    .iter()
    .map(|(pattern, name)| (Regex::new(pattern).unwrap(), *name))
    .collect()
});

static METHOD_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.([A-Za-z_][A-Za-z0-9_]*)\s{0,20}\(").unwrap());

/// Maximum distance between consecutive `.name(` sites that still counts
/// as one chain.
const CHAIN_WINDOW: usize = 100;

/// Extract all semantic features from raw, unnormalized source code.
pub fn extract_semantic_features(raw_code: &str) -> SemanticFeatures {
    let mut features = SemanticFeatures::default();

    if raw_code.is_empty() {
        return features;
    }

    for m in LOGICAL_OPERATOR.find_iter(raw_code) {
        features.logical_operators.insert(m.as_str().to_string());
    }

    for caps in HTTP_STATUS.captures_iter(raw_code) {
        if let Ok(code) = caps[1].parse::<u16>() {
            features.http_status_codes.insert(code);
        }
    }

    for (pattern, name) in SEMANTIC_METHOD_PATTERNS.iter() {
        if pattern.is_match(raw_code) {
            features.semantic_methods.insert((*name).to_string());
        }
    }

    features
}

/// Extract the longest method chain from raw code.
///
/// A chain is a run of `.name(` call sites whose starts are at most
/// [`CHAIN_WINDOW`] characters apart; runs of fewer than two calls do not
/// count. Returns the longest chain, preferring the earliest on ties.
pub fn extract_method_chain(raw_code: &str) -> Vec<String> {
    let mut chains: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut last_start: Option<usize> = None;

    for caps in METHOD_CALL.captures_iter(raw_code) {
        let whole = caps.get(0).expect("match group 0");
        let name = caps[1].to_string();

        match last_start {
            Some(prev) if whole.start().saturating_sub(prev) > CHAIN_WINDOW => {
                if current.len() > 1 {
                    chains.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
                current.push(name);
            }
            _ => current.push(name),
        }
        last_start = Some(whole.start());
    }

    if current.len() > 1 {
        chains.push(current);
    }

    let mut longest: Vec<String> = Vec::new();
    for chain in chains {
        if chain.len() > longest.len() {
            longest = chain;
        }
    }
    longest
}

/// Compare method chain structure between two raw code blocks.
///
/// Identical chains score 1.0; a missing chain on one side scores 0.5;
/// same-length chains score the fraction of matching positions; a strict
/// prefix scores the length ratio; anything else is 0.0.
pub fn compare_method_chains(raw_a: &str, raw_b: &str) -> f64 {
    let chain_a = extract_method_chain(raw_a);
    let chain_b = extract_method_chain(raw_b);

    if chain_a.is_empty() && chain_b.is_empty() {
        return 1.0;
    }
    if chain_a.is_empty() || chain_b.is_empty() {
        return 0.5;
    }
    if chain_a == chain_b {
        return 1.0;
    }

    if chain_a.len() != chain_b.len() {
        let (shorter, longer) = if chain_a.len() < chain_b.len() {
            (&chain_a, &chain_b)
        } else {
            (&chain_b, &chain_a)
        };
        if longer.starts_with(shorter) {
            return shorter.len() as f64 / longer.len() as f64;
        }
        return 0.0;
    }

    let matching = chain_a
        .iter()
        .zip(chain_b.iter())
        .filter(|(a, b)| a == b)
        .count();
    matching as f64 / chain_a.len() as f64
}
