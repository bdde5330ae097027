//! Semantic compatibility validation and Layer 3 similarity
//!
//! Two kinds of checks live here: pairwise *rejection* checks that stop
//! surface-identical but semantically divergent code from grouping
//! (opposite operators, different status codes, diverging method chains),
//! and the weighted-Jaccard *similarity* used by Layer 3 over annotation
//! sets.

use std::collections::BTreeSet;

use crate::annotate::SemanticAnnotation;
use crate::config::Config;
use crate::features::{extract_method_chain, extract_semantic_features};
use crate::schema::CodeBlock;

/// Weight for operation overlap in Layer 3 similarity
const WEIGHT_OPERATIONS: f64 = 0.40;
/// Weight for domain overlap
const WEIGHT_DOMAINS: f64 = 0.25;
/// Weight for code-pattern overlap
const WEIGHT_PATTERNS: f64 = 0.20;
/// Weight for data-type overlap
const WEIGHT_DATA_TYPES: f64 = 0.15;

/// Operator pairs that signal opposite boolean logic
const OPPOSITE_OPERATOR_PAIRS: &[(&str, &str)] = &[("===", "!=="), ("==", "!=")];

/// Why a pair of blocks failed semantic validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    MethodChainMismatch,
    StatusCodeMismatch,
    OppositeLogic,
    SemanticMethodMismatch,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::MethodChainMismatch => "method_chain_mismatch",
            Self::StatusCodeMismatch => "status_code_mismatch",
            Self::OppositeLogic => "opposite_logic",
            Self::SemanticMethodMismatch => "semantic_method_mismatch",
        };
        f.write_str(name)
    }
}

/// Run all pairwise semantic checks on two raw code strings.
///
/// Returns the first failing check, or `None` when the pair is
/// semantically compatible. Hash equality over whitespace-collapsed
/// source is coarser than semantic identity, so even exact-hash buckets
/// go through this.
pub fn check_pair(raw_a: &str, raw_b: &str) -> Option<RejectReason> {
    if extract_method_chain(raw_a) != extract_method_chain(raw_b) {
        return Some(RejectReason::MethodChainMismatch);
    }

    let features_a = extract_semantic_features(raw_a);
    let features_b = extract_semantic_features(raw_b);

    if !features_a.http_status_codes.is_empty()
        && !features_b.http_status_codes.is_empty()
        && features_a.http_status_codes != features_b.http_status_codes
    {
        return Some(RejectReason::StatusCodeMismatch);
    }

    for (left, right) in OPPOSITE_OPERATOR_PAIRS {
        let a_left = features_a.logical_operators.contains(*left);
        let a_right = features_a.logical_operators.contains(*right);
        let b_left = features_b.logical_operators.contains(*left);
        let b_right = features_b.logical_operators.contains(*right);
        if (a_left && b_right) || (a_right && b_left) {
            return Some(RejectReason::OppositeLogic);
        }
    }

    if !features_a.semantic_methods.is_empty()
        && !features_b.semantic_methods.is_empty()
        && features_a.semantic_methods != features_b.semantic_methods
    {
        return Some(RejectReason::SemanticMethodMismatch);
    }

    None
}

/// Run the pairwise checks across every pair in a candidate group.
///
/// Returns the ids of the first offending pair and the reason.
pub fn validate_group_pairs(blocks: &[&CodeBlock]) -> Result<(), (String, String, RejectReason)> {
    for (i, a) in blocks.iter().enumerate() {
        for b in &blocks[i + 1..] {
            if let Some(reason) = check_pair(&a.source_code, &b.source_code) {
                return Err((a.block_id.clone(), b.block_id.clone(), reason));
            }
        }
    }
    Ok(())
}

/// Check whether two blocks may be compared at all in Layer 2.
///
/// Requires the same matcher rule and category, rejects re-matches of the
/// same function in the same file (those are already deduplicated), and
/// rejects blocks whose sizes differ by more than the complexity ratio.
pub fn are_semantically_compatible(a: &CodeBlock, b: &CodeBlock, config: &Config) -> bool {
    if a.pattern_id != b.pattern_id {
        return false;
    }
    if a.category != b.category {
        return false;
    }

    if let (Some(func_a), Some(func_b)) = (a.function_name(), b.function_name()) {
        if func_a == func_b && a.location.file_path == b.location.file_path {
            return false;
        }
    }

    let min = a.line_count.min(b.line_count) as f64;
    let max = a.line_count.max(b.line_count) as f64;
    if max > 0.0 && min / max < config.min_complexity_ratio {
        return false;
    }

    true
}

/// Validate a complete candidate group: shared pattern and category,
/// pairwise compatibility, and the pairwise semantic checks.
pub fn validate_duplicate_group(blocks: &[&CodeBlock], config: &Config) -> bool {
    if blocks.len() < 2 {
        return false;
    }

    let first = blocks[0];
    if blocks
        .iter()
        .any(|b| b.pattern_id != first.pattern_id || b.category != first.category)
    {
        return false;
    }

    for (i, a) in blocks.iter().enumerate() {
        for b in &blocks[i + 1..] {
            if !are_semantically_compatible(a, b, config) {
                return false;
            }
        }
    }

    validate_group_pairs(blocks).is_ok()
}

/// Jaccard similarity between two tag sets.
///
/// Both empty counts as full agreement; exactly one empty is a partial
/// match (0.5), not a mismatch.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.5;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Weighted semantic similarity between two annotations:
/// 40% operations, 25% domains, 20% patterns, 15% data types.
pub fn semantic_similarity(a: &SemanticAnnotation, b: &SemanticAnnotation) -> f64 {
    jaccard(&a.operations, &b.operations) * WEIGHT_OPERATIONS
        + jaccard(&a.domains, &b.domains) * WEIGHT_DOMAINS
        + jaccard(&a.patterns, &b.patterns) * WEIGHT_PATTERNS
        + jaccard(&a.data_types, &b.data_types) * WEIGHT_DATA_TYPES
}

/// Check whether two intents describe compatible operations.
///
/// Compatible means the operation prefixes (tokens before the first `|`)
/// share at least one token. An `unknown` intent is incompatible with
/// everything, including another `unknown`.
pub fn intents_compatible(intent_a: &str, intent_b: &str) -> bool {
    if intent_a == "unknown" || intent_b == "unknown" {
        return false;
    }

    let ops_a = operation_tokens(intent_a);
    let ops_b = operation_tokens(intent_b);

    if ops_a.is_empty() || ops_b.is_empty() {
        return false;
    }

    ops_a.intersection(&ops_b).next().is_some()
}

fn operation_tokens(intent: &str) -> BTreeSet<&str> {
    let prefix = intent.split('|').next().unwrap_or("");
    // A leading section like "on:user" means the intent has no operations
    if prefix.starts_with("on:") || prefix.starts_with("with:") {
        return BTreeSet::new();
    }
    prefix.split('+').filter(|op| !op.is_empty()).collect()
}
