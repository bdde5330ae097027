//! Structural similarity with unified semantic penalties
//!
//! Compares two code blocks in three phases: extract semantic features
//! from the *raw* code, normalize and score the structural distance, then
//! attenuate the score by the semantic penalties. Feature extraction must
//! precede normalization — the penalty inputs are exactly the tokens
//! normalization erases.

use tracing::debug;

use crate::config::Config;
use crate::features::{compare_method_chains, extract_semantic_features, SemanticFeatures};
use crate::normalize::normalize;
use crate::schema::sha256_hex;

/// Outcome of a structural comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Byte-identical content
    Exact,
    /// Score reached the caller's threshold
    Structural,
    /// Score fell below the caller's threshold
    Different,
}

/// Similarity score plus how it was classified
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructuralScore {
    pub score: f64,
    pub kind: MatchKind,
}

/// Score when normalized forms are identical but raw content is not
const NORMALIZED_MATCH_SCORE: f64 = 0.95;

/// Compute structural similarity between two raw code blocks.
///
/// The threshold is an explicit caller decision (production default is
/// `Config::structural_threshold`); it only affects classification, never
/// the score itself. Symmetric in its arguments.
pub fn structural_similarity(
    raw_a: &str,
    raw_b: &str,
    threshold: f64,
    config: &Config,
) -> StructuralScore {
    if raw_a.is_empty() || raw_b.is_empty() {
        return StructuralScore {
            score: 0.0,
            kind: MatchKind::Different,
        };
    }

    if sha256_hex(raw_a) == sha256_hex(raw_b) {
        return StructuralScore {
            score: 1.0,
            kind: MatchKind::Exact,
        };
    }

    // Phase 1: features from raw code, before normalization erases them
    let features_a = extract_semantic_features(raw_a);
    let features_b = extract_semantic_features(raw_b);

    // Phase 2: structural distance over normalized forms
    let norm_a = normalize(raw_a);
    let norm_b = normalize(raw_b);

    let base = if norm_a == norm_b {
        NORMALIZED_MATCH_SCORE
    } else {
        let levenshtein = strsim::normalized_levenshtein(norm_a.as_str(), norm_b.as_str());
        let chain_sim = compare_method_chains(raw_a, raw_b);
        if chain_sim < 1.0 {
            levenshtein * config.chain_weight_levenshtein + chain_sim * config.chain_weight_chain
        } else {
            levenshtein
        }
    };

    // Phase 3: multiplicative semantic penalties from the raw features
    let penalty = semantic_penalty(&features_a, &features_b, config);
    let score = (base * penalty).clamp(0.0, 1.0);

    let kind = if score >= threshold {
        MatchKind::Structural
    } else {
        MatchKind::Different
    };

    StructuralScore { score, kind }
}

/// Combined semantic penalty multiplier.
///
/// A penalty applies only when both sides carry the feature and the sets
/// differ; one empty side is absence of evidence, not a mismatch.
/// Penalties compose multiplicatively.
pub fn semantic_penalty(a: &SemanticFeatures, b: &SemanticFeatures, config: &Config) -> f64 {
    let mut penalty = 1.0;

    if !a.http_status_codes.is_empty()
        && !b.http_status_codes.is_empty()
        && a.http_status_codes != b.http_status_codes
    {
        penalty *= config.status_code_penalty;
        debug!(
            left = ?a.http_status_codes,
            right = ?b.http_status_codes,
            penalty,
            "HTTP status code mismatch"
        );
    }

    if !a.logical_operators.is_empty()
        && !b.logical_operators.is_empty()
        && a.logical_operators != b.logical_operators
    {
        penalty *= config.opposite_logic_penalty;
        debug!(
            left = ?a.logical_operators,
            right = ?b.logical_operators,
            penalty,
            "logical operator mismatch"
        );
    }

    if !a.semantic_methods.is_empty()
        && !b.semantic_methods.is_empty()
        && a.semantic_methods != b.semantic_methods
    {
        penalty *= config.semantic_method_penalty;
        debug!(
            left = ?a.semantic_methods,
            right = ?b.semantic_methods,
            penalty,
            "semantic method mismatch"
        );
    }

    penalty
}
