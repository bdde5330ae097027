//! Composite quality scoring for candidate groups
//!
//! A candidate group passes the gate only when the weighted combination
//! of similarity, group size, code size, and semantic consistency clears
//! `Config::min_group_quality`. The gate is the last line of defense
//! against trivial or incoherent groups that survived a layer's own
//! checks.

use std::collections::BTreeSet;

use crate::config::{
    Config, SEMANTIC_MIXED, SEMANTIC_PERFECT_CONSISTENCY, SEMANTIC_SAME_CATEGORY,
    SEMANTIC_SAME_PATTERN,
};
use crate::schema::CodeBlock;

/// Quality score for a candidate group, in [0, 1].
///
/// Factors (weights from config, defaults in parentheses):
/// - similarity score (40%)
/// - group size, saturating at `size_normalization` members (20%)
/// - mean line count, saturating at `complexity_normalization` (20%)
/// - semantic consistency across members (20%)
pub fn group_quality_score(blocks: &[&CodeBlock], similarity_score: f64, config: &Config) -> f64 {
    if blocks.len() < 2 {
        return 0.0;
    }

    let similarity_factor = similarity_score * config.quality_weight_similarity;

    let size_factor =
        (blocks.len() as f64 / config.size_normalization).min(1.0) * config.quality_weight_size;

    let mean_lines =
        blocks.iter().map(|b| b.line_count).sum::<usize>() as f64 / blocks.len() as f64;
    let complexity_factor =
        (mean_lines / config.complexity_normalization).min(1.0) * config.quality_weight_complexity;

    let semantic_factor = semantic_consistency(blocks) * config.quality_weight_semantic;

    similarity_factor + size_factor + complexity_factor + semantic_factor
}

/// Consistency of categories and patterns across members: 1.0 when both
/// agree, 0.7 for category only, 0.5 for pattern only, 0.3 for neither.
fn semantic_consistency(blocks: &[&CodeBlock]) -> f64 {
    let categories: BTreeSet<_> = blocks.iter().map(|b| b.category).collect();
    let patterns: BTreeSet<_> = blocks.iter().map(|b| b.pattern_id.as_str()).collect();

    match (categories.len(), patterns.len()) {
        (1, 1) => SEMANTIC_PERFECT_CONSISTENCY,
        (1, _) => SEMANTIC_SAME_CATEGORY,
        (_, 1) => SEMANTIC_SAME_PATTERN,
        _ => SEMANTIC_MIXED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::testing::block;

    #[test]
    fn test_single_block_scores_zero() {
        let a = block("src/a.js", 1, 10, "code", "validation");
        let quality = group_quality_score(&[&a], 1.0, &Config::default());
        assert!((quality - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_perfect_group() {
        let blocks: Vec<_> = (0..4)
            .map(|i| block("src/a.js", i * 20 + 1, i * 20 + 12, "long code here", "validation"))
            .collect();
        let refs: Vec<&_> = blocks.iter().collect();
        // 4 members, 12 lines each, same pattern and category, similarity 1.0
        let quality = group_quality_score(&refs, 1.0, &Config::default());
        assert!((quality - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_two_single_line_exact_blocks_pass_default_gate() {
        let a = block("src/a.js", 1, 1, "JSON.stringify(data, null, 2)", "object-manipulation");
        let b = block("src/b.js", 9, 9, "JSON.stringify(data, null, 2)", "object-manipulation");
        let quality = group_quality_score(&[&a, &b], 1.0, &Config::default());
        // 0.4 + 0.5*0.2 + 0.1*0.2 + 0.2 = 0.72
        assert!((quality - 0.72).abs() < 1e-9);
        assert!(quality >= Config::default().min_group_quality);
    }

    #[test]
    fn test_mixed_pattern_lowers_consistency() {
        let a = block("src/a.js", 1, 10, "code", "validation");
        let b = block("src/b.js", 1, 10, "code", "request-validation");
        // Same category (validator), different pattern: consistency 0.7
        let same = group_quality_score(
            &[&a, &block("src/c.js", 1, 10, "code", "validation")],
            0.9,
            &Config::default(),
        );
        let mixed = group_quality_score(&[&a, &b], 0.9, &Config::default());
        assert!((same - mixed - 0.2 * 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_low_similarity_fails_gate() {
        let a = block("src/a.js", 1, 2, "code", "validation");
        let b = block("src/b.js", 1, 2, "code", "validation");
        let quality = group_quality_score(&[&a, &b], 0.5, &Config::default());
        assert!(quality < Config::default().min_group_quality);
    }
}
