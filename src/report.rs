//! Scan report assembly
//!
//! Collects blocks, groups, and suggestions into the single JSON document
//! the pipeline writes to standard output, along with aggregate metrics.

use serde::{Deserialize, Serialize};

use crate::schema::{CodeBlock, DuplicateGroup, SimilarityMethod};
use crate::suggest::ConsolidationSuggestion;

/// Aggregate metrics over one scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanMetrics {
    pub total_code_blocks: usize,
    pub total_duplicate_groups: usize,
    pub exact_duplicates: usize,
    pub structural_duplicates: usize,
    pub semantic_duplicates: usize,
    pub total_duplicated_lines: usize,
    pub potential_loc_reduction: usize,
    pub duplication_percentage: f64,
    pub total_suggestions: usize,
    pub quick_wins: usize,
    pub high_priority_suggestions: usize,
}

/// The complete output document
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub code_blocks: Vec<CodeBlock>,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub suggestions: Vec<ConsolidationSuggestion>,
    pub metrics: ScanMetrics,
}

impl ScanReport {
    pub fn new(
        code_blocks: Vec<CodeBlock>,
        duplicate_groups: Vec<DuplicateGroup>,
        suggestions: Vec<ConsolidationSuggestion>,
    ) -> Self {
        let metrics = compute_metrics(&code_blocks, &duplicate_groups, &suggestions);
        Self {
            code_blocks,
            duplicate_groups,
            suggestions,
            metrics,
        }
    }
}

fn compute_metrics(
    blocks: &[CodeBlock],
    groups: &[DuplicateGroup],
    suggestions: &[ConsolidationSuggestion],
) -> ScanMetrics {
    let count_method = |method: SimilarityMethod| {
        groups
            .iter()
            .filter(|g| g.similarity_method == method)
            .count()
    };

    let total_duplicated_lines: usize = groups.iter().map(|g| g.total_lines).sum();
    let potential_loc_reduction: usize = groups.iter().map(|g| g.deduplication_potential).sum();

    let total_block_lines: usize = blocks.iter().map(|b| b.line_count).sum();
    let duplication_percentage = if total_block_lines > 0 {
        let raw = 100.0 * total_duplicated_lines as f64 / total_block_lines as f64;
        (raw * 100.0).round() / 100.0
    } else {
        0.0
    };

    ScanMetrics {
        total_code_blocks: blocks.len(),
        total_duplicate_groups: groups.len(),
        exact_duplicates: count_method(SimilarityMethod::ExactMatch),
        structural_duplicates: count_method(SimilarityMethod::Structural),
        semantic_duplicates: count_method(SimilarityMethod::Semantic),
        total_duplicated_lines,
        potential_loc_reduction,
        duplication_percentage,
        total_suggestions: suggestions.len(),
        quick_wins: suggestions.iter().filter(|s| s.is_quick_win).count(),
        high_priority_suggestions: suggestions
            .iter()
            .filter(|s| s.impact_score >= 75.0)
            .count(),
    }
}
