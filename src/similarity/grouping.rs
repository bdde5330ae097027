//! Multi-layer duplicate grouping
//!
//! The orchestrator drives five layers over the ingested blocks:
//!
//! - Layer 0: complexity filter — trivial blocks never group
//! - Layer 1: exact grouping by content hash, with pairwise semantic
//!   validation (hash equality is coarser than semantic identity)
//! - Layer 2: greedy structural clustering over the remaining blocks
//! - Layer 3: semantic grouping over annotation sets
//! - Quality gate at each layer's acceptance point
//!
//! A candidate rejected by the quality gate releases its members back to
//! the later layers. Iteration order is input order everywhere, so
//! identical input produces identical output; the parallel similarity
//! scans collect into index order before any decision is taken.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::annotate::{annotate, SemanticAnnotation};
use crate::config::Config;
use crate::error::{CloneMapError, Result};
use crate::schema::{CodeBlock, DuplicateGroup, SemanticCategory, SimilarityMethod};
use crate::similarity::quality::group_quality_score;
use crate::similarity::semantic::{
    are_semantically_compatible, intents_compatible, semantic_similarity, validate_duplicate_group,
    validate_group_pairs,
};
use crate::similarity::structural::{structural_similarity, MatchKind};

static CONTROL_FLOW: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
    regex::Regex::new(r"\b(?:if|else|for|while|switch|case|try|catch)\b").unwrap()
});
static WORD_TOKEN: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::Regex::new(r"\b\w+\b").unwrap());

/// Cooperative cancellation signal, checked at layer boundaries.
///
/// In-flight pairwise comparisons are not interrupted; cancellation takes
/// effect before the next layer starts.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CloneMapError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Basic complexity metrics for Layer 0
struct Complexity {
    line_count: usize,
    unique_tokens: usize,
    has_control_flow: bool,
}

fn code_complexity(source_code: &str) -> Complexity {
    let line_count = source_code
        .lines()
        .filter(|line| !line.trim().is_empty())
        .count();

    let unique_tokens = WORD_TOKEN
        .find_iter(source_code)
        .map(|m| m.as_str())
        .collect::<AHashSet<_>>()
        .len();

    Complexity {
        line_count,
        unique_tokens,
        has_control_flow: CONTROL_FLOW.is_match(source_code),
    }
}

/// Layer 0: reject blocks below the complexity floor.
///
/// Control flow waives the token minimum — a two-token `if` guard is
/// still worth grouping — but never the line minimum.
fn is_complex_enough(block: &CodeBlock, config: &Config) -> bool {
    let complexity = code_complexity(&block.source_code);

    if complexity.line_count < config.min_line_count {
        return false;
    }

    if complexity.unique_tokens < config.min_unique_tokens && !complexity.has_control_flow {
        return false;
    }

    true
}

fn member_names<'a>(blocks: &[&'a CodeBlock]) -> Vec<&'a str> {
    blocks
        .iter()
        .map(|b| b.function_name().unwrap_or(b.block_id.as_str()))
        .collect()
}

/// Quality-gate a candidate and emit it if accepted.
///
/// Layer 1 additionally runs the pairwise semantic checks here; Layers 2
/// and 3 validate during clustering. Returns whether the group was
/// accepted; on rejection the members stay available to later layers.
#[allow(clippy::too_many_arguments)]
fn try_accept_group(
    members: &[&CodeBlock],
    similarity_score: f64,
    method: SimilarityMethod,
    layer: &str,
    validate_semantics: bool,
    groups: &mut Vec<DuplicateGroup>,
    grouped_ids: &mut AHashSet<String>,
    config: &Config,
) -> bool {
    if members.len() < 2 {
        return false;
    }

    if validate_semantics {
        if let Err((left, right, reason)) = validate_group_pairs(members) {
            debug!(
                layer,
                %reason,
                %left,
                %right,
                members = ?member_names(members),
                "group rejected by semantic validation"
            );
            return false;
        }
    }

    let quality = group_quality_score(members, similarity_score, config);
    if quality < config.min_group_quality {
        debug!(
            layer,
            quality,
            min_quality = config.min_group_quality,
            members = ?member_names(members),
            "group rejected by quality gate"
        );
        return false;
    }

    debug!(
        layer,
        quality,
        similarity = similarity_score,
        members = ?member_names(members),
        "group accepted"
    );

    for block in members {
        grouped_ids.insert(block.block_id.clone());
    }
    groups.push(DuplicateGroup::from_blocks(members, similarity_score, method));
    true
}

/// Layer 1: bucket by content hash within a `(pattern_id, category)`
/// partition, preserving first-seen order.
fn exact_hash_buckets<'a>(blocks: &[&'a CodeBlock]) -> Vec<Vec<&'a CodeBlock>> {
    let mut index: AHashMap<(&str, &str, SemanticCategory), usize> = AHashMap::new();
    let mut buckets: Vec<Vec<&CodeBlock>> = Vec::new();

    for block in blocks {
        let key = (
            block.content_hash.as_str(),
            block.pattern_id.as_str(),
            block.category,
        );
        match index.get(&key) {
            Some(&slot) => buckets[slot].push(block),
            None => {
                index.insert(key, buckets.len());
                buckets.push(vec![block]);
            }
        }
    }

    buckets
}

/// Layer 2: greedy single-pass clustering on structural similarity.
///
/// For each unused seed, every later unused block is scored in parallel
/// (reads only, collected in index order), then accepted in order. A
/// block joining a candidate is consumed even if the candidate later
/// fails validation; the seed is consumed only when its group is emitted.
fn cluster_structural<'a>(
    blocks: &[&'a CodeBlock],
    threshold: f64,
    config: &Config,
) -> Vec<(Vec<&'a CodeBlock>, f64)> {
    let n = blocks.len();
    let mut used = vec![false; n];
    let mut clusters = Vec::new();

    for i in 0..n {
        if used[i] {
            continue;
        }
        let seed = blocks[i];

        let matches: Vec<(usize, f64)> = {
            let used_view = &used;
            ((i + 1)..n)
                .into_par_iter()
                .filter_map(|j| {
                    if used_view[j] {
                        return None;
                    }
                    let candidate = blocks[j];
                    if !are_semantically_compatible(seed, candidate, config) {
                        return None;
                    }
                    let result = structural_similarity(
                        &seed.source_code,
                        &candidate.source_code,
                        threshold,
                        config,
                    );
                    match result.kind {
                        MatchKind::Exact | MatchKind::Structural => Some((j, result.score)),
                        MatchKind::Different => None,
                    }
                })
                .collect()
        };

        let mut group = vec![seed];
        let mut similarities = Vec::new();
        for (j, score) in matches {
            group.push(blocks[j]);
            similarities.push(score);
            used[j] = true;
        }

        if group.len() >= 2 {
            if validate_duplicate_group(&group, config) {
                used[i] = true;
                let mean = similarities.iter().sum::<f64>() / similarities.len() as f64;
                clusters.push((group, mean));
            } else {
                debug!(
                    members = ?member_names(&group),
                    "structural cluster rejected by group validation"
                );
            }
        }
    }

    clusters
}

/// Layer 3: greedy clustering on weighted annotation similarity.
///
/// Pairs must share category and pattern, clear the semantic threshold,
/// and carry compatible operation intents. Candidate groups then pass the
/// same pairwise validation as Layer 2 — equivalent annotation sets still
/// hide opposite semantics (`Math.max` vs `Math.min` annotate
/// identically).
fn cluster_semantic<'a>(
    blocks: &[&'a CodeBlock],
    annotations: &[SemanticAnnotation],
    threshold: f64,
    config: &Config,
) -> Vec<(Vec<&'a CodeBlock>, f64)> {
    let n = blocks.len();
    let mut used = vec![false; n];
    let mut clusters = Vec::new();

    for i in 0..n {
        if used[i] {
            continue;
        }
        let seed = blocks[i];
        let seed_ann = &annotations[i];

        let mut group = vec![seed];
        let mut similarities = Vec::new();

        for j in (i + 1)..n {
            if used[j] {
                continue;
            }
            let candidate = blocks[j];
            if candidate.category != seed.category || candidate.pattern_id != seed.pattern_id {
                continue;
            }

            let similarity = semantic_similarity(seed_ann, &annotations[j]);
            if similarity >= threshold && intents_compatible(&seed_ann.intent, &annotations[j].intent)
            {
                group.push(candidate);
                similarities.push(similarity);
                used[j] = true;
            }
        }

        if group.len() >= 2 {
            if validate_duplicate_group(&group, config) {
                used[i] = true;
                let mean = similarities.iter().sum::<f64>() / similarities.len() as f64;
                clusters.push((group, mean));
            } else {
                debug!(
                    members = ?member_names(&group),
                    "semantic cluster rejected by group validation"
                );
            }
        }
    }

    clusters
}

/// Group code blocks with the multi-layer similarity algorithm.
///
/// Never fails on an individual block; the only error paths are
/// cancellation and internal invariant violations.
pub fn group_by_similarity(
    blocks: &[CodeBlock],
    config: &Config,
    cancel: &CancellationFlag,
) -> Result<Vec<DuplicateGroup>> {
    // Layer 0: complexity floor
    let complex_blocks: Vec<&CodeBlock> = blocks
        .iter()
        .filter(|b| is_complex_enough(b, config))
        .collect();
    let trivial = blocks.len() - complex_blocks.len();
    if trivial > 0 {
        info!(filtered = trivial, "layer 0 dropped trivial blocks");
    }

    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut grouped_ids: AHashSet<String> = AHashSet::new();

    // Layer 1: exact content hash
    cancel.checkpoint()?;
    for bucket in exact_hash_buckets(&complex_blocks) {
        if bucket.len() < 2 {
            continue;
        }
        debug!(
            hash = %bucket[0].content_hash,
            members = ?member_names(&bucket),
            "layer 1 exact candidate"
        );
        try_accept_group(
            &bucket,
            1.0,
            SimilarityMethod::ExactMatch,
            "layer 1",
            true,
            &mut groups,
            &mut grouped_ids,
            config,
        );
    }
    let layer1_count = groups.len();
    info!(groups = layer1_count, "layer 1 exact grouping done");

    // Layer 2: structural similarity over survivors
    cancel.checkpoint()?;
    let ungrouped: Vec<&CodeBlock> = complex_blocks
        .iter()
        .copied()
        .filter(|b| !grouped_ids.contains(&b.block_id))
        .collect();
    debug!(remaining = ungrouped.len(), "layer 2 input");

    for (members, score) in cluster_structural(&ungrouped, config.structural_threshold, config) {
        try_accept_group(
            &members,
            score,
            SimilarityMethod::Structural,
            "layer 2",
            false,
            &mut groups,
            &mut grouped_ids,
            config,
        );
    }
    let layer2_count = groups.len() - layer1_count;
    info!(groups = layer2_count, "layer 2 structural grouping done");

    // Layer 3: semantic similarity over the rest
    cancel.checkpoint()?;
    let ungrouped: Vec<&CodeBlock> = complex_blocks
        .iter()
        .copied()
        .filter(|b| !grouped_ids.contains(&b.block_id))
        .collect();
    debug!(remaining = ungrouped.len(), "layer 3 input");

    if !ungrouped.is_empty() {
        let annotations: Vec<SemanticAnnotation> =
            ungrouped.par_iter().map(|b| annotate(b)).collect();

        for (members, score) in cluster_semantic(
            &ungrouped,
            &annotations,
            config.semantic_similarity_threshold,
            config,
        ) {
            try_accept_group(
                &members,
                score,
                SimilarityMethod::Semantic,
                "layer 3",
                false,
                &mut groups,
                &mut grouped_ids,
                config,
            );
        }
    }
    let layer3_count = groups.len() - layer1_count - layer2_count;
    info!(groups = layer3_count, "layer 3 semantic grouping done");

    info!(total = groups.len(), "grouping complete");
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::testing::block;

    fn run(blocks: &[CodeBlock]) -> Vec<DuplicateGroup> {
        group_by_similarity(blocks, &Config::default(), &CancellationFlag::new())
            .expect("grouping should not fail")
    }

    #[test]
    fn test_exact_duplicates_grouped() {
        let blocks = vec![
            block("src/a.js", 1, 1, "JSON.stringify(data, null, 2)", "object-manipulation"),
            block("src/b.js", 9, 9, "JSON.stringify(data, null, 2)", "object-manipulation"),
        ];
        let groups = run(&blocks);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].similarity_method, SimilarityMethod::ExactMatch);
        assert!((groups[0].similarity_score - 1.0).abs() < 1e-9);
        assert_eq!(groups[0].occurrence_count, 2);
    }

    #[test]
    fn test_trivial_blocks_filtered() {
        // Two tokens, no control flow: below the default 3-token floor
        let blocks = vec![
            block("src/a.js", 1, 1, "return x;", "object-manipulation"),
            block("src/b.js", 2, 2, "return x;", "object-manipulation"),
        ];
        assert!(run(&blocks).is_empty());
    }

    #[test]
    fn test_control_flow_waives_token_floor() {
        // Only two unique tokens, but the `if` waives the token floor
        let blocks = vec![
            block("src/a.js", 1, 1, "if (x) x();", "validation"),
            block("src/b.js", 2, 2, "if (x) x();", "validation"),
        ];
        let groups = run(&blocks);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_opposite_logic_never_groups_exactly() {
        // Same collapsed hash is impossible here, but the pairwise check
        // also guards Layer 2 candidates with opposite operators.
        let blocks = vec![
            block("src/a.js", 1, 1, "const ready = env === 'prod' && flag;", "type-checking"),
            block("src/b.js", 2, 2, "const ready = env !== 'prod' && flag;", "type-checking"),
        ];
        assert!(run(&blocks).is_empty());
    }

    #[test]
    fn test_structural_grouping_of_renamed_code() {
        let blocks = vec![
            block(
                "src/a.js",
                1,
                5,
                "const total = prices.reduce((sum, p) => sum + p.amount, 0);",
                "array-map-filter",
            ),
            block(
                "src/b.js",
                10,
                14,
                "const result = values.reduce((acc, v) => acc + v.amount, 0);",
                "array-map-filter",
            ),
        ];
        let groups = run(&blocks);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].similarity_method, SimilarityMethod::Structural);
        assert!(groups[0].similarity_score >= 0.90);
    }

    #[test]
    fn test_different_patterns_never_group_structurally() {
        let blocks = vec![
            block("src/a.js", 1, 5, "const x = items.map(i => i.id);", "array-map-filter"),
            block("src/b.js", 1, 5, "const x = items.map(i => i.id);", "object-manipulation"),
        ];
        // Identical text but different rules: Layer 1 partitions by
        // pattern, Layer 2 requires compatibility.
        assert!(run(&blocks).is_empty());
    }

    #[test]
    fn test_semantic_grouping_by_annotations() {
        // Structurally distant (different shapes) but semantically both
        // filter+map over the same rule and category, spanning 5 lines so
        // the quality gate passes.
        let a = "const active = users.filter(u => u.active);\nconst names = active.map(u => u.name);\nreturn names;";
        let b = "const enabled = items.filter(function (i) { return i.enabled; });\nreturn enabled.map(function (i) { return i.label; });";
        let blocks = vec![
            block("src/a.js", 1, 5, a, "array-map-filter"),
            block("src/b.js", 10, 14, b, "array-map-filter"),
        ];
        let groups = run(&blocks);
        assert_eq!(groups.len(), 1);
        // Either structural or semantic depending on edit distance; both
        // are acceptable groupings for this pair.
        assert!(groups[0].similarity_score > 0.0);
    }

    #[test]
    fn test_group_members_share_pattern_and_category() {
        let blocks = vec![
            block("src/a.js", 1, 5, "const ids = rows.map(r => r.id);", "array-map-filter"),
            block("src/b.js", 1, 5, "const ids = rows.map(r => r.id);", "array-map-filter"),
            block("src/c.js", 1, 5, "const ids = rows.map(r => r.id);", "object-manipulation"),
        ];
        let groups = run(&blocks);
        for group in &groups {
            assert!(group.member_block_ids.len() >= 2);
        }
        // The object-manipulation block must not join the pair
        let all_members: Vec<_> = groups.iter().flat_map(|g| &g.member_block_ids).collect();
        assert!(!all_members.contains(&&blocks[2].block_id));
    }

    #[test]
    fn test_cancellation_stops_pipeline() {
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let blocks = vec![block("src/a.js", 1, 3, "if (x) { y(); }", "validation")];
        let result = group_by_similarity(&blocks, &Config::default(), &cancel);
        assert!(matches!(result, Err(CloneMapError::Cancelled)));
    }

    #[test]
    fn test_deterministic_output() {
        let blocks: Vec<CodeBlock> = (0..6)
            .map(|i| {
                block(
                    &format!("src/f{i}.js"),
                    1,
                    4,
                    "const ids = rows.filter(r => r.ok).map(r => r.id);",
                    "array-map-filter",
                )
            })
            .collect();
        let first = run(&blocks);
        let second = run(&blocks);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.member_block_ids, b.member_block_ids);
            assert_eq!(a.group_id, b.group_id);
        }
    }
}
