//! End-to-end pipeline tests
//!
//! Drives the full stdin-document flow — ingest, group, suggest, report —
//! over literal JSON inputs and checks the grouping decisions the engine
//! must make, including the false-positive filters (opposite operators,
//! status codes, Math.max/min) and the determinism guarantee.

use clonemap::similarity::CancellationFlag;
use clonemap::{
    generate_suggestions, group_by_similarity, ingest_document, Config, DuplicateGroup,
    ScanReport, SimilarityMethod,
};

/// One (file, rule, text, line_start, line_end) match entry
type MatchSpec<'a> = (&'a str, &'a str, &'a str, usize, usize);

fn input_document(matches: &[MatchSpec]) -> String {
    let entries: Vec<String> = matches
        .iter()
        .map(|(file, rule, text, start, end)| {
            serde_json::json!({
                "file_path": file,
                "rule_id": rule,
                "matched_text": text,
                "line_start": start,
                "line_end": end,
            })
            .to_string()
        })
        .collect();
    format!(
        r#"{{"repository_info": {{"path": "/repo", "name": "demo"}}, "pattern_matches": [{}]}}"#,
        entries.join(",")
    )
}

fn run_pipeline(matches: &[MatchSpec]) -> Vec<DuplicateGroup> {
    let config = Config::default();
    let blocks = ingest_document(&input_document(matches), &config).expect("valid input");
    group_by_similarity(&blocks, &config, &CancellationFlag::new()).expect("grouping succeeds")
}

// ---------------------------------------------------------------------------
// False-positive filters
// ---------------------------------------------------------------------------

#[test]
fn max_and_min_variants_do_not_group() {
    let groups = run_pipeline(&[
        ("src/stats.js", "object-manipulation", "function findMax(arr){return Math.max(...arr);}", 1, 1),
        ("src/range.js", "object-manipulation", "function findMin(arr){return Math.min(...arr);}", 1, 1),
    ]);
    assert!(groups.is_empty(), "Math.max vs Math.min must not group");
}

#[test]
fn opposite_equality_checks_do_not_group() {
    let groups = run_pipeline(&[
        ("src/a.js", "env-variables", "process.env.NODE_ENV === 'production'", 3, 3),
        ("src/b.js", "env-variables", "process.env.NODE_ENV !== 'production'", 7, 7),
    ]);
    assert!(groups.is_empty(), "opposite operators must not group");
}

#[test]
fn different_status_codes_do_not_group() {
    let groups = run_pipeline(&[
        ("src/create.js", "express-route-handlers", "res.status(200).json({data:user})", 5, 5),
        ("src/update.js", "express-route-handlers", "res.status(201).json({data:data})", 9, 9),
    ]);
    assert!(groups.is_empty(), "differing HTTP codes must not group");
}

#[test]
fn extended_method_chain_does_not_group() {
    let groups = run_pipeline(&[
        ("src/list.js", "array-map-filter", "arr.filter(p).map(f)", 2, 2),
        ("src/sorted.js", "array-map-filter", "arr.filter(p).map(f).reverse()", 8, 8),
    ]);
    assert!(groups.is_empty(), "chain extension changes behavior");
}

// ---------------------------------------------------------------------------
// Positive groupings
// ---------------------------------------------------------------------------

#[test]
fn identical_snippets_group_as_exact_match() {
    let groups = run_pipeline(&[
        ("src/a.js", "object-manipulation", "JSON.stringify(data, null, 2)", 10, 10),
        ("src/b.js", "object-manipulation", "JSON.stringify(data, null, 2)", 20, 20),
    ]);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].similarity_method, SimilarityMethod::ExactMatch);
    assert!((groups[0].similarity_score - 1.0).abs() < 1e-9);
    assert_eq!(groups[0].occurrence_count, 2);
    assert_eq!(groups[0].affected_files, vec!["src/a.js", "src/b.js"]);
}

#[test]
fn renamed_filter_map_chains_group() {
    let groups = run_pipeline(&[
        (
            "src/users.js",
            "array-map-filter",
            "users.filter(u=>u.active).map(u=>u.name)",
            1,
            5,
        ),
        (
            "src/items.js",
            "array-map-filter",
            "items.filter(i=>i.enabled).map(i=>i.label)",
            10,
            14,
        ),
    ]);
    assert_eq!(groups.len(), 1, "isomorphic filter/map pair should group");
    let group = &groups[0];
    assert!(
        group.similarity_method == SimilarityMethod::Structural
            || group.similarity_method == SimilarityMethod::Semantic
    );
    assert!(group.similarity_score > 0.0 && group.similarity_score <= 1.0);
}

#[test]
fn whitespace_variants_share_a_content_hash() {
    let groups = run_pipeline(&[
        ("src/a.js", "validation", "if (!payload) { throw new Error('empty'); }", 1, 3),
        ("src/b.js", "validation", "if (!payload)  {  throw new Error('empty');  }", 9, 11),
    ]);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].similarity_method, SimilarityMethod::ExactMatch);
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn emitted_groups_satisfy_member_invariants() {
    let groups = run_pipeline(&[
        ("src/a.js", "array-map-filter", "rows.filter(r => r.ok).map(r => r.id)", 1, 4),
        ("src/b.js", "array-map-filter", "rows.filter(r => r.ok).map(r => r.id)", 1, 4),
        ("src/c.js", "array-map-filter", "cols.filter(c => c.ok).map(c => c.id)", 1, 4),
        ("src/d.js", "validation", "if (!ok) { throw new Error('nope'); }", 1, 3),
        ("src/e.js", "validation", "if (!ok) { throw new Error('nope'); }", 8, 10),
    ]);

    assert!(!groups.is_empty());
    for group in &groups {
        assert!(group.member_block_ids.len() >= 2);
        let mut unique = group.member_block_ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), group.member_block_ids.len(), "members distinct");
        assert!(group.similarity_score >= 0.0 && group.similarity_score <= 1.0);
        assert_eq!(group.occurrence_count, group.member_block_ids.len());
    }
}

#[test]
fn byte_identical_input_gives_byte_identical_output() {
    let matches: Vec<MatchSpec> = vec![
        ("src/a.js", "array-map-filter", "rows.filter(r => r.ok).map(r => r.id)", 1, 4),
        ("src/b.js", "array-map-filter", "rows.filter(r => r.ok).map(r => r.id)", 1, 4),
        ("src/c.js", "validation", "if (!ok) { throw new Error('nope'); }", 1, 3),
        ("src/d.js", "validation", "if (!ok) { throw new Error('nope'); }", 8, 10),
        ("src/e.js", "express-route-handlers", "res.status(200).json(out)", 2, 2),
    ];

    let render = || {
        let config = Config::default();
        let blocks = ingest_document(&input_document(&matches), &config).unwrap();
        let groups =
            group_by_similarity(&blocks, &config, &CancellationFlag::new()).unwrap();
        let suggestions = generate_suggestions(&groups);
        serde_json::to_string_pretty(&ScanReport::new(blocks, groups, suggestions)).unwrap()
    };

    assert_eq!(render(), render());
}

#[test]
fn quality_gate_bounds_every_accepted_group() {
    let config = Config::default();
    let blocks = ingest_document(
        &input_document(&[
            ("src/a.js", "array-map-filter", "rows.filter(r => r.ok).map(r => r.id)", 1, 4),
            ("src/b.js", "array-map-filter", "rows.filter(r => r.ok).map(r => r.id)", 1, 4),
        ]),
        &config,
    )
    .unwrap();
    let groups = group_by_similarity(&blocks, &config, &CancellationFlag::new()).unwrap();

    for group in &groups {
        // Reconstruct member blocks and re-score them through the gate
        let members: Vec<_> = blocks
            .iter()
            .filter(|b| group.member_block_ids.contains(&b.block_id))
            .collect();
        let quality =
            clonemap::similarity::group_quality_score(&members, group.similarity_score, &config);
        assert!(quality >= config.min_group_quality);
    }
}

// ---------------------------------------------------------------------------
// Report assembly
// ---------------------------------------------------------------------------

#[test]
fn report_metrics_reflect_groups_and_suggestions() {
    let config = Config::default();
    let blocks = ingest_document(
        &input_document(&[
            ("src/a.js", "object-manipulation", "JSON.stringify(data, null, 2)", 1, 4),
            ("src/b.js", "object-manipulation", "JSON.stringify(data, null, 2)", 1, 4),
            ("src/c.js", "object-manipulation", "unrelated(stuff, here, now)", 1, 4),
        ]),
        &config,
    )
    .unwrap();
    let groups = group_by_similarity(&blocks, &config, &CancellationFlag::new()).unwrap();
    let suggestions = generate_suggestions(&groups);
    let report = ScanReport::new(blocks, groups, suggestions);

    assert_eq!(report.metrics.total_code_blocks, 3);
    assert_eq!(report.metrics.total_duplicate_groups, 1);
    assert_eq!(report.metrics.exact_duplicates, 1);
    assert_eq!(report.metrics.total_suggestions, 1);
    assert_eq!(report.metrics.total_duplicated_lines, 8);
    assert_eq!(report.metrics.potential_loc_reduction, 4);
    // 8 duplicated lines across 12 block lines
    assert!((report.metrics.duplication_percentage - 66.67).abs() < 0.01);

    let json = serde_json::to_string(&report).unwrap();
    for key in [
        "code_blocks",
        "duplicate_groups",
        "suggestions",
        "metrics",
        "total_code_blocks",
        "duplication_percentage",
    ] {
        assert!(json.contains(key), "report JSON missing {key}");
    }
}

#[test]
fn oversized_input_is_rejected_before_grouping() {
    let mut matches = String::new();
    for i in 0..3 {
        if i > 0 {
            matches.push(',');
        }
        matches.push_str(&format!(
            r#"{{"file_path": "src/f{i}.js", "rule_id": "r", "matched_text": "x", "line_start": 1, "line_end": 1}}"#
        ));
    }
    let raw = format!(
        r#"{{"repository_info": {{"path": "/repo"}}, "pattern_matches": [{matches}]}}"#
    );

    let mut config = Config::default();
    config.max_pattern_matches = 2;
    let err = ingest_document(&raw, &config).unwrap_err();
    assert!(matches!(err, clonemap::CloneMapError::InputTooLarge { .. }));
}
