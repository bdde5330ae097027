//! Input ingestion: parse, validate, and extract code blocks
//!
//! Consumes the matcher's JSON document (repository info plus raw pattern
//! matches), enforces the input ceilings, and produces validated,
//! deduplicated [`CodeBlock`]s for the grouping engine. Validation
//! failures abort the pipeline with a distinct exit code; a single bad
//! match is logged and skipped, never fatal.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{CloneMapError, Result};
use crate::lang::Lang;
use crate::schema::{content_hash, sha256_hex, CodeBlock, SemanticCategory, SourceLocation};

const MAX_REPO_PATH_LEN: usize = 1000;
const MAX_FILE_PATH_LEN: usize = 500;
const MAX_RULE_ID_LEN: usize = 100;
const MAX_LINE_NUMBER: usize = 1_000_000;

/// How many lines above a match the function-name fallback searches
const FALLBACK_LOOKBACK_LINES: usize = 10;

/// The top-level input document. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
pub struct InputDocument {
    pub repository_info: RepositoryInfo,
    pub pattern_matches: Vec<PatternMatch>,
}

/// Repository metadata supplied by the scanner
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryInfo {
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub git_remote: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub git_commit: Option<String>,
}

/// One raw match from the external AST pattern matcher
#[derive(Debug, Clone, Deserialize)]
pub struct PatternMatch {
    pub file_path: String,
    pub rule_id: String,
    pub matched_text: String,
    pub line_start: usize,
    pub line_end: usize,
    #[serde(default)]
    pub column_start: Option<usize>,
    #[serde(default)]
    pub column_end: Option<usize>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

static FUNCTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"function\s{1,20}(\w+)\s{0,20}\(",
        r"const\s{1,20}(\w+)\s{0,20}=\s{0,20}(?:async\s{1,20})?function",
        r"const\s{1,20}(\w+)\s{0,20}=\s{0,20}(?:async\s{1,20})?\(",
        r"let\s{1,20}(\w+)\s{0,20}=\s{0,20}(?:async\s{1,20})?function",
        r"let\s{1,20}(\w+)\s{0,20}=\s{0,20}(?:async\s{1,20})?\(",
        r"var\s{1,20}(\w+)\s{0,20}=\s{0,20}(?:async\s{1,20})?function",
        r"var\s{1,20}(\w+)\s{0,20}=\s{0,20}(?:async\s{1,20})?\(",
        r"async\s{1,20}function\s{1,20}(\w+)\s{0,20}\(",
        r"(\w+)\s{0,20}:\s{0,20}function",
        r"(\w+)\s{0,20}:\s{0,20}async\s{1,20}function",
        r"export\s{1,20}function\s{1,20}(\w+)",
        r"export\s{1,20}const\s{1,20}(\w+)\s{0,20}=",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid function pattern"))
    .collect()
});

/// Parse the raw input text into a document, without validation.
pub fn parse_document(raw: &str) -> Result<InputDocument> {
    serde_json::from_str(raw).map_err(|e| CloneMapError::ParseFailure {
        message: e.to_string(),
    })
}

/// Validate the document against the input ceilings and path rules.
fn validate_document(doc: &InputDocument, config: &Config) -> Result<()> {
    let repo_path = &doc.repository_info.path;
    if repo_path.is_empty() || repo_path.len() > MAX_REPO_PATH_LEN {
        return Err(CloneMapError::InvalidInput {
            message: format!(
                "repository path length must be 1..={MAX_REPO_PATH_LEN}, got {}",
                repo_path.len()
            ),
        });
    }

    if doc.pattern_matches.len() > config.max_pattern_matches {
        return Err(CloneMapError::InputTooLarge {
            message: format!(
                "{} pattern matches exceed the ceiling of {}",
                doc.pattern_matches.len(),
                config.max_pattern_matches
            ),
        });
    }

    for (index, m) in doc.pattern_matches.iter().enumerate() {
        validate_match(index, m, config)?;
    }

    Ok(())
}

fn validate_match(index: usize, m: &PatternMatch, config: &Config) -> Result<()> {
    let fail = |message: String| Err(CloneMapError::InvalidInput { message });

    if m.file_path.is_empty() || m.file_path.len() > MAX_FILE_PATH_LEN {
        return fail(format!(
            "match {index}: file_path length must be 1..={MAX_FILE_PATH_LEN}"
        ));
    }
    if m.file_path.starts_with('/') {
        return fail(format!("match {index}: file_path must be relative"));
    }
    if m.file_path
        .split(['/', '\\'])
        .any(|component| component == "..")
    {
        return fail(format!("match {index}: file_path must not contain '..'"));
    }

    if m.rule_id.is_empty() || m.rule_id.len() > MAX_RULE_ID_LEN {
        return fail(format!(
            "match {index}: rule_id length must be 1..={MAX_RULE_ID_LEN}"
        ));
    }

    if m.matched_text.len() > config.max_matched_text_bytes {
        return Err(CloneMapError::InputTooLarge {
            message: format!(
                "match {index}: matched_text exceeds {} bytes",
                config.max_matched_text_bytes
            ),
        });
    }

    if m.line_start < 1 || m.line_start > MAX_LINE_NUMBER {
        return fail(format!(
            "match {index}: line_start must be 1..={MAX_LINE_NUMBER}"
        ));
    }
    if m.line_end < m.line_start || m.line_end > MAX_LINE_NUMBER {
        return fail(format!(
            "match {index}: line_end must be line_start..={MAX_LINE_NUMBER}"
        ));
    }

    if let Some(confidence) = m.confidence {
        if !(0.0..=1.0).contains(&confidence) {
            return fail(format!("match {index}: confidence must be within [0, 1]"));
        }
    }

    Ok(())
}

/// Try to extract the enclosing function name from the matched text.
fn function_name_from_source(source: &str) -> Option<String> {
    FUNCTION_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(source))
        .map(|caps| caps[1].to_string())
}

/// Fallback: read the source file once and search backwards from the
/// match for the closest function declaration above it.
///
/// Reads at most one file per failing block and never retries; any read
/// failure downgrades to a warning and the block simply stays unnamed.
fn function_name_from_file(repo_path: &str, file_path: &str, line_start: usize) -> Option<String> {
    let full_path = Path::new(repo_path).join(file_path);
    let contents = match fs::read_to_string(&full_path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(
                path = %full_path.display(),
                error = %e,
                "could not read file for function-name fallback"
            );
            return None;
        }
    };

    let lines: Vec<&str> = contents.lines().collect();
    let end = line_start.min(lines.len());
    let start = end.saturating_sub(FALLBACK_LOOKBACK_LINES + 1);

    // Walk backwards so the closest declaration above the match wins
    for line in lines[start..end].iter().rev() {
        if let Some(name) = function_name_from_source(line) {
            return Some(name);
        }
    }

    None
}

/// Build a `CodeBlock` from one validated pattern match.
fn build_block(m: &PatternMatch, repo: &RepositoryInfo) -> CodeBlock {
    let block_id = format!(
        "cb_{}",
        &sha256_hex(&format!("{}:{}", m.file_path, m.line_start))[..12]
    );

    let function_name = function_name_from_source(&m.matched_text)
        .or_else(|| function_name_from_file(&repo.path, &m.file_path, m.line_start));

    let tags = function_name
        .map(|name| vec![format!("function:{name}")])
        .unwrap_or_default();

    CodeBlock {
        block_id,
        pattern_id: m.rule_id.clone(),
        location: SourceLocation {
            file_path: m.file_path.clone(),
            line_start: m.line_start,
            line_end: m.line_end,
            column_start: m.column_start,
            column_end: m.column_end,
        },
        relative_path: m.file_path.clone(),
        source_code: m.matched_text.clone(),
        language: Lang::from_path(Path::new(&m.file_path)),
        category: SemanticCategory::from_rule_id(&m.rule_id),
        tags,
        repository_path: repo.path.clone(),
        repository_name: repo.name.clone(),
        git_commit: repo.git_commit.clone(),
        line_count: m.line_end - m.line_start + 1,
        content_hash: content_hash(&m.matched_text),
    }
}

/// Remove duplicate blocks from the same location or function.
///
/// The matcher can hit the same function several times; only the
/// earliest match per `file:function` survives. Blocks without a
/// function name fall back to `file:line` deduplication.
fn deduplicate_blocks(blocks: Vec<CodeBlock>) -> Vec<CodeBlock> {
    let mut by_function: ahash::AHashMap<String, usize> = ahash::AHashMap::new();
    let mut seen_locations: ahash::AHashSet<String> = ahash::AHashSet::new();
    let mut unique: Vec<Option<CodeBlock>> = Vec::new();

    for block in blocks {
        match block.function_name().map(str::to_string) {
            Some(function) => {
                let key = format!("{}:{}", block.location.file_path, function);
                match by_function.get(&key) {
                    None => {
                        by_function.insert(key, unique.len());
                        unique.push(Some(block));
                    }
                    Some(&slot) => {
                        let keep_new = unique[slot]
                            .as_ref()
                            .is_some_and(|existing| {
                                block.location.line_start < existing.location.line_start
                            });
                        if keep_new {
                            unique[slot] = Some(block);
                        } else {
                            debug!(%key, "dropped later match of same function");
                        }
                    }
                }
            }
            None => {
                let key = format!("{}:{}", block.location.file_path, block.location.line_start);
                if seen_locations.insert(key) {
                    unique.push(Some(block));
                }
            }
        }
    }

    unique.into_iter().flatten().collect()
}

/// Full ingestion: parse, validate, extract, deduplicate.
pub fn ingest_document(raw: &str, config: &Config) -> Result<Vec<CodeBlock>> {
    let doc = parse_document(raw)?;
    validate_document(&doc, config)?;

    let blocks: Vec<CodeBlock> = doc
        .pattern_matches
        .iter()
        .map(|m| build_block(m, &doc.repository_info))
        .collect();
    debug!(blocks = blocks.len(), "extracted code blocks");

    let unique = deduplicate_blocks(blocks);
    debug!(blocks = unique.len(), "after deduplication");
    Ok(unique)
}
