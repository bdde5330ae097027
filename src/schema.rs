//! Core data model for duplicate detection
//!
//! `CodeBlock` is one occurrence of a matched pattern in one source file;
//! `DuplicateGroup` is an accepted cluster of blocks deemed equivalent
//! under one similarity method. Both are immutable after construction:
//! blocks are built once during ingestion and groups once at acceptance,
//! with every derived metric computed up front.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::lang::Lang;

/// SHA-256 hex digest of a string
pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Content hash for exact duplicate detection: SHA-256 over
/// whitespace-collapsed source, truncated to 16 hex chars.
pub fn content_hash(source_code: &str) -> String {
    let collapsed = source_code.split_whitespace().collect::<Vec<_>>().join(" ");
    sha256_hex(&collapsed)[..16].to_string()
}

/// Semantic categorization of code blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticCategory {
    Utility,
    Helper,
    Validator,
    ApiHandler,
    AuthCheck,
    DatabaseOperation,
    ErrorHandler,
    Logger,
    ConfigAccess,
    FileOperation,
    AsyncPattern,
    Unknown,
}

impl SemanticCategory {
    /// Map a matcher rule ID to its semantic category.
    ///
    /// Unrecognized rules fall back to `Utility`, matching the matcher's
    /// default rule set where uncategorized patterns are generic helpers.
    pub fn from_rule_id(rule_id: &str) -> Self {
        match rule_id {
            "object-manipulation" | "array-map-filter" | "string-manipulation"
            | "type-checking" => Self::Utility,
            "validation" | "request-validation" => Self::Validator,
            "express-route-handlers" => Self::ApiHandler,
            "auth-checks" => Self::AuthCheck,
            "error-responses" => Self::ErrorHandler,
            "prisma-operations" | "query-builders" | "connection-handling" => {
                Self::DatabaseOperation
            }
            "await-patterns" | "promise-chains" => Self::AsyncPattern,
            "env-variables" | "config-objects" => Self::ConfigAccess,
            "console-statements" | "logger-patterns" => Self::Logger,
            "file-operations" => Self::FileOperation,
            _ => Self::Utility,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utility => "utility",
            Self::Helper => "helper",
            Self::Validator => "validator",
            Self::ApiHandler => "api_handler",
            Self::AuthCheck => "auth_check",
            Self::DatabaseOperation => "database_operation",
            Self::ErrorHandler => "error_handler",
            Self::Logger => "logger",
            Self::ConfigAccess => "config_access",
            Self::FileOperation => "file_operation",
            Self::AsyncPattern => "async_pattern",
            Self::Unknown => "unknown",
        }
    }
}

/// Precise location of code in a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Repository-relative path to the source file
    pub file_path: String,
    /// Starting line number (1-indexed)
    pub line_start: usize,
    /// Ending line number (1-indexed, >= line_start)
    pub line_end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_end: Option<usize>,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file_path, self.line_start)
    }
}

/// One occurrence of a matched pattern in one source file.
///
/// Created once from matcher output and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Stable identifier derived from `file_path:line_start`
    pub block_id: String,
    /// Matcher rule ID that produced this block
    pub pattern_id: String,
    /// Source location
    pub location: SourceLocation,
    /// Repository-relative path (mirror of `location.file_path`)
    pub relative_path: String,
    /// The literal matched text
    pub source_code: String,
    /// Language detected from the file extension
    pub language: Lang,
    /// Semantic category mapped from `pattern_id`
    pub category: SemanticCategory,
    /// Ordered tags; `function:<name>` marks enclosing function identity
    pub tags: Vec<String>,
    /// Absolute path of the scanned repository
    pub repository_path: String,
    /// Repository name, when the input supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    /// Git commit hash at scan time, when supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    /// Number of lines spanned by the match
    pub line_count: usize,
    /// Hash of whitespace-collapsed source (16 hex chars)
    pub content_hash: String,
}

impl CodeBlock {
    /// Enclosing function name, taken from the `function:` tag
    pub fn function_name(&self) -> Option<&str> {
        self.tags
            .iter()
            .find_map(|tag| tag.strip_prefix("function:"))
    }
}

/// Method used to determine similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMethod {
    /// Identical content hash
    ExactMatch,
    /// Same normalized structure
    Structural,
    /// Equivalent semantic annotations
    Semantic,
}

impl SimilarityMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactMatch => "exact_match",
            Self::Structural => "structural",
            Self::Semantic => "semantic",
        }
    }
}

/// Consolidation priority derived from impact score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl PriorityLevel {
    /// Priority thresholds: critical >= 75, high >= 50, medium >= 25
    pub fn from_impact(impact_score: f64) -> Self {
        if impact_score >= 75.0 {
            Self::Critical
        } else if impact_score >= 50.0 {
            Self::High
        } else if impact_score >= 25.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// An accepted cluster of >= 2 equivalent code blocks.
///
/// Members are referenced by `block_id`; all members share `pattern_id`,
/// `category`, and `language`. Never mutated after acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Identifier derived from the first member's content hash
    pub group_id: String,
    /// Matcher rule shared by every member
    pub pattern_id: String,
    /// IDs of member blocks (>= 2, unique)
    pub member_block_ids: Vec<String>,
    /// Similarity score in [0, 1]
    pub similarity_score: f64,
    /// How the similarity was established
    pub similarity_method: SimilarityMethod,
    /// Category shared by every member
    pub category: SemanticCategory,
    /// Language shared by every member
    pub language: Lang,
    /// Number of member blocks
    pub occurrence_count: usize,
    /// Sum of member line counts
    pub total_lines: usize,
    /// Deduplicated, sorted file paths
    pub affected_files: Vec<String>,
    /// Deduplicated, sorted repository paths
    pub affected_repositories: Vec<String>,
    /// Lines removable by keeping one instance
    pub deduplication_potential: usize,
    /// Consolidation impact score in [0, 100]
    pub impact_score: f64,
    /// Priority bucket derived from impact
    pub priority_level: PriorityLevel,
    /// Whether members span more than one repository
    pub is_cross_repository: bool,
}

impl DuplicateGroup {
    /// Build a group from its member blocks.
    ///
    /// The caller guarantees `blocks.len() >= 2` with members that share
    /// pattern, category, and language; a shorter slice is a programming
    /// bug upstream in the grouping layers.
    pub fn from_blocks(
        blocks: &[&CodeBlock],
        similarity_score: f64,
        similarity_method: SimilarityMethod,
    ) -> Self {
        debug_assert!(blocks.len() >= 2, "duplicate group needs >= 2 members");

        let first = blocks[0];
        let occurrence_count = blocks.len();
        let total_lines: usize = blocks.iter().map(|b| b.line_count).sum();

        let affected_files: Vec<String> = blocks
            .iter()
            .map(|b| b.location.file_path.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let affected_repositories: Vec<String> = blocks
            .iter()
            .map(|b| b.repository_path.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let deduplication_potential = if occurrence_count > 1 {
            let avg = total_lines as f64 / occurrence_count as f64;
            ((occurrence_count - 1) as f64 * avg) as usize
        } else {
            0
        };

        let impact_score = Self::compute_impact(occurrence_count, similarity_score, total_lines);
        let priority_level = PriorityLevel::from_impact(impact_score);
        let is_cross_repository = affected_repositories.len() > 1;

        Self {
            group_id: format!("dg_{}", &first.content_hash[..12]),
            pattern_id: first.pattern_id.clone(),
            member_block_ids: blocks.iter().map(|b| b.block_id.clone()).collect(),
            similarity_score,
            similarity_method,
            category: first.category,
            language: first.language,
            occurrence_count,
            total_lines,
            affected_files,
            affected_repositories,
            deduplication_potential,
            impact_score,
            priority_level,
            is_cross_repository,
        }
    }

    /// Consolidation impact on a 0-100 scale.
    ///
    /// Weighted: 40% occurrence factor (capped at 20 occurrences), 35%
    /// similarity, 25% LOC factor (capped at 100 lines). Rounded to two
    /// decimals.
    fn compute_impact(occurrences: usize, similarity: f64, total_lines: usize) -> f64 {
        let occurrence_factor = (occurrences as f64 / 20.0).min(1.0);
        let loc_factor = (total_lines as f64 / 100.0).min(1.0);
        let score = occurrence_factor * 40.0 + similarity * 35.0 + loc_factor * 25.0;
        (score * 100.0).round() / 100.0
    }
}
