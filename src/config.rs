//! Pipeline configuration
//!
//! All thresholds and penalties are read from environment variables once at
//! startup into an immutable `Config` value that is threaded explicitly
//! through the pipeline. Nothing here is global and nothing mutates after
//! construction.

use std::env;

/// Semantic consistency score when all members share category and pattern
pub const SEMANTIC_PERFECT_CONSISTENCY: f64 = 1.0;
/// Semantic consistency score when members share only the category
pub const SEMANTIC_SAME_CATEGORY: f64 = 0.7;
/// Semantic consistency score when members share only the pattern
pub const SEMANTIC_SAME_PATTERN: f64 = 0.5;
/// Semantic consistency score for mixed categories and patterns
pub const SEMANTIC_MIXED: f64 = 0.3;

/// Configuration for the multi-layer grouping pipeline
#[derive(Debug, Clone)]
pub struct Config {
    /// Emit per-layer decision logs (PIPELINE_DEBUG)
    pub debug: bool,

    // Layer 0: complexity filtering
    pub min_line_count: usize,
    pub min_unique_tokens: usize,

    // Layer 2: structural similarity
    pub structural_threshold: f64,

    // Unified semantic penalties
    pub opposite_logic_penalty: f64,
    pub status_code_penalty: f64,
    pub semantic_method_penalty: f64,

    // Method chain blending
    pub chain_weight_levenshtein: f64,
    pub chain_weight_chain: f64,

    // Layer 3: semantic similarity
    pub min_complexity_ratio: f64,
    pub semantic_similarity_threshold: f64,

    // Quality gate
    pub min_group_quality: f64,
    pub quality_weight_similarity: f64,
    pub quality_weight_size: f64,
    pub quality_weight_complexity: f64,
    pub quality_weight_semantic: f64,
    pub size_normalization: f64,
    pub complexity_normalization: f64,

    // Input ceilings
    pub max_pattern_matches: usize,
    pub max_matched_text_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            min_line_count: 1,
            min_unique_tokens: 3,
            structural_threshold: 0.90,
            opposite_logic_penalty: 0.80,
            status_code_penalty: 0.70,
            semantic_method_penalty: 0.75,
            chain_weight_levenshtein: 0.7,
            chain_weight_chain: 0.3,
            min_complexity_ratio: 0.5,
            semantic_similarity_threshold: 0.70,
            min_group_quality: 0.70,
            quality_weight_similarity: 0.4,
            quality_weight_size: 0.2,
            quality_weight_complexity: 0.2,
            quality_weight_semantic: 0.2,
            size_normalization: 4.0,
            complexity_normalization: 10.0,
            max_pattern_matches: 50_000,
            max_matched_text_bytes: 100_000,
        }
    }
}

impl Config {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            debug: env_flag("PIPELINE_DEBUG"),
            min_line_count: env_parse("MIN_LINE_COUNT", defaults.min_line_count),
            min_unique_tokens: env_parse("MIN_UNIQUE_TOKENS", defaults.min_unique_tokens),
            structural_threshold: env_parse("STRUCTURAL_THRESHOLD", defaults.structural_threshold),
            opposite_logic_penalty: env_parse(
                "OPPOSITE_LOGIC_PENALTY",
                defaults.opposite_logic_penalty,
            ),
            status_code_penalty: env_parse("STATUS_CODE_PENALTY", defaults.status_code_penalty),
            semantic_method_penalty: env_parse(
                "SEMANTIC_METHOD_PENALTY",
                defaults.semantic_method_penalty,
            ),
            chain_weight_levenshtein: env_parse(
                "CHAIN_WEIGHT_LEVENSHTEIN",
                defaults.chain_weight_levenshtein,
            ),
            chain_weight_chain: env_parse("CHAIN_WEIGHT_CHAIN", defaults.chain_weight_chain),
            min_complexity_ratio: env_parse("MIN_COMPLEXITY_RATIO", defaults.min_complexity_ratio),
            semantic_similarity_threshold: env_parse(
                "SEMANTIC_SIMILARITY_THRESHOLD",
                defaults.semantic_similarity_threshold,
            ),
            min_group_quality: env_parse("MIN_GROUP_QUALITY", defaults.min_group_quality),
            quality_weight_similarity: env_parse(
                "QUALITY_WEIGHT_SIMILARITY",
                defaults.quality_weight_similarity,
            ),
            quality_weight_size: env_parse("QUALITY_WEIGHT_SIZE", defaults.quality_weight_size),
            quality_weight_complexity: env_parse(
                "QUALITY_WEIGHT_COMPLEXITY",
                defaults.quality_weight_complexity,
            ),
            quality_weight_semantic: env_parse(
                "QUALITY_WEIGHT_SEMANTIC",
                defaults.quality_weight_semantic,
            ),
            size_normalization: env_parse("SIZE_NORMALIZATION", defaults.size_normalization),
            complexity_normalization: env_parse(
                "COMPLEXITY_NORMALIZATION",
                defaults.complexity_normalization,
            ),
            max_pattern_matches: defaults.max_pattern_matches,
            max_matched_text_bytes: defaults.max_matched_text_bytes,
        }
    }
}

fn env_flag(name: &str) -> bool {
    matches!(
        env::var(name).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
