//! clonemap: multi-layer duplicate code detection
//!
//! Takes a stream of pattern matches from an external AST-search tool and
//! returns validated duplicate groups with consolidation suggestions.
//! Grouping runs in layers of rising looseness:
//!
//! 1. **Layer 0**: complexity filter — trivial blocks never group
//! 2. **Layer 1**: exact content hashing, with semantic validation
//! 3. **Layer 2**: structural similarity over normalized code, attenuated
//!    by semantic penalties (status codes, operators, method semantics)
//! 4. **Layer 3**: semantic-tag equivalence via weighted Jaccard
//! 5. **Quality gate**: composite score over similarity, size,
//!    complexity, and consistency
//!
//! # Example
//!
//! ```ignore
//! use clonemap::{group_by_similarity, ingest_document, CancellationFlag, Config};
//!
//! let config = Config::from_env();
//! let blocks = ingest_document(&input_json, &config)?;
//! let groups = group_by_similarity(&blocks, &config, &CancellationFlag::new())?;
//! ```

pub mod annotate;
pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod lang;
pub mod normalize;
pub mod report;
pub mod schema;
pub mod similarity;
pub mod suggest;

pub use annotate::{annotate, SemanticAnnotation};
pub use cli::{Cli, OutputFormat};
pub use config::Config;
pub use error::{CloneMapError, Result};
pub use features::{extract_method_chain, extract_semantic_features, SemanticFeatures};
pub use ingest::{ingest_document, InputDocument, PatternMatch, RepositoryInfo};
pub use lang::Lang;
pub use normalize::{normalize, NormalizedCode};
pub use report::{ScanMetrics, ScanReport};
pub use schema::{
    content_hash, CodeBlock, DuplicateGroup, PriorityLevel, SemanticCategory, SimilarityMethod,
    SourceLocation,
};
pub use similarity::{
    group_by_similarity, structural_similarity, CancellationFlag, MatchKind, StructuralScore,
};
pub use suggest::{generate_suggestions, ConsolidationStrategy, ConsolidationSuggestion};
