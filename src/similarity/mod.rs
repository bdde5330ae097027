//! Multi-layer similarity: structural comparison, semantic validation,
//! quality gating, and the grouping orchestrator.

pub mod grouping;
pub mod quality;
pub mod semantic;
pub mod structural;

pub use grouping::{group_by_similarity, CancellationFlag};
pub use quality::group_quality_score;
pub use semantic::{
    are_semantically_compatible, check_pair, intents_compatible, jaccard, semantic_similarity,
    validate_duplicate_group, RejectReason,
};
pub use structural::{semantic_penalty, structural_similarity, MatchKind, StructuralScore};
