//! Consolidation suggestions for duplicate groups
//!
//! Table-driven transformation of accepted groups into actionable
//! recommendations: a strategy tier chosen from category and spread, a
//! migration plan, and effort/risk/ROI estimates. Purely mechanical; all
//! judgment lives in the strategy table.

use serde::{Deserialize, Serialize};

use crate::schema::{DuplicateGroup, SemanticCategory};

/// Consolidation tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationStrategy {
    /// Utility within a single project
    LocalUtil,
    /// Shared library across a few projects
    SharedPackage,
    /// Tool-server abstraction for cross-project use
    McpServer,
    /// Complex orchestration beyond mechanical refactoring
    AutonomousAgent,
    /// Not worth consolidating
    NoAction,
}

/// Estimated implementation effort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationComplexity {
    Trivial,
    Simple,
    Moderate,
    Complex,
    VeryComplex,
}

/// Risk level for the migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationRisk {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

/// A single step in the migration path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationStep {
    pub step_number: usize,
    pub description: String,
    pub automated: bool,
    pub estimated_time: String,
}

/// Recommendation for consolidating one duplicate group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationSuggestion {
    pub suggestion_id: String,
    pub duplicate_group_id: String,
    pub strategy: ConsolidationStrategy,
    pub strategy_rationale: String,
    pub target_location: String,
    pub migration_steps: Vec<MigrationStep>,
    pub code_example: String,
    pub impact_score: f64,
    pub complexity: ImplementationComplexity,
    pub migration_risk: MigrationRisk,
    pub estimated_effort_hours: f64,
    pub breaking_changes: bool,
    pub affected_files_count: usize,
    pub affected_repositories_count: usize,
    pub confidence: f64,
    pub roi_score: f64,
    pub is_quick_win: bool,
}

/// Generate one suggestion per accepted group.
pub fn generate_suggestions(groups: &[DuplicateGroup]) -> Vec<ConsolidationSuggestion> {
    groups.iter().map(suggest_for_group).collect()
}

fn suggest_for_group(group: &DuplicateGroup) -> ConsolidationSuggestion {
    let (strategy, rationale, complexity, risk) = determine_strategy(group);
    let migration_steps = migration_steps(strategy);
    let code_example = code_example(group, strategy);
    let estimated_effort_hours = estimate_effort(group, complexity);
    let roi_score = roi(group.impact_score, complexity, risk);
    let breaking_changes = is_breaking_change(group, strategy);
    let impact_score = group.impact_score.min(100.0);

    let is_quick_win = impact_score >= 60.0
        && matches!(
            complexity,
            ImplementationComplexity::Trivial | ImplementationComplexity::Simple
        )
        && matches!(risk, MigrationRisk::Minimal | MigrationRisk::Low);

    ConsolidationSuggestion {
        suggestion_id: format!("cs_{}", group.group_id),
        duplicate_group_id: group.group_id.clone(),
        strategy,
        strategy_rationale: rationale,
        target_location: target_location(group, strategy),
        migration_steps,
        code_example,
        impact_score,
        complexity,
        migration_risk: risk,
        estimated_effort_hours,
        breaking_changes,
        affected_files_count: group.affected_files.len(),
        affected_repositories_count: group.affected_repositories.len(),
        confidence: if group.similarity_score >= 0.95 { 0.9 } else { 0.7 },
        roi_score,
        is_quick_win,
    }
}

/// Pick the consolidation tier from category and spread.
fn determine_strategy(
    group: &DuplicateGroup,
) -> (
    ConsolidationStrategy,
    String,
    ImplementationComplexity,
    MigrationRisk,
) {
    use ConsolidationStrategy::*;
    use ImplementationComplexity::*;
    use MigrationRisk::*;

    let occurrences = group.occurrence_count;
    let files = group.affected_files.len();

    // Everything in one file: extract a local helper and be done
    if files == 1 {
        return (
            LocalUtil,
            format!("All {occurrences} occurrences in same file - extract to local function"),
            Trivial,
            Minimal,
        );
    }

    match group.category {
        SemanticCategory::Logger | SemanticCategory::ConfigAccess => {
            if occurrences <= 5 {
                (
                    LocalUtil,
                    format!("Logger/config pattern used {occurrences} times - extract to module constant"),
                    Trivial,
                    Minimal,
                )
            } else {
                (
                    SharedPackage,
                    format!(
                        "Logger/config pattern used {occurrences} times across {files} files - centralize configuration"
                    ),
                    Simple,
                    Low,
                )
            }
        }
        SemanticCategory::ApiHandler | SemanticCategory::AuthCheck | SemanticCategory::ErrorHandler => {
            if occurrences <= 3 {
                (
                    LocalUtil,
                    format!("API pattern used {occurrences} times - extract to middleware/util"),
                    Simple,
                    Low,
                )
            } else if occurrences <= 10 {
                (
                    SharedPackage,
                    format!(
                        "API pattern used {occurrences} times across {files} files - create shared middleware"
                    ),
                    Moderate,
                    Medium,
                )
            } else {
                (
                    McpServer,
                    format!(
                        "API pattern used {occurrences} times - candidate for framework abstraction"
                    ),
                    Complex,
                    High,
                )
            }
        }
        SemanticCategory::DatabaseOperation => {
            if occurrences <= 3 {
                (
                    LocalUtil,
                    format!("Database pattern used {occurrences} times - extract to repository method"),
                    Moderate,
                    Medium,
                )
            } else {
                (
                    SharedPackage,
                    format!("Database pattern used {occurrences} times - create shared query builder"),
                    Complex,
                    High,
                )
            }
        }
        _ => {
            if occurrences <= 3 {
                (
                    LocalUtil,
                    format!(
                        "Utility pattern used {occurrences} times in {files} files - extract to local util"
                    ),
                    if files == 2 { Trivial } else { Simple },
                    Minimal,
                )
            } else if occurrences <= 8 {
                (
                    SharedPackage,
                    format!(
                        "Utility pattern used {occurrences} times across {files} files - create shared utility"
                    ),
                    Simple,
                    Low,
                )
            } else {
                (
                    McpServer,
                    format!(
                        "Utility pattern used {occurrences} times - consider a shared tool or package"
                    ),
                    Moderate,
                    Medium,
                )
            }
        }
    }
}

fn migration_steps(strategy: ConsolidationStrategy) -> Vec<MigrationStep> {
    let steps: &[(&str, bool, &str)] = match strategy {
        ConsolidationStrategy::LocalUtil | ConsolidationStrategy::NoAction => &[
            ("Create utility function in local utils module", true, "15min"),
            ("Extract common logic from duplicate blocks", false, "30min"),
            ("Replace each occurrence with function call", true, "20min"),
            ("Add unit tests for extracted function", false, "30min"),
            ("Run existing tests to verify behavior", true, "10min"),
        ],
        ConsolidationStrategy::SharedPackage => &[
            ("Create shared package/module for utility", false, "1h"),
            ("Extract and parameterize common logic", false, "1h"),
            ("Add comprehensive tests to shared package", false, "45min"),
            ("Update each file to import from shared package", true, "30min"),
            ("Replace duplicates with shared function calls", true, "30min"),
            ("Update dependency manifests", false, "15min"),
            ("Run full test suite across affected projects", true, "20min"),
        ],
        ConsolidationStrategy::McpServer => &[
            ("Design tool interface for the shared functionality", false, "2h"),
            ("Create server with tool implementation", false, "4h"),
            ("Add tool schema and documentation", false, "1h"),
            ("Test tool independently", false, "1h"),
            ("Update projects to use the client", false, "2h"),
            ("Replace duplicates with tool calls", true, "1h"),
            ("Add integration tests", false, "2h"),
            ("Document tool usage", false, "1h"),
        ],
        ConsolidationStrategy::AutonomousAgent => &[
            ("Define agent capabilities and workflow", false, "3h"),
            ("Design agent prompt and tool access", false, "2h"),
            ("Implement agent logic and orchestration", false, "8h"),
            ("Create agent tests and safety checks", false, "3h"),
            ("Integrate agent with existing systems", false, "4h"),
            ("Replace complex duplicate logic with agent calls", false, "2h"),
            ("Monitor agent performance and behavior", false, "ongoing"),
            ("Document agent usage and limitations", false, "2h"),
        ],
    };

    steps
        .iter()
        .enumerate()
        .map(|(i, (description, automated, time))| MigrationStep {
            step_number: i + 1,
            description: (*description).to_string(),
            automated: *automated,
            estimated_time: (*time).to_string(),
        })
        .collect()
}

fn code_example(group: &DuplicateGroup, strategy: ConsolidationStrategy) -> String {
    match strategy {
        ConsolidationStrategy::LocalUtil => {
            if group.category == SemanticCategory::Logger {
                "// Before:\nlogger.info({ userId }, 'User action');\nlogger.info({ userId }, 'User action');\n\n// After:\nconst logUserAction = (userId) => logger.info({ userId }, 'User action');\nlogUserAction(userId);\nlogUserAction(userId);"
                    .to_string()
            } else {
                "// Before: Duplicated code in multiple places\nfunction foo() {\n  // ... duplicate logic ...\n}\n\n// After: Extracted to utility function\nimport { sharedUtil } from './utils';\nfunction foo() {\n  sharedUtil();\n}"
                    .to_string()
            }
        }
        ConsolidationStrategy::SharedPackage => {
            "// Before: Duplicated across files\n// file1.js: { check logic }\n// file2.js: { check logic }\n\n// After: Shared package\nimport { validateInput } from '@shared/validators';\nvalidateInput(data);"
                .to_string()
        }
        ConsolidationStrategy::McpServer => {
            "// Before: Complex duplicated logic\nasync function processData() {\n  // ... complex logic ...\n}\n\n// After: Shared tool\nconst result = await tools.call('process-data', { input });"
                .to_string()
        }
        _ => "// Refactoring example not available".to_string(),
    }
}

fn target_location(group: &DuplicateGroup, strategy: ConsolidationStrategy) -> String {
    match strategy {
        ConsolidationStrategy::LocalUtil | ConsolidationStrategy::NoAction => {
            let first_file = group.affected_files.first().map(String::as_str).unwrap_or("");
            match first_file.rsplit_once('/') {
                Some((dir, _)) => format!("{dir}/utils.js"),
                None => "utils.js".to_string(),
            }
        }
        ConsolidationStrategy::SharedPackage => match group.category {
            SemanticCategory::Logger => "shared/logging/logger-utils.js".to_string(),
            SemanticCategory::ApiHandler | SemanticCategory::AuthCheck => {
                "shared/middleware/auth-middleware.js".to_string()
            }
            SemanticCategory::DatabaseOperation => "shared/database/query-builder.js".to_string(),
            SemanticCategory::Validator => "shared/validation/validators.js".to_string(),
            other => format!("shared/utils/{}.js", other.as_str()),
        },
        ConsolidationStrategy::McpServer => format!("mcp-servers/{}-server/", group.pattern_id),
        ConsolidationStrategy::AutonomousAgent => format!("agents/{}-agent/", group.pattern_id),
    }
}

/// ROI score: impact adjusted for how cheap and safe the refactor is.
fn roi(impact_score: f64, complexity: ImplementationComplexity, risk: MigrationRisk) -> f64 {
    let complexity_multiplier = match complexity {
        ImplementationComplexity::Trivial => 1.3,
        ImplementationComplexity::Simple => 1.1,
        ImplementationComplexity::Moderate => 0.9,
        ImplementationComplexity::Complex => 0.7,
        ImplementationComplexity::VeryComplex => 0.5,
    };
    let risk_multiplier = match risk {
        MigrationRisk::Minimal => 1.2,
        MigrationRisk::Low => 1.1,
        MigrationRisk::Medium => 0.9,
        MigrationRisk::High => 0.7,
        MigrationRisk::Critical => 0.5,
    };
    (impact_score * complexity_multiplier * risk_multiplier).min(100.0)
}

fn is_breaking_change(group: &DuplicateGroup, strategy: ConsolidationStrategy) -> bool {
    match strategy {
        ConsolidationStrategy::LocalUtil | ConsolidationStrategy::NoAction => false,
        ConsolidationStrategy::SharedPackage => matches!(
            group.category,
            SemanticCategory::ApiHandler | SemanticCategory::AuthCheck
        ),
        ConsolidationStrategy::McpServer | ConsolidationStrategy::AutonomousAgent => true,
    }
}

fn estimate_effort(group: &DuplicateGroup, complexity: ImplementationComplexity) -> f64 {
    let base_hours = match complexity {
        ImplementationComplexity::Trivial => 0.5,
        ImplementationComplexity::Simple => 1.0,
        ImplementationComplexity::Moderate => 3.0,
        ImplementationComplexity::Complex => 8.0,
        ImplementationComplexity::VeryComplex => 20.0,
    };
    // Per-file refactoring cost plus a testing pass
    let hours = base_hours + group.affected_files.len() as f64 * 0.25 + 0.5;
    (hours * 10.0).round() / 10.0
}
