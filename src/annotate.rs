//! Semantic annotation of code blocks
//!
//! Extracts rich semantic metadata to enable Layer 3 (semantic
//! similarity) grouping. Tags fall into four dictionaries:
//!
//! - **Operations**: what the code does (filter, map, validate, fetch, ...)
//! - **Domains**: what concepts are involved (user, auth, payment, ...)
//! - **Patterns**: what code patterns appear (guard_clause, null_check, ...)
//! - **Data types**: what data is processed (array, object, promise, ...)
//!
//! Every dictionary is compiled exactly once at first use and shared
//! read-only; the annotator runs across every ungrouped block, so
//! per-call compilation would dominate the pipeline. All repetitions are
//! bounded (`\s{0,20}`) to preclude catastrophic backtracking.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;

use crate::schema::{CodeBlock, SemanticCategory};

/// Rich semantic metadata for one code block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticAnnotation {
    pub category: SemanticCategory,
    pub operations: BTreeSet<String>,
    pub domains: BTreeSet<String>,
    pub patterns: BTreeSet<String>,
    pub data_types: BTreeSet<String>,
    /// Compact summary: `"<ops>|on:<domains>|with:<patterns>"`
    pub intent: String,
}

impl SemanticAnnotation {
    /// All semantic tags as a single set
    pub fn all_tags(&self) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        tags.extend(self.operations.iter().cloned());
        tags.extend(self.domains.iter().cloned());
        tags.extend(self.patterns.iter().cloned());
        tags.extend(self.data_types.iter().cloned());
        tags
    }
}

type Dictionary = Vec<(Regex, &'static str)>;

fn compile(patterns: &[(&str, &'static str)], case_insensitive: bool) -> Dictionary {
    patterns
        .iter()
        .map(|(pattern, tag)| {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
                .unwrap_or_else(|e| panic!("invalid annotation pattern {pattern:?}: {e}"));
            (regex, *tag)
        })
        .collect()
}

/// Array, CRUD, transformation, and validation operations
static OPERATION_PATTERNS: Lazy<Dictionary> = Lazy::new(|| {
    compile(
        &[
            // Array/collection operations
            (r"\.filter\s{0,20}\(", "filter"),
            (r"\.map\s{0,20}\(", "map"),
            (r"\.reduce\s{0,20}\(", "reduce"),
            (r"\.find\s{0,20}\(", "find"),
            (r"\.findIndex\s{0,20}\(", "find"),
            (r"\.some\s{0,20}\(", "some"),
            (r"\.every\s{0,20}\(", "every"),
            (r"\.sort\s{0,20}\(", "sort"),
            (r"\.includes\s{0,20}\(", "includes"),
            (r"\.indexOf\s{0,20}\(", "find"),
            (r"\.forEach\s{0,20}\(", "iterate"),
            (r"for\s{0,20}\(\s{0,20}(?:const|let|var)\s{1,20}\w+\s{1,20}(?:of|in)", "iterate"),
            (r"for\s{0,20}\(\s{0,20}(?:let|var)\s{1,20}\w+\s{0,20}=", "iterate"),
            (r"while\s{0,20}\(", "iterate"),
            (r"\.flat\s{0,20}\(", "flatten"),
            (r"\.flatMap\s{0,20}\(", "flatten"),
            (r"\.concat\s{0,20}\(", "concat"),
            (r"\.slice\s{0,20}\(", "slice"),
            (r"\.splice\s{0,20}\(", "splice"),
            (r"\.push\s{0,20}\(", "append"),
            (r"\.pop\s{0,20}\(", "remove"),
            (r"\.shift\s{0,20}\(", "remove"),
            (r"\.unshift\s{0,20}\(", "prepend"),
            // CRUD/data operations
            (r"\.(?:get|fetch|read|load|retrieve)\s{0,20}\(", "read"),
            (r"\.(?:post|create|insert|add|save|write)\s{0,20}\(", "create"),
            (r"\.(?:put|update|patch|modify|set)\s{0,20}\(", "update"),
            (r"\.(?:delete|remove|destroy|clear)\s{0,20}\(", "delete"),
            (r"\bfetch\s{0,20}\(", "fetch"),
            (r"axios\.(?:get|post|put|patch|delete)\s{0,20}\(", "fetch"),
            (r"http\.(?:get|post|put|patch|delete)\s{0,20}\(", "fetch"),
            // Transformations
            (r"JSON\.parse\s{0,20}\(", "parse"),
            (r"JSON\.stringify\s{0,20}\(", "serialize"),
            (r"\.toString\s{0,20}\(", "transform"),
            (r"\.toUpperCase\s{0,20}\(", "transform"),
            (r"\.toLowerCase\s{0,20}\(", "transform"),
            (r"\.trim\s{0,20}\(", "transform"),
            (r"\.split\s{0,20}\(", "split"),
            (r"\.join\s{0,20}\(", "join"),
            (r"\.replace\s{0,20}\(", "replace"),
            (r"parseInt\s{0,20}\(", "parse"),
            (r"parseFloat\s{0,20}\(", "parse"),
            (r"Number\s{0,20}\(", "transform"),
            (r"String\s{0,20}\(", "transform"),
            (r"Boolean\s{0,20}\(", "transform"),
            (r"Object\.keys\s{0,20}\(", "extract"),
            (r"Object\.values\s{0,20}\(", "extract"),
            (r"Object\.entries\s{0,20}\(", "extract"),
            (r"Object\.assign\s{0,20}\(", "merge"),
            (r"\.\.\.\w+", "spread"),
            // Validation
            (r"(?:validate|isValid|check|verify|assert)\s{0,20}\(", "validate"),
            (r"\.test\s{0,20}\(", "validate"),
            (r"\.match\s{0,20}\(", "validate"),
            (r"schema\.(?:validate|parse|safeParse)\s{0,20}\(", "validate"),
            (r"z\.\w+\s{0,20}\(", "validate"),
            (r"joi\.\w+", "validate"),
            (r"yup\.\w+", "validate"),
        ],
        true,
    )
});

/// Domain concepts, matched over code and tags
static DOMAIN_PATTERNS: Lazy<Dictionary> = Lazy::new(|| {
    compile(
        &[
            (r"\b(?:user|users|account|accounts|profile|profiles|member)\b", "user"),
            (
                r"\b(?:auth|authentication|login|logout|signin|signout|token|session|jwt|oauth|password|credential|secret|apikey|api_key)\b",
                "auth",
            ),
            (r"\b(?:payment|charge|invoice|billing|subscription|stripe|paypal)\b", "payment"),
            (r"\b(?:order|orders|cart|checkout|purchase)\b", "commerce"),
            (r"\b(?:email|mail|notification|alert|notify|message|sms)\b", "notification"),
            (r"\b(?:file|files|upload|download|attachment|blob|storage)\b", "file"),
            (r"\b(?:database|db|query|record|table|collection|document)\b", "database"),
            (r"\b(?:prisma|mongoose|sequelize|typeorm|knex)\b", "database"),
            (r"\b(?:cache|redis|memcached|cached)\b", "cache"),
            (r"\b(?:queue|job|jobs|worker|task|tasks|bull|rabbitmq)\b", "queue"),
            (r"\b(?:api|endpoint|route|routes|request|response|req|res)\b", "api"),
            (r"\b(?:webhook|webhooks|callback|hook)\b", "webhook"),
            (r"\b(?:event|events|emit|publish|subscribe|listener)\b", "event"),
            (r"\b(?:log|logs|logger|logging|trace|debug|info|warn|error)\b", "logging"),
            (r"\b(?:config|configuration|settings|options|env|environment)\b", "config"),
            (
                r"\b(?:test|tests|spec|describe)\b|\bit\s{0,20}\(|\bexpect\s{0,20}\(",
                "test",
            ),
        ],
        true,
    )
});

/// Code patterns (guard clauses, error handling, async shapes, ...)
static CODE_PATTERN_PATTERNS: Lazy<Dictionary> = Lazy::new(|| {
    compile(
        &[
            // Guard clause / early return
            (r"if\s{0,20}\([^)]{0,200}\)\s{0,20}(?:return|throw)", "guard_clause"),
            (r"if\s{0,20}\(\s{0,20}!\s{0,20}\w+\s{0,20}\)\s{0,20}(?:return|throw)", "guard_clause"),
            // Null/undefined checks
            (r"===?\s{0,20}null\b", "null_check"),
            (r"!==?\s{0,20}null\b", "null_check"),
            (r"===?\s{0,20}undefined\b", "null_check"),
            (r"!==?\s{0,20}undefined\b", "null_check"),
            (r"\?\?", "null_check"),
            (r"\?\s{0,20}\.", "null_check"),
            (r#"typeof\s{1,20}\w+\s{0,20}[!=]==?\s{0,20}["']undefined["']"#, "null_check"),
            // Error handling
            (r"try\s{0,20}\{", "error_handling"),
            (r"catch\s{0,20}\(", "error_handling"),
            (r"\.catch\s{0,20}\(", "error_handling"),
            (r"finally\s{0,20}\{", "error_handling"),
            (r"throw\s{1,20}new\s{1,20}\w{0,50}Error", "error_handling"),
            // Retry logic
            (r"retry|retries|attempts|maxAttempts|backoff", "retry_logic"),
            // Timeout handling
            (r"timeout|setTimeout|setInterval|clearTimeout|clearInterval", "timeout"),
            // Async patterns
            (r"async\s{1,20}", "async_await"),
            (r"await\s{1,20}", "async_await"),
            (r"\.then\s{0,20}\(", "promise_chain"),
            (r"Promise\.(?:all|race|allSettled|any)\s{0,20}\(", "promise_composition"),
            (r"new\s{1,20}Promise\s{0,20}\(", "promise_creation"),
            // Caching
            (r"cache\.(?:get|set|has|delete)", "caching"),
            (r"memoize|memo|cached", "caching"),
            // Pagination
            (r"\b(?:page|pages|offset|limit|cursor|skip|take)\b", "pagination"),
            // Batching
            (r"\b(?:batch|batches|chunk|chunks)\b", "batching"),
            // Streaming
            (r"\b(?:stream|streams|pipe|readable|writable)\b", "streaming"),
            // Locking
            (r"\b(?:lock|unlock|mutex|semaphore)\b", "locking"),
            // Rate limiting
            (r"\b(?:rateLimit|throttle|debounce)\b", "rate_limiting"),
        ],
        true,
    )
});

/// Data types, matched case-sensitively
static DATA_TYPE_PATTERNS: Lazy<Dictionary> = Lazy::new(|| {
    compile(
        &[
            // Array
            (r"\[\s{0,20}\]", "array"),
            (r"\bArray\b", "array"),
            (r"\.length\b", "array"),
            (r"Array\.isArray\s{0,20}\(", "array"),
            (r"\.push\s{0,20}\(", "array"),
            // Object
            (r"\{\s{0,20}\}", "object"),
            (r"\bObject\b", "object"),
            (r"\.keys\s{0,20}\(", "object"),
            (r"\.values\s{0,20}\(", "object"),
            (r"\.entries\s{0,20}\(", "object"),
            (r"\.hasOwnProperty\s{0,20}\(", "object"),
            // String
            (r#"["'][^"']{0,500}["']"#, "string"),
            (r"`[^`]{0,500}`", "string"),
            (r"\.toString\s{0,20}\(", "string"),
            (r"\.trim\s{0,20}\(", "string"),
            (r"\.substring\s{0,20}\(", "string"),
            (r"\.substr\s{0,20}\(", "string"),
            // Number
            (r"\b\d{1,20}\.?\d{0,20}\b", "number"),
            (r"Number\s{0,20}\(", "number"),
            (r"parseInt\s{0,20}\(", "number"),
            (r"parseFloat\s{0,20}\(", "number"),
            (r"Math\.\w+", "number"),
            // Boolean
            (r"\b(?:true|false)\b", "boolean"),
            (r"Boolean\s{0,20}\(", "boolean"),
            // Date
            (r"new\s{1,20}Date\s{0,20}\(", "date"),
            (r"Date\.(?:now|parse)\s{0,20}\(", "date"),
            (r"\.toISOString\s{0,20}\(", "date"),
            (r"moment\s{0,20}\(", "date"),
            (r"dayjs\s{0,20}\(", "date"),
            // Promise/async
            (r"\bPromise\b", "promise"),
            (r"\.then\s{0,20}\(", "promise"),
            (r"async\s{1,20}", "promise"),
            (r"await\s{1,20}", "promise"),
            // Null/undefined
            (r"\bnull\b", "null"),
            (r"\bundefined\b", "undefined"),
            // Map/Set
            (r"new\s{1,20}Map\s{0,20}\(", "map"),
            (r"new\s{1,20}Set\s{0,20}\(", "set"),
            (r"\.has\s{0,20}\(", "collection"),
            // Buffer/binary
            (r"\bBuffer\b", "buffer"),
            (r"ArrayBuffer", "buffer"),
            (r"Uint8Array", "buffer"),
            // Regex
            (r"/[^/]{1,200}/[gim]{0,3}", "regex"),
            (r"new\s{1,20}RegExp\s{0,20}\(", "regex"),
        ],
        false,
    )
});

fn search(dictionary: &Dictionary, text: &str) -> BTreeSet<String> {
    dictionary
        .iter()
        .filter(|(regex, _)| regex.is_match(text))
        .map(|(_, tag)| (*tag).to_string())
        .collect()
}

/// Annotate a code block with semantic metadata.
///
/// Domains are matched over both the source and the block's tags, since
/// function-name tags often carry the domain (`function:getUserProfile`).
pub fn annotate(block: &CodeBlock) -> SemanticAnnotation {
    let code = block.source_code.as_str();

    let operations = search(&OPERATION_PATTERNS, code);
    let domain_text = format!("{} {}", code, block.tags.join(" "));
    let domains = search(&DOMAIN_PATTERNS, &domain_text);
    let patterns = search(&CODE_PATTERN_PATTERNS, code);
    let data_types = search(&DATA_TYPE_PATTERNS, code);
    let intent = infer_intent(&operations, &domains, &patterns);

    SemanticAnnotation {
        category: block.category,
        operations,
        domains,
        patterns,
        data_types,
        intent,
    }
}

/// Build the compact intent string: `"<ops>|on:<domains>|with:<patterns>"`.
///
/// Tokens are `+`-joined in alphabetical order; empty sections are elided
/// and a fully empty annotation yields `"unknown"`.
pub fn infer_intent(
    operations: &BTreeSet<String>,
    domains: &BTreeSet<String>,
    patterns: &BTreeSet<String>,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !operations.is_empty() {
        parts.push(operations.iter().cloned().collect::<Vec<_>>().join("+"));
    }
    if !domains.is_empty() {
        parts.push(format!(
            "on:{}",
            domains.iter().cloned().collect::<Vec<_>>().join("+")
        ));
    }
    if !patterns.is_empty() {
        parts.push(format!(
            "with:{}",
            patterns.iter().cloned().collect::<Vec<_>>().join("+")
        ));
    }

    if parts.is_empty() {
        "unknown".to_string()
    } else {
        parts.join("|")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::testing::block;

    fn annotate_source(source: &str) -> SemanticAnnotation {
        annotate(&block("src/a.js", 1, 3, source, "array-map-filter"))
    }

    #[test]
    fn test_array_operations() {
        let ann = annotate_source("users.filter(u => u.active).map(u => u.name)");
        assert!(ann.operations.contains("filter"));
        assert!(ann.operations.contains("map"));
    }

    #[test]
    fn test_crud_operations() {
        let ann = annotate_source("await db.insert(record); await db.update(record);");
        assert!(ann.operations.contains("create"));
        assert!(ann.operations.contains("update"));
    }

    #[test]
    fn test_domain_from_code() {
        let ann = annotate_source("const token = session.user.token;");
        assert!(ann.domains.contains("auth"));
        assert!(ann.domains.contains("user"));
    }

    #[test]
    fn test_domain_from_tags() {
        let mut b = block("src/a.js", 1, 2, "return items.slice(0, 10);", "array-map-filter");
        b.tags.push("user-profile".to_string());
        let ann = annotate(&b);
        // `user` comes from the tag, not the source
        assert!(ann.domains.contains("user"));
    }

    #[test]
    fn test_guard_clause_pattern() {
        let ann = annotate_source("if (!input) return null;");
        assert!(ann.patterns.contains("guard_clause"));
        assert!(ann.data_types.contains("null"));
    }

    #[test]
    fn test_null_check_pattern() {
        let ann = annotate_source("if (value === null) { return fallback ?? first; }");
        assert!(ann.patterns.contains("null_check"));
    }

    #[test]
    fn test_error_handling_pattern() {
        let ann = annotate_source("try { run(); } catch (e) { throw new TypeError(e); }");
        assert!(ann.patterns.contains("error_handling"));
    }

    #[test]
    fn test_async_patterns() {
        let ann = annotate_source("await Promise.all(tasks.map(t => t.run()))");
        assert!(ann.patterns.contains("async_await"));
        assert!(ann.patterns.contains("promise_composition"));
        assert!(ann.data_types.contains("promise"));
    }

    #[test]
    fn test_data_types() {
        let ann = annotate_source("const n = parseInt('10', 10); return n;");
        assert!(ann.data_types.contains("number"));
        assert!(ann.data_types.contains("string"));
    }

    #[test]
    fn test_intent_format() {
        let ops = BTreeSet::from(["map".to_string(), "filter".to_string()]);
        let doms = BTreeSet::from(["user".to_string()]);
        let pats = BTreeSet::new();
        assert_eq!(infer_intent(&ops, &doms, &pats), "filter+map|on:user");
    }

    #[test]
    fn test_intent_with_patterns() {
        let ops = BTreeSet::from(["validate".to_string()]);
        let doms = BTreeSet::from(["auth".to_string()]);
        let pats = BTreeSet::from(["guard_clause".to_string()]);
        assert_eq!(
            infer_intent(&ops, &doms, &pats),
            "validate|on:auth|with:guard_clause"
        );
    }

    #[test]
    fn test_empty_intent_is_unknown() {
        let empty = BTreeSet::new();
        assert_eq!(infer_intent(&empty, &empty, &empty), "unknown");
    }

    #[test]
    fn test_annotation_intent_end_to_end() {
        let ann = annotate_source("users.filter(u => u.active).map(u => u.name)");
        assert!(ann.intent.starts_with("filter+map"));
        assert!(ann.intent.contains("on:"));
        assert!(ann.intent.contains("user"));
    }
}
