//! Lexical normalization for structural comparison
//!
//! Canonicalizes source text so that two blocks differing only in
//! identifier names, literal values, whitespace, or comments normalize to
//! the same string. Identifiers carrying semantic weight (`Math`, `filter`,
//! `toUpperCase`, ...) are preserved through the rewrite; without the
//! whitelist, `Math.max` and `Math.min` would normalize identically and
//! produce false duplicate groups.
//!
//! Semantic feature extraction (`crate::features`) must run on the raw
//! code *before* this pass: normalization erases the very tokens the
//! extractor needs. Functions here take `raw_code` and return
//! [`NormalizedCode`] to keep that ordering visible in signatures.

use once_cell::sync::Lazy;
use regex::Regex;

/// Built-in objects whose names are preserved through normalization.
///
/// Whitelist data, not logic: review changes to these lists the way you
/// would review a parser grammar change.
pub static SEMANTIC_OBJECTS: &[&str] = &[
    "Math", "Object", "Array", "String", "Number", "Boolean", "console", "process", "JSON",
    "Date", "Promise",
];

/// Method and property names preserved through normalization.
pub static SEMANTIC_METHODS: &[&str] = &[
    // Array functional methods
    "map", "filter", "reduce", "forEach", "find", "some", "every", "slice", "splice", "push",
    "pop", "shift", "unshift", "join", "split", "includes", "indexOf",
    // Object methods
    "get", "set", "has", "delete", "keys", "values", "entries",
    // Async patterns
    "then", "catch", "finally", "async", "await",
    // Array transformations
    "reverse", "sort", "concat",
    // Math operations with opposite semantics
    "max", "min", "abs", "floor", "ceil", "round",
    // String operations
    "trim", "toLowerCase", "toUpperCase", "replace",
    // HTTP/API methods
    "status", "json", "send", "redirect",
    // Properties with semantic value
    "length", "name", "value", "id", "type",
];

static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"//[^\n]*").unwrap());
static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static SINGLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"'[^']*'").unwrap());
static DOUBLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""[^"]*""#).unwrap());
static BACKTICK_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`]*`").unwrap());
static NUMERIC_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").unwrap());
static LOWER_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z][a-zA-Z0-9_]*\b").unwrap());
static UPPER_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z][A-Z0-9_]*\b").unwrap());
static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*([(){}\[\];,.])\s*").unwrap());
static OPERATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(=>|===?|!==?|[+\-*/%<>=&|])\s*").unwrap());

static OBJECT_ALTERNATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(?:{})\b", SEMANTIC_OBJECTS.join("|"))).unwrap()
});
static METHOD_ALTERNATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(?:{})\b", SEMANTIC_METHODS.join("|"))).unwrap()
});
static OBJECT_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"__OBJ_([A-Z]+)__").unwrap());
static METHOD_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"__FN_([A-Z]+)__").unwrap());

/// Source text after lexical normalization.
///
/// Only `normalize` constructs this, so a `NormalizedCode` in hand means
/// feature extraction (if any) already happened on the raw form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCode(String);

impl NormalizedCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for NormalizedCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn restore_token(upper: &str, candidates: &[&'static str]) -> &'static str {
    candidates
        .iter()
        .find(|t| t.to_uppercase() == upper)
        .copied()
        .unwrap_or("")
}

/// Normalize code by removing variable-specific information.
///
/// Deterministic and idempotent: `normalize(normalize(x).as_str())`
/// yields the same string as `normalize(x)`.
pub fn normalize(raw_code: &str) -> NormalizedCode {
    if raw_code.is_empty() {
        return NormalizedCode(String::new());
    }

    // Strip comments
    let code = LINE_COMMENT.replace_all(raw_code, "");
    let code = BLOCK_COMMENT.replace_all(&code, "");

    // Collapse whitespace runs
    let code = WHITESPACE.replace_all(&code, " ");

    // Literals become placeholders
    let code = SINGLE_QUOTED.replace_all(&code, "'STR'");
    let code = DOUBLE_QUOTED.replace_all(&code, "\"STR\"");
    let code = BACKTICK_QUOTED.replace_all(&code, "`STR`");
    let code = NUMERIC_LITERAL.replace_all(&code, "NUM");

    // Mark whitelisted identifiers so the generic rewrite skips them.
    // Markers are `__`-delimited: word boundaries never fall inside them.
    let code = OBJECT_ALTERNATION.replace_all(&code, |caps: &regex::Captures| {
        format!("__OBJ_{}__", caps[0].to_uppercase())
    });
    let code = METHOD_ALTERNATION.replace_all(&code, |caps: &regex::Captures| {
        format!("__FN_{}__", caps[0].to_uppercase())
    });

    // Rewrite remaining identifiers. The STR/NUM placeholders introduced
    // above are part of the canonical form and survive the rewrite.
    let code = LOWER_IDENT.replace_all(&code, "var");
    let code = UPPER_IDENT.replace_all(&code, |caps: &regex::Captures| match &caps[0] {
        "STR" | "NUM" => caps[0].to_string(),
        _ => "CONST".to_string(),
    });

    // Restore preserved tokens in their whitelist spelling
    let code = OBJECT_MARKER.replace_all(&code, |caps: &regex::Captures| {
        restore_token(&caps[1], SEMANTIC_OBJECTS)
    });
    let code = METHOD_MARKER.replace_all(&code, |caps: &regex::Captures| {
        restore_token(&caps[1], SEMANTIC_METHODS)
    });

    // Canonical spacing: none around punctuation, one space around operators
    let code = PUNCTUATION.replace_all(&code, "$1");
    let code = OPERATOR.replace_all(&code, " $1 ");
    let code = WHITESPACE.replace_all(&code, " ");

    NormalizedCode(code.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_rewritten() {
        let norm = normalize("const userList = getUsers();");
        assert_eq!(norm.as_str(), "var var = var();");
    }

    #[test]
    fn test_strings_and_numbers_become_placeholders() {
        let norm = normalize("logMessage('hello', 42, 3.14)");
        assert_eq!(norm.as_str(), "var('STR',NUM,NUM)");
    }

    #[test]
    fn test_comments_stripped() {
        let a = normalize("let x = 1; // trailing note\n/* block */ let y = 2;");
        let b = normalize("let x = 1; let y = 2;");
        assert_eq!(a, b);
    }

    #[test]
    fn test_semantic_objects_preserved() {
        let norm = normalize("Math.max(a, b)");
        assert_eq!(norm.as_str(), "Math.max(var,var)");
    }

    #[test]
    fn test_max_and_min_stay_distinct() {
        let max = normalize("function findMax(arr){return Math.max(...arr);}");
        let min = normalize("function findMin(arr){return Math.min(...arr);}");
        assert_ne!(max, min);
    }

    #[test]
    fn test_all_caps_becomes_const() {
        let norm = normalize("process.env.NODE_ENV === 'production'");
        assert_eq!(norm.as_str(), "process.var.CONST === 'STR'");
    }

    #[test]
    fn test_variable_renaming_converges() {
        let a = normalize("users.filter(u => u.active)");
        let b = normalize("items.filter(i => i.active)");
        assert_eq!(a, b);
    }

    #[test]
    fn test_whitespace_insensitive() {
        let a = normalize("foo( bar ,  baz )");
        let b = normalize("foo(bar,baz)");
        assert_eq!(a, b);
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "function findMax(arr){return Math.max(...arr);}",
            "res.status(200).json({ data: user })",
            "const RETRIES = 3; // max attempts",
            "users.filter(u => u.active).map(u => u.name)",
            "if (!valid) { throw new Error('bad'); }",
        ];
        for raw in samples {
            let once = normalize(raw);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice, "normalize not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize("").is_empty());
    }

    #[test]
    fn test_method_chain_shape_survives() {
        let norm = normalize("data.filter(pred).map(fn).reverse()");
        assert_eq!(norm.as_str(), "var.filter(var).map(var).reverse()");
    }
}
