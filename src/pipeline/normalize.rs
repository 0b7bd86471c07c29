//! Text normalisation: an ordered find/replace rule engine.
//!
//! Extracted text, whether it came from a PDF text layer or from OCR, carries
//! typographic noise that breaks the structural heuristics downstream:
//! ligature code points (`ﬁ`), curly quotes, en/em dashes, soft hyphens and a
//! zoo of Unicode space characters.
//!
//! ## Rule Order
//!
//! 1. Built-in rules (ligatures, quotes, dashes, soft hyphen, whitespace)
//! 2. Instance rules from [`crate::config::ConversionConfig`]
//! 3. Call rules from [`crate::config::CallOptions`]
//! 4. camelCase / PascalCase splitting, three passes, when enabled
//! 5. Trim
//!
//! Each rule rewrites the whole text before the next one runs, so later rules
//! see the output of earlier ones. A caller rule whose pattern does not
//! compile is logged and skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One find/replace step. `pattern` is a [`regex`] pattern; `replacement` may
/// reference capture groups (`$1`, `${name}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationRule {
    pub pattern: String,
    pub replacement: String,
}

impl NormalizationRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// A caller rule after compilation. `regex` is `None` when the pattern was
/// malformed; such rules are no-ops.
#[derive(Debug, Clone)]
struct CompiledRule {
    regex: Option<Regex>,
    replacement: String,
}

impl CompiledRule {
    fn compile(rule: &NormalizationRule) -> Self {
        let regex = match Regex::new(&rule.pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Skipping normalisation rule {:?}: {}", rule.pattern, e);
                None
            }
        };
        Self {
            regex,
            replacement: rule.replacement.clone(),
        }
    }

    fn apply(&self, text: String) -> String {
        match self.regex {
            Some(ref re) => re.replace_all(&text, self.replacement.as_str()).into_owned(),
            None => text,
        }
    }
}

/// The rule engine. Instance rules are compiled once at construction.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
    split_camel_case: bool,
}

impl RuleEngine {
    pub fn new(rules: &[NormalizationRule], split_camel_case: bool) -> Self {
        Self {
            rules: rules.iter().map(CompiledRule::compile).collect(),
            split_camel_case,
        }
    }

    /// Normalise `text`, appending `extra_rules` after the instance rules.
    pub fn normalize(&self, text: &str, extra_rules: &[NormalizationRule]) -> String {
        let mut s = apply_builtin_rules(text);

        for rule in &self.rules {
            s = rule.apply(s);
        }
        for rule in extra_rules {
            s = CompiledRule::compile(rule).apply(s);
        }

        if self.split_camel_case {
            s = split_camel_case(&s);
        }

        let out = s.trim().to_string();
        debug!("Normalised {} → {} bytes", text.len(), out.len());
        out
    }
}

/// Run only the built-in rules, in order.
pub fn apply_builtin_rules(input: &str) -> String {
    let s = expand_ligatures(input);
    let s = normalise_quotes(&s);
    let s = normalise_dashes(&s);
    let s = remove_soft_hyphens(&s);
    collapse_unicode_whitespace(&s)
}

// ── Rule 1: Ligatures ────────────────────────────────────────────────────────

const LIGATURES: [(char, &str); 5] = [
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

fn expand_ligatures(input: &str) -> String {
    LIGATURES
        .iter()
        .fold(input.to_string(), |s, (lig, plain)| s.replace(*lig, plain))
}

// ── Rule 2: Smart quotes ─────────────────────────────────────────────────────

static RE_SINGLE_QUOTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x{2018}\x{2019}\x{201A}\x{201B}\x{2032}]").unwrap());
static RE_DOUBLE_QUOTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x{201C}\x{201D}\x{201E}\x{201F}\x{2033}]").unwrap());

fn normalise_quotes(input: &str) -> String {
    let s = RE_SINGLE_QUOTES.replace_all(input, "'");
    RE_DOUBLE_QUOTES.replace_all(&s, "\"").into_owned()
}

// ── Rule 3: Dashes ───────────────────────────────────────────────────────────

static RE_DASHES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x{2010}-\x{2015}\x{2212}]").unwrap());

fn normalise_dashes(input: &str) -> String {
    RE_DASHES.replace_all(input, "-").into_owned()
}

// ── Rule 4: Soft hyphen ──────────────────────────────────────────────────────

fn remove_soft_hyphens(input: &str) -> String {
    input.replace('\u{00AD}', "")
}

// ── Rule 5: Unicode whitespace ───────────────────────────────────────────────
//
// Every whitespace code point that is neither a line break nor an ASCII space
// becomes one ASCII space. ASCII space runs are left alone: column gaps are
// what the tabular heuristic in `reconstruct` keys on.

static RE_UNICODE_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\S\n\r ]").unwrap());

fn collapse_unicode_whitespace(input: &str) -> String {
    RE_UNICODE_SPACE.replace_all(input, " ").into_owned()
}

// ── Optional: camelCase / PascalCase splitting ───────────────────────────────

static RE_LOWER_UPPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\p{Ll})(\p{Lu})").unwrap());
static RE_UPPER_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{Lu})(\p{Lu}\p{Ll})").unwrap());

const CAMEL_CASE_PASSES: usize = 3;

fn split_camel_case(input: &str) -> String {
    let mut s = input.to_string();
    for _ in 0..CAMEL_CASE_PASSES {
        s = RE_LOWER_UPPER.replace_all(&s, "$1 $2").into_owned();
        s = RE_UPPER_WORD.replace_all(&s, "$1 $2").into_owned();
    }
    s
}

// ── Tests ────────────────────────────────────────────────────────────────────
