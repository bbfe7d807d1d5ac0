//! The rule compiler: turns textual rewrite rules into compiled matchers with
//! ordering metadata. Compiled rules are immutable after creation.
use ahash::AHashMap;
use fancy_regex::Regex;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use unicode_segmentation::UnicodeSegmentation;

/// One context-sensitive rewrite `in -> out / context_before _ context_after`
/// in its textual source form.
///
/// The pattern strings are kept alongside the compiled matcher so that rules can be
/// reversed, re-serialized and displayed without decompilation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// The string to match. Must be non-empty after normalization.
    #[serde(rename = "in")]
    pub rule_input: String,
    /// The replacement string. May be empty (a deletion rule).
    #[serde(rename = "out", default)]
    pub rule_output: String,
    /// Pattern that must match immediately before the input (compiled as lookbehind).
    #[serde(default)]
    pub context_before: String,
    /// Pattern that must match immediately after the input (compiled as lookahead).
    #[serde(default)]
    pub context_after: String,
    /// When set, later rules in the same mapping may not match inside this rule's output.
    #[serde(default)]
    pub prevent_feeding: bool,
    /// Free-form annotation carried through serialization, ignored by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Rule {
    /// Swaps the input and output of the rule. Context patterns are kept and are
    /// interpreted against the new input side.
    pub fn reversed(&self) -> Rule {
        Rule {
            rule_input: self.rule_output.clone(),
            rule_output: self.rule_input.clone(),
            context_before: self.context_before.clone(),
            context_after: self.context_after.clone(),
            prevent_feeding: self.prevent_feeding,
            comment: self.comment.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
/// The error type for rule compilation.
pub enum CompileRuleError {
    /// A rule's input is empty after normalization. Such a rule would match
    /// everywhere and never advance.
    #[error("rule #{index}: `in` must not be empty")]
    EmptyRuleInput {
        /// Zero-based index of the offending rule in its source order.
        index: usize,
    },
    /// A `{NAME}` reference did not resolve against the mapping's abbreviation table.
    #[error("rule #{index}: unknown abbreviation {{{name}}}")]
    UnknownAbbreviation {
        /// The unresolved abbreviation name.
        name: String,
        /// Zero-based index of the offending rule in its source order.
        index: usize,
    },
    /// The assembled pattern was rejected by the regex engine.
    #[error("rule #{index}: invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The fully assembled pattern that failed to compile.
        pattern: String,
        /// Zero-based index of the offending rule in its source order.
        index: usize,
        /// The underlying regex error.
        #[source]
        source: Box<fancy_regex::Error>,
    },
}

/// Compilation settings shared by all rules of one mapping.
pub(crate) struct RuleContext<'a> {
    pub abbreviations: &'a IndexMap<String, Vec<String>>,
    pub case_sensitive: bool,
    pub escape_special: bool,
    pub case_equivalencies: &'a AHashMap<char, Vec<char>>,
    /// Count grapheme clusters rather than scalar values for ordering keys.
    pub grapheme_aware: bool,
}

/// A compiled rewrite rule: the anchored matcher, the literal replacement and the
/// metadata used for deterministic ordering.
pub struct CompiledRule {
    source: Rule,
    pattern: Regex,
    replacement: String,
    prevent_feeding: bool,
    effective_length: usize,
    source_index: usize,
}

impl Debug for CompiledRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledRule")
            .field("pattern", &self.pattern.as_str())
            .field("replacement", &self.replacement)
            .field("prevent_feeding", &self.prevent_feeding)
            .field("effective_length", &self.effective_length)
            .field("source_index", &self.source_index)
            .finish()
    }
}

/// One parsed segment of a rule pattern: literal text or an `{ABBREVIATION}` reference.
enum Segment<'a> {
    Literal(&'a str),
    Abbreviation(&'a str),
}

/// Splits a pattern-source string into literal and abbreviation segments.
/// A `{NAME}` reference must start with a letter or underscore and consist of
/// word characters, which keeps bounded quantifiers like `{2,3}` out of the
/// abbreviation namespace; anything else is treated as literal braces.
fn split_segments(source: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = source;
    while let Some(open) = rest.find('{') {
        if let Some(close_rel) = rest[open..].find('}') {
            let name = &rest[open + 1..open + close_rel];
            if name
                .chars()
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_')
                && name.chars().all(|c| c.is_alphanumeric() || c == '_')
            {
                if open > 0 {
                    segments.push(Segment::Literal(&rest[..open]));
                }
                segments.push(Segment::Abbreviation(name));
                rest = &rest[open + close_rel + 1..];
                continue;
            }
        }
        // No well-formed reference at this brace; emit through it as a literal.
        segments.push(Segment::Literal(&rest[..open + 1]));
        rest = &rest[open + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    segments
}

/// Characters that need a backslash inside a character class.
fn push_class_char(class: &mut String, c: char) {
    if matches!(c, '\\' | ']' | '^' | '-' | '[') {
        class.push('\\');
    }
    class.push(c);
}

impl CompiledRule {
    /// Compiles one rule under the given mapping settings.
    ///
    /// Abbreviation references in the input and contexts expand to non-capturing
    /// alternations over their listed literals; in the output they expand to the
    /// first listed literal, since the output is plain text. When the mapping is
    /// case-insensitive the matcher carries the `i` flag and the replacement is
    /// lowercased for emission.
    pub(crate) fn compile(
        source: Rule,
        source_index: usize,
        ctx: &RuleContext<'_>,
    ) -> Result<CompiledRule, CompileRuleError> {
        if source.rule_input.is_empty() {
            return Err(CompileRuleError::EmptyRuleInput {
                index: source_index,
            });
        }
        let input = Self::expand_match_pattern(&source.rule_input, source_index, ctx)?;
        let before = Self::expand_match_pattern(&source.context_before, source_index, ctx)?;
        let after = Self::expand_match_pattern(&source.context_after, source_index, ctx)?;
        let mut pattern = String::new();
        if !ctx.case_sensitive {
            pattern.push_str("(?i)");
        }
        if !before.is_empty() {
            pattern.push_str("(?<=");
            pattern.push_str(&before);
            pattern.push(')');
        }
        pattern.push_str("(?:");
        pattern.push_str(&input);
        pattern.push(')');
        if !after.is_empty() {
            pattern.push_str("(?=");
            pattern.push_str(&after);
            pattern.push(')');
        }
        let compiled = Regex::new(&pattern).map_err(|e| CompileRuleError::InvalidPattern {
            pattern: pattern.clone(),
            index: source_index,
            source: Box::new(e),
        })?;
        let mut replacement =
            Self::expand_output(&source.rule_output, source_index, ctx.abbreviations)?;
        if !ctx.case_sensitive {
            replacement = replacement.to_lowercase();
        }
        let effective_length = Self::compute_effective_length(&source.rule_input, ctx);
        Ok(CompiledRule {
            prevent_feeding: source.prevent_feeding,
            source,
            pattern: compiled,
            replacement,
            effective_length,
            source_index,
        })
    }

    /// Expands abbreviations and applies the escape and case-equivalency policies
    /// to a pattern that will appear in match position (input or context).
    fn expand_match_pattern(
        source: &str,
        source_index: usize,
        ctx: &RuleContext<'_>,
    ) -> Result<String, CompileRuleError> {
        let mut out = String::with_capacity(source.len());
        for segment in split_segments(source) {
            match segment {
                Segment::Literal(text) => {
                    let literal = if ctx.escape_special {
                        fancy_regex::escape(text).into_owned()
                    } else {
                        text.to_string()
                    };
                    Self::push_with_equivalencies(&mut out, &literal, ctx);
                }
                Segment::Abbreviation(name) => {
                    let expansions = ctx.abbreviations.get(name).ok_or_else(|| {
                        CompileRuleError::UnknownAbbreviation {
                            name: name.to_string(),
                            index: source_index,
                        }
                    })?;
                    out.push_str("(?:");
                    for (n, alt) in expansions.iter().enumerate() {
                        if n > 0 {
                            out.push('|');
                        }
                        Self::push_with_equivalencies(
                            &mut out,
                            &fancy_regex::escape(alt),
                            ctx,
                        );
                    }
                    out.push(')');
                }
            }
        }
        Ok(out)
    }

    /// Copies `literal` into `out`, widening characters with configured case
    /// equivalencies into character classes. Equivalencies only apply to
    /// case-insensitive mappings; regex syntax characters pass through untouched.
    fn push_with_equivalencies(out: &mut String, literal: &str, ctx: &RuleContext<'_>) {
        if ctx.case_sensitive || ctx.case_equivalencies.is_empty() {
            out.push_str(literal);
            return;
        }
        for c in literal.chars() {
            match ctx.case_equivalencies.get(&c) {
                Some(equivalents) => {
                    out.push('[');
                    push_class_char(out, c);
                    for &e in equivalents {
                        push_class_char(out, e);
                    }
                    out.push(']');
                }
                None => out.push(c),
            }
        }
    }

    /// Expands abbreviations in the output to their first listed literal.
    fn expand_output(
        source: &str,
        source_index: usize,
        abbreviations: &IndexMap<String, Vec<String>>,
    ) -> Result<String, CompileRuleError> {
        let mut out = String::with_capacity(source.len());
        for segment in split_segments(source) {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Abbreviation(name) => {
                    let expansions = abbreviations.get(name).ok_or_else(|| {
                        CompileRuleError::UnknownAbbreviation {
                            name: name.to_string(),
                            index: source_index,
                        }
                    })?;
                    if let Some(first) = expansions.first() {
                        out.push_str(first);
                    }
                }
            }
        }
        Ok(out)
    }

    /// The effective match length of a rule input: the length of its fully expanded
    /// literal form, with every abbreviation expanded to its longest alternative.
    /// Used as the primary sort key for `apply-longest-first` ordering.
    fn compute_effective_length(source: &str, ctx: &RuleContext<'_>) -> usize {
        let mut expanded = String::with_capacity(source.len());
        for segment in split_segments(source) {
            match segment {
                Segment::Literal(text) => expanded.push_str(text),
                Segment::Abbreviation(name) => {
                    // Unknown names were already rejected while expanding the pattern.
                    if let Some(expansions) = ctx.abbreviations.get(name) {
                        let longest = expansions
                            .iter()
                            .max_by_key(|alt| alt.chars().count())
                            .map(String::as_str)
                            .unwrap_or("");
                        expanded.push_str(longest);
                    }
                }
            }
        }
        if ctx.grapheme_aware {
            expanded.graphemes(true).count()
        } else {
            expanded.chars().count()
        }
    }

    /// The textual source this rule was compiled from.
    #[inline]
    pub fn source(&self) -> &Rule {
        &self.source
    }
    /// The compiled matcher.
    #[inline]
    pub(crate) fn pattern(&self) -> &Regex {
        &self.pattern
    }
    /// The literal replacement emitted on a match, before case transfer.
    #[inline]
    pub(crate) fn replacement(&self) -> &str {
        &self.replacement
    }
    /// Whether this rule's output is protected from later rules.
    #[inline]
    pub fn prevent_feeding(&self) -> bool {
        self.prevent_feeding
    }
    /// The ordering key component for `apply-longest-first`.
    #[inline]
    pub fn effective_length(&self) -> usize {
        self.effective_length
    }
    /// The rule's position in its source document.
    #[inline]
    pub fn source_index(&self) -> usize {
        self.source_index
    }
}
