//! The mapping module: one named edge of the conversion network, holding an ordered
//! collection of compiled rules plus its configuration.
use crate::alignment::Alignment;
use crate::lexicon::{BuildLexiconError, Lexicon};
use crate::rule::{CompileRuleError, CompiledRule, Rule, RuleContext};
use crate::transducer;
use ahash::AHashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::PathBuf;
use unicode_normalization::UnicodeNormalization;

/// How a mapping produces its output.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MappingKind {
    /// Context-sensitive rewrite rules (the default).
    #[default]
    Rule,
    /// ASCII transliteration of arbitrary Unicode input.
    Unidecode,
    /// Whole-token lookup in a precompiled dictionary.
    Lexicon,
}

/// The order in which a mapping's rules are applied.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RuleOrdering {
    /// Rules apply in their source order.
    #[default]
    AsWritten,
    /// Rules are stably sorted by descending effective match length; ties keep
    /// their source order.
    ApplyLongestFirst,
}

/// The Unicode normalization form applied to rules and inputs before matching.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum NormForm {
    /// Canonical composition.
    #[default]
    #[serde(rename = "NFC")]
    #[strum(serialize = "NFC")]
    Nfc,
    /// Canonical decomposition.
    #[serde(rename = "NFD")]
    #[strum(serialize = "NFD")]
    Nfd,
    /// Compatibility composition.
    #[serde(rename = "NFKC")]
    #[strum(serialize = "NFKC")]
    Nfkc,
    /// Compatibility decomposition.
    #[serde(rename = "NFKD")]
    #[strum(serialize = "NFKD")]
    Nfkd,
    /// No normalization; matching operates on code points as given.
    #[serde(rename = "none")]
    #[strum(serialize = "none")]
    None,
}

impl NormForm {
    /// Applies the normalization form to a string.
    pub fn apply(&self, text: &str) -> String {
        match self {
            NormForm::Nfc => text.nfc().collect(),
            NormForm::Nfd => text.nfd().collect(),
            NormForm::Nfkc => text.nfkc().collect(),
            NormForm::Nfkd => text.nfkd().collect(),
            NormForm::None => text.to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// The configuration record of one mapping, as read from a configuration document.
///
/// Unknown fields are rejected at load time so that misspelled options fail loudly
/// rather than silently disabling behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingConfig {
    /// The notation this mapping consumes.
    pub in_lang: String,
    /// The notation this mapping produces.
    pub out_lang: String,
    /// Human-readable label for the mapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Human-readable name of the language this mapping belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_name: Option<String>,
    /// How the mapping produces output.
    #[serde(rename = "type", default)]
    pub kind: MappingKind,
    /// Path to the rules file, relative to the configuration document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<PathBuf>,
    /// Path to the abbreviations file, relative to the configuration document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abbreviations_path: Option<PathBuf>,
    /// Rule application order.
    #[serde(default)]
    pub rule_ordering: RuleOrdering,
    /// Whether matching distinguishes case.
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    /// Whether the case pattern of matched input is reapplied to the output.
    /// Mutually exclusive with `case_sensitive`.
    #[serde(default)]
    pub preserve_case: bool,
    /// Whether every rule character is treated as a literal.
    #[serde(default)]
    pub escape_special: bool,
    /// Whether to swap rule inputs and outputs at load time.
    #[serde(default)]
    pub reverse: bool,
    /// Whether every rule's output is protected from later rules.
    #[serde(default)]
    pub prevent_feeding: bool,
    /// Unicode normalization applied to rules and inputs.
    #[serde(default)]
    pub norm_form: NormForm,
    /// A delimiter of at most one character inserted after every rule application.
    #[serde(default)]
    pub out_delimiter: String,
    /// Extra case equivalencies for case-insensitive matching, keyed by character.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub case_equivalencies: IndexMap<String, Vec<String>>,
    /// Characters the tokenizer must treat as word characters for `in_lang`,
    /// in addition to those derived from rule inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_characters: Option<String>,
    /// Mapping authors, carried as metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    /// Path to supplementary alignment data, carried as metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignments_path: Option<PathBuf>,
    /// Legacy ordering flag from old configuration schemas. Never honored;
    /// present only so the migration diagnostic can name it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_is: Option<bool>,
}

impl MappingConfig {
    /// A minimal configuration for a rule mapping between two notations.
    /// Everything else takes its default.
    pub fn rule_mapping(in_lang: &str, out_lang: &str) -> MappingConfig {
        MappingConfig {
            in_lang: in_lang.to_string(),
            out_lang: out_lang.to_string(),
            display_name: None,
            language_name: None,
            kind: MappingKind::Rule,
            rules_path: None,
            abbreviations_path: None,
            rule_ordering: RuleOrdering::default(),
            case_sensitive: true,
            preserve_case: false,
            escape_special: false,
            reverse: false,
            prevent_feeding: false,
            norm_form: NormForm::default(),
            out_delimiter: String::new(),
            case_equivalencies: IndexMap::new(),
            word_characters: None,
            authors: None,
            alignments_path: None,
            as_is: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
/// The error type for mapping compilation.
pub enum CompileMappingError {
    /// A rule failed to compile.
    #[error("mapping {in_lang}->{out_lang}: {source}")]
    Rule {
        /// The mapping's input notation.
        in_lang: String,
        /// The mapping's output notation.
        out_lang: String,
        /// The rule-level error.
        #[source]
        source: CompileRuleError,
    },
    /// `case_sensitive` and `preserve_case` were both requested.
    #[error(
        "mapping {in_lang}->{out_lang}: `preserve_case` requires `case_sensitive: false`"
    )]
    ConflictingCaseSettings {
        /// The mapping's input notation.
        in_lang: String,
        /// The mapping's output notation.
        out_lang: String,
    },
    /// `out_delimiter` was longer than one character.
    #[error("mapping {in_lang}->{out_lang}: `out_delimiter` {delimiter:?} is longer than one character")]
    DelimiterTooLong {
        /// The mapping's input notation.
        in_lang: String,
        /// The mapping's output notation.
        out_lang: String,
        /// The offending delimiter value.
        delimiter: String,
    },
    /// The legacy boolean `as_is` ordering schema was used.
    #[error(
        "mapping {in_lang}->{out_lang}: the boolean `as_is` option is no longer supported; \
         replace it with `rule_ordering: {replacement}`"
    )]
    LegacyRuleOrdering {
        /// The mapping's input notation.
        in_lang: String,
        /// The mapping's output notation.
        out_lang: String,
        /// The `rule_ordering` value equivalent to the rejected flag.
        replacement: RuleOrdering,
    },
    /// A case-equivalency key was not a single character.
    #[error("mapping {in_lang}->{out_lang}: case equivalency key {key:?} is not a single character")]
    InvalidCaseEquivalency {
        /// The mapping's input notation.
        in_lang: String,
        /// The mapping's output notation.
        out_lang: String,
        /// The offending key.
        key: String,
    },
    /// The lexicon backing store could not be built.
    #[error("mapping {in_lang}->{out_lang}: {source}")]
    Lexicon {
        /// The mapping's input notation.
        in_lang: String,
        /// The mapping's output notation.
        out_lang: String,
        /// The lexicon-level error.
        #[source]
        source: BuildLexiconError,
    },
}

/// A compiled mapping: the ordered rules, the abbreviation table and the
/// configuration they were compiled under. Immutable after compilation.
pub struct Mapping {
    config: MappingConfig,
    rules: Vec<CompiledRule>,
    abbreviations: IndexMap<String, Vec<String>>,
    lexicon: Option<Lexicon>,
    lexicon_entries: Vec<(String, String)>,
}

impl Debug for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapping")
            .field("in_lang", &self.config.in_lang)
            .field("out_lang", &self.config.out_lang)
            .field("kind", &self.config.kind)
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Mapping {
    /// Compiles a mapping from its configuration, rule sources, abbreviation table
    /// and (for `lexicon` mappings) dictionary entries.
    ///
    /// Normalization, `reverse`, the escape policy and the ordering policy are all
    /// applied here, exactly once; the result is read-only.
    pub fn compile(
        config: MappingConfig,
        rules: Vec<Rule>,
        abbreviations: IndexMap<String, Vec<String>>,
        lexicon_entries: Vec<(String, String)>,
    ) -> Result<Mapping, CompileMappingError> {
        let id = (config.in_lang.clone(), config.out_lang.clone());
        if let Some(as_is) = config.as_is {
            return Err(CompileMappingError::LegacyRuleOrdering {
                in_lang: id.0,
                out_lang: id.1,
                replacement: if as_is {
                    RuleOrdering::AsWritten
                } else {
                    RuleOrdering::ApplyLongestFirst
                },
            });
        }
        if config.case_sensitive && config.preserve_case {
            return Err(CompileMappingError::ConflictingCaseSettings {
                in_lang: id.0,
                out_lang: id.1,
            });
        }
        if config.out_delimiter.chars().count() > 1 {
            return Err(CompileMappingError::DelimiterTooLong {
                in_lang: id.0,
                out_lang: id.1,
                delimiter: config.out_delimiter.clone(),
            });
        }
        let mut case_equivalencies: AHashMap<char, Vec<char>> = AHashMap::new();
        for (key, equivalents) in config.case_equivalencies.iter() {
            let mut key_chars = key.chars();
            let (Some(c), None) = (key_chars.next(), key_chars.next()) else {
                return Err(CompileMappingError::InvalidCaseEquivalency {
                    in_lang: id.0,
                    out_lang: id.1,
                    key: key.clone(),
                });
            };
            case_equivalencies.insert(
                c,
                equivalents.iter().flat_map(|e| e.chars()).collect(),
            );
        }
        // Normalize rule sources the same way inputs will be normalized, then
        // apply `reverse` before anything is compiled.
        let mut sources: Vec<Rule> = rules
            .into_iter()
            .map(|rule| {
                let rule = Rule {
                    rule_input: config.norm_form.apply(&rule.rule_input),
                    rule_output: config.norm_form.apply(&rule.rule_output),
                    context_before: config.norm_form.apply(&rule.context_before),
                    context_after: config.norm_form.apply(&rule.context_after),
                    ..rule
                };
                if config.reverse {
                    rule.reversed()
                } else {
                    rule
                }
            })
            .collect();
        if config.reverse && config.kind == MappingKind::Unidecode {
            log::warn!(
                "mapping {}->{}: `reverse` has no effect on unidecode mappings",
                id.0,
                id.1
            );
        }
        let ctx = RuleContext {
            abbreviations: &abbreviations,
            case_sensitive: config.case_sensitive,
            escape_special: config.escape_special,
            case_equivalencies: &case_equivalencies,
            grapheme_aware: config.norm_form != NormForm::None,
        };
        let mut compiled = Vec::with_capacity(sources.len());
        for (index, rule) in sources.drain(..).enumerate() {
            compiled.push(CompiledRule::compile(rule, index, &ctx).map_err(|source| {
                CompileMappingError::Rule {
                    in_lang: id.0.clone(),
                    out_lang: id.1.clone(),
                    source,
                }
            })?);
        }
        if config.rule_ordering == RuleOrdering::ApplyLongestFirst {
            // Stable sort: equal effective lengths keep their source order.
            compiled.sort_by_key(|rule| std::cmp::Reverse(rule.effective_length()));
        }
        let mut lexicon_entries = lexicon_entries;
        if config.reverse {
            for entry in lexicon_entries.iter_mut() {
                std::mem::swap(&mut entry.0, &mut entry.1);
            }
        }
        let lexicon = if config.kind == MappingKind::Lexicon {
            let normalized: Vec<(String, String)> = lexicon_entries
                .iter()
                .map(|(word, output)| (Self::normalize_token(&config, word), output.clone()))
                .collect();
            Some(
                Lexicon::new(&normalized).map_err(|source| CompileMappingError::Lexicon {
                    in_lang: id.0.clone(),
                    out_lang: id.1.clone(),
                    source,
                })?,
            )
        } else {
            None
        };
        Ok(Mapping {
            config,
            rules: compiled,
            abbreviations,
            lexicon,
            lexicon_entries,
        })
    }

    /// Compiles a rule mapping with no abbreviations and no dictionary.
    pub fn from_rules(config: MappingConfig, rules: Vec<Rule>) -> Result<Mapping, CompileMappingError> {
        Mapping::compile(config, rules, IndexMap::new(), Vec::new())
    }

    fn normalize_token(config: &MappingConfig, token: &str) -> String {
        let normalized = config.norm_form.apply(token);
        if config.case_sensitive {
            normalized
        } else {
            normalized.to_lowercase()
        }
    }

    /// Applies the mapping to a string, producing the output and the alignment
    /// between input and output character positions.
    ///
    /// This never fails: a rule mapping with no matching rules, and a lexicon
    /// mapping with no entry for the input, both return the input unchanged with
    /// the identity alignment.
    pub fn apply(&self, input: &str) -> (String, Alignment) {
        let normalized = self.config.norm_form.apply(input);
        match self.config.kind {
            MappingKind::Rule => transducer::apply_rules(self, &normalized),
            MappingKind::Unidecode => Self::apply_unidecode(&normalized),
            MappingKind::Lexicon => self.apply_lexicon(&normalized),
        }
    }

    /// ASCII transliteration: each input code point maps to every character of
    /// the transliteration it produced.
    fn apply_unidecode(input: &str) -> (String, Alignment) {
        let mut output = String::with_capacity(input.len());
        let mut pairs = Vec::new();
        let mut out_index = 0u32;
        for (in_index, c) in input.chars().enumerate() {
            let transliterated = unidecode::unidecode_char(c);
            for _ in transliterated.chars() {
                pairs.push((in_index as u32, out_index));
                out_index += 1;
            }
            output.push_str(transliterated);
        }
        (output, Alignment::from_pairs(pairs))
    }

    /// Dictionary lookup: on a hit, the first input character is paired with every
    /// output character, since no per-letter alignment is recorded in a lexicon.
    /// On a miss the input passes through with the identity alignment.
    fn apply_lexicon(&self, input: &str) -> (String, Alignment) {
        let token = Self::normalize_token(&self.config, input);
        let hit = self
            .lexicon
            .as_ref()
            .and_then(|lexicon| lexicon.lookup(&token));
        match hit {
            Some(output) => {
                let pairs = (0..output.chars().count() as u32).map(|k| (0, k)).collect();
                (output.to_string(), Alignment::from_pairs(pairs))
            }
            None => {
                let alignment = Alignment::identity(input.chars().count());
                (input.to_string(), alignment)
            }
        }
    }

    /// The notation this mapping consumes.
    #[inline]
    pub fn in_lang(&self) -> &str {
        &self.config.in_lang
    }
    /// The notation this mapping produces.
    #[inline]
    pub fn out_lang(&self) -> &str {
        &self.config.out_lang
    }
    /// The mapping's identity within a network.
    #[inline]
    pub fn id(&self) -> (&str, &str) {
        (&self.config.in_lang, &self.config.out_lang)
    }
    /// The human-readable label, falling back to `in_lang -> out_lang`.
    pub fn display_name(&self) -> String {
        self.config
            .display_name
            .clone()
            .unwrap_or_else(|| format!("{} -> {}", self.config.in_lang, self.config.out_lang))
    }
    /// The configuration this mapping was compiled under.
    #[inline]
    pub fn config(&self) -> &MappingConfig {
        &self.config
    }
    /// The compiled rules in application order.
    #[inline]
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }
    /// The abbreviation table.
    #[inline]
    pub fn abbreviations(&self) -> &IndexMap<String, Vec<String>> {
        &self.abbreviations
    }
    /// The dictionary entries of a `lexicon` mapping, as given at compile time.
    #[inline]
    pub fn lexicon_entries(&self) -> &[(String, String)] {
        &self.lexicon_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn compile(config: MappingConfig, rules: Vec<Rule>) -> Mapping {
        Mapping::compile(config, rules, IndexMap::new(), Vec::new()).unwrap()
    }

    fn rule(input: &str, output: &str) -> Rule {
        Rule {
            rule_input: input.to_string(),
            rule_output: output.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_rule_list_is_identity() {
        let mapping = compile(MappingConfig::rule_mapping("a", "b"), vec![]);
        let (output, alignment) = mapping.apply("abc");
        assert_eq!(output, "abc");
        assert_eq!(alignment, Alignment::identity(3));
    }

    #[test]
    fn conflicting_case_settings_are_rejected() {
        let mut config = MappingConfig::rule_mapping("a", "b");
        config.preserve_case = true;
        let err = Mapping::compile(config, vec![], IndexMap::new(), Vec::new());
        assert!(matches!(
            err,
            Err(CompileMappingError::ConflictingCaseSettings { .. })
        ));
    }

    #[test]
    fn legacy_as_is_flag_is_rejected_with_migration_hint() {
        let mut config = MappingConfig::rule_mapping("a", "b");
        config.as_is = Some(false);
        let err = Mapping::compile(config, vec![], IndexMap::new(), Vec::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("rule_ordering"), "got: {message}");
        assert!(message.contains("apply-longest-first"), "got: {message}");
    }

    #[test]
    fn longest_first_ordering_is_stable() {
        let mut config = MappingConfig::rule_mapping("a", "b");
        config.rule_ordering = RuleOrdering::ApplyLongestFirst;
        let mapping = compile(
            config,
            vec![rule("a", "1"), rule("bb", "2"), rule("c", "3"), rule("d", "4")],
        );
        let order: Vec<&str> = mapping
            .rules()
            .iter()
            .map(|r| r.source().rule_input.as_str())
            .collect();
        // "bb" floats to the front; the length-1 rules keep their source order.
        assert_eq!(order, vec!["bb", "a", "c", "d"]);
    }

    #[test]
    fn reverse_swaps_rules_and_identity() {
        let mut config = MappingConfig::rule_mapping("a", "b");
        config.reverse = true;
        let mapping = compile(config, vec![rule("x", "y")]);
        let (output, _) = mapping.apply("y");
        assert_eq!(output, "x");
    }

    #[test]
    fn unidecode_mapping_aligns_expansions() {
        let mut config = MappingConfig::rule_mapping("fra", "fra-ascii");
        config.kind = MappingKind::Unidecode;
        let mapping = Mapping::compile(config, vec![], IndexMap::new(), Vec::new()).unwrap();
        let (output, alignment) = mapping.apply("æb");
        assert_eq!(output, "aeb");
        assert_eq!(alignment.pairs(), &[(0, 0), (0, 1), (1, 2)]);
    }

    #[test]
    fn lexicon_miss_is_identity() {
        let mut config = MappingConfig::rule_mapping("eng", "eng-ipa");
        config.kind = MappingKind::Lexicon;
        let mapping = Mapping::compile(
            config,
            vec![],
            IndexMap::new(),
            vec![("hello".to_string(), "həloʊ".to_string())],
        )
        .unwrap();
        let (output, alignment) = mapping.apply("hello");
        assert_eq!(output, "həloʊ");
        assert_eq!(alignment.pairs()[0], (0, 0));
        let (missed, missed_alignment) = mapping.apply("goodbye");
        assert_eq!(missed, "goodbye");
        assert!(missed_alignment.is_total(7, 7));
    }
}
