//! Language-aware tokenization: deciding which runs of characters are words to be
//! transduced and which are pass-through material, driven by the rule alphabet.
use crate::mapping::Mapping;
use crate::utils;
use ahash::AHashSet;
use std::fmt::Debug;

/// One maximal run of word or non-word characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The text of the run.
    pub text: String,
    /// Whether the run should be transduced.
    pub is_word: bool,
}

/// A tokenizer whose notion of "word character" is derived from the mappings of
/// one language rather than hard-coded.
///
/// Unicode alphanumerics always count as word characters. On top of that, every
/// character that appears literally in some rule input of a mapping consuming
/// the language is a word character, as is anything listed in the language's
/// `word_characters` override. This is what keeps orthographic punctuation
/// (an apostrophe, a colon used as a length mark) inside word tokens for the
/// languages that spell with it, and outside for the languages that do not.
#[derive(Clone, Default)]
pub struct Tokenizer {
    word_chars: AHashSet<char>,
}

impl Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("word_chars", &utils::sorted_char_set(&self.word_chars))
            .finish()
    }
}

impl Tokenizer {
    /// Creates a tokenizer with an explicit extra word-character set.
    pub fn new(word_chars: AHashSet<char>) -> Tokenizer {
        Tokenizer { word_chars }
    }

    /// Derives a tokenizer from every mapping that consumes `lang`.
    pub fn for_language<'a, I>(mappings: I) -> Tokenizer
    where
        I: IntoIterator<Item = &'a Mapping>,
    {
        let mut word_chars = AHashSet::new();
        for mapping in mappings {
            for rule in mapping.rules() {
                let escaped = mapping.config().escape_special;
                for c in rule.source().rule_input.chars() {
                    if escaped || !utils::is_regex_syntax(c) {
                        word_chars.insert(c);
                    }
                }
            }
            for expansions in mapping.abbreviations().values() {
                for alternative in expansions {
                    word_chars.extend(alternative.chars());
                }
            }
            for (word, _) in mapping.lexicon_entries() {
                word_chars.extend(word.chars());
            }
            if let Some(extra) = &mapping.config().word_characters {
                word_chars.extend(extra.chars());
            }
        }
        word_chars.retain(|c| !c.is_whitespace());
        Tokenizer { word_chars }
    }

    /// Whether `c` belongs to a word run.
    #[inline]
    pub fn is_word_character(&self, c: char) -> bool {
        c.is_alphanumeric() || self.word_chars.contains(&c)
    }

    /// Splits `text` into maximal word and non-word runs. Concatenating the
    /// returned token texts always reproduces `text` exactly.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        for c in text.chars() {
            let is_word = self.is_word_character(c);
            match tokens.last_mut() {
                Some(token) if token.is_word == is_word => token.text.push(c),
                _ => tokens.push(Token {
                    text: c.to_string(),
                    is_word,
                }),
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingConfig;
    use crate::rule::Rule;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn mapping_with_inputs(inputs: &[&str]) -> Mapping {
        let rules = inputs
            .iter()
            .map(|input| Rule {
                rule_input: input.to_string(),
                rule_output: "x".to_string(),
                ..Default::default()
            })
            .collect();
        Mapping::compile(
            MappingConfig::rule_mapping("moh", "moh-ipa"),
            rules,
            IndexMap::new(),
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn rule_alphabet_extends_word_characters() {
        let mapping = mapping_with_inputs(&["kh", "'", "en"]);
        let tokenizer = Tokenizer::for_language([&mapping]);
        let tokens = tokenizer.tokenize("Kanien'kéha");
        assert_eq!(
            tokens,
            vec![Token {
                text: "Kanien'kéha".to_string(),
                is_word: true
            }]
        );
    }

    #[test]
    fn default_word_characters_split_at_punctuation() {
        let tokenizer = Tokenizer::default();
        let tokens = tokenizer.tokenize("Kanien'kéha");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Kanien", "'", "kéha"]);
        assert_eq!(
            tokens.iter().map(|t| t.is_word).collect::<Vec<_>>(),
            vec![true, false, true]
        );
    }

    #[test]
    fn tokenization_reproduces_text() {
        let mapping = mapping_with_inputs(&["a", "'"]);
        let tokenizer = Tokenizer::for_language([&mapping]);
        let text = "hello, 'world'!  42\n";
        let rebuilt: String = tokenizer
            .tokenize(text)
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn regex_syntax_does_not_become_word_characters() {
        let mapping = mapping_with_inputs(&["[aeiou]+"]);
        let tokenizer = Tokenizer::for_language([&mapping]);
        assert!(!tokenizer.is_word_character('['));
        assert!(!tokenizer.is_word_character('+'));
        assert!(tokenizer.is_word_character('a'));
    }
}
