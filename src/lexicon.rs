//! Precompiled dictionary support for `lexicon` mappings, backed by an
//! [`fst::Map`] keyed by the normalized word form.
use fst::MapBuilder;

#[derive(Debug, thiserror::Error)]
/// The error type for [`Lexicon`] creation.
pub enum BuildLexiconError {
    /// The finite-state-transducer backing store rejected the entries.
    #[error("lexicon construction error: {0}")]
    Fst(#[from] fst::Error),
}

/// An immutable word-to-pronunciation dictionary.
///
/// Keys live in a finite-state map pointing into an output table, so lookup cost
/// is independent of the dictionary size held in memory as plain pairs.
pub struct Lexicon {
    map: fst::Map<Vec<u8>>,
    outputs: Vec<String>,
}

impl std::fmt::Debug for Lexicon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexicon")
            .field("entries", &self.map.len())
            .finish()
    }
}

impl Lexicon {
    /// Builds a lexicon from `(word, output)` pairs.
    ///
    /// Entries are sorted by word; when the same word appears more than once the
    /// first occurrence wins and the rest are ignored with a warning, mirroring
    /// how duplicate identities are handled elsewhere in the engine.
    pub fn new(entries: &[(String, String)]) -> Result<Lexicon, BuildLexiconError> {
        let mut sorted: Vec<(&str, &str)> = entries
            .iter()
            .map(|(word, output)| (word.as_str(), output.as_str()))
            .collect();
        sorted.sort_by_key(|&(word, _)| word);
        let mut builder = MapBuilder::memory();
        let mut outputs = Vec::with_capacity(sorted.len());
        let mut previous: Option<&str> = None;
        for (word, output) in sorted {
            if previous == Some(word) {
                log::warn!(
                    "duplicate lexicon entry for {:?}; keeping the first occurrence",
                    word
                );
                continue;
            }
            builder.insert(word, outputs.len() as u64)?;
            outputs.push(output.to_string());
            previous = Some(word);
        }
        Ok(Lexicon {
            map: builder.into_map(),
            outputs,
        })
    }

    /// Looks up a normalized word, returning the recorded output if present.
    pub fn lookup(&self, word: &str) -> Option<&str> {
        self.map
            .get(word)
            .map(|idx| self.outputs[idx as usize].as_str())
    }

    /// The number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Whether the lexicon has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_hits_and_misses() {
        let lexicon = Lexicon::new(&[
            ("read".to_string(), "R EH D".to_string()),
            ("lead".to_string(), "L IY D".to_string()),
        ])
        .unwrap();
        assert_eq!(lexicon.lookup("read"), Some("R EH D"));
        assert_eq!(lexicon.lookup("lead"), Some("L IY D"));
        assert_eq!(lexicon.lookup("bead"), None);
    }

    #[test]
    fn duplicate_words_keep_first() {
        let lexicon = Lexicon::new(&[
            ("a".to_string(), "one".to_string()),
            ("a".to_string(), "two".to_string()),
        ])
        .unwrap();
        assert_eq!(lexicon.len(), 1);
        assert_eq!(lexicon.lookup("a"), Some("one"));
    }
}
