//! The language-agnostic conversion API: resolves a path through the network,
//! tokenizes the input, transduces word tokens and stitches the pieces back into
//! one output string with one whole-text alignment.
use crate::alignment::Alignment;
use crate::composite::CompositeTransducer;
use crate::network::{Network, NetworkError};
use crate::transducer_like::{TransducerLike, TransductionStage};
use serde::{Deserialize, Serialize};

/// The result of one conversion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    /// The converted text, with non-word runs passed through untouched.
    pub output: String,
    /// The relation between input and output character positions over the
    /// entire text.
    pub alignment: Alignment,
    /// Per-mapping intermediate strings and alignments, present when the
    /// conversion was traced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<TransductionStage>>,
}

/// A handle over a compiled [`Network`].
///
/// The network is immutable behind this handle, so conversions are pure: the
/// same input always yields the same output and alignment, and concurrent
/// conversions need no synchronization. Tests can substitute a synthetic
/// network freely.
#[derive(Debug, Default)]
pub struct Converter {
    network: Network,
}

impl Converter {
    /// Creates a converter over a compiled network.
    pub fn new(network: Network) -> Converter {
        Converter { network }
    }

    /// The underlying network.
    #[inline]
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Mutable access to the underlying network, for registering mappings
    /// before the first conversion.
    #[inline]
    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    /// Converts `text` from one notation to another.
    ///
    /// Only word tokens (as decided by the input notation's tokenizer) are
    /// transduced; any other run of characters passes through with an identity
    /// alignment. The returned alignment covers the entire text.
    pub fn convert(
        &self,
        text: &str,
        in_lang: &str,
        out_lang: &str,
    ) -> Result<Conversion, NetworkError> {
        self.convert_inner(text, in_lang, out_lang, false)
    }

    /// Like [`Converter::convert`], additionally recording the intermediate
    /// string and alignment after every mapping in the chain.
    pub fn convert_with_trace(
        &self,
        text: &str,
        in_lang: &str,
        out_lang: &str,
    ) -> Result<Conversion, NetworkError> {
        self.convert_inner(text, in_lang, out_lang, true)
    }

    fn convert_inner(
        &self,
        text: &str,
        in_lang: &str,
        out_lang: &str,
        traced: bool,
    ) -> Result<Conversion, NetworkError> {
        let chain = self.network.transducer(in_lang, out_lang)?;
        let tokenizer = self.network.tokenizer(in_lang)?;
        // Normalize the whole text up front with the first stage's form, so the
        // alignment's input positions are stable across token boundaries.
        let text = match chain.transducers().first() {
            Some(first) => first.mapping().config().norm_form.apply(text),
            None => text.to_string(),
        };
        if chain.is_empty() {
            // Zero-length chain: identity conversion over the whole text.
            return Ok(Conversion {
                alignment: Alignment::identity(text.chars().count()),
                output: text,
                stages: traced.then(Vec::new),
            });
        }
        let mut output = String::with_capacity(text.len());
        let mut alignment = Alignment::new();
        let mut trace = TraceAccumulator::new(&chain, traced);
        let mut input_offset = 0usize;
        let mut output_offset = 0usize;
        for token in tokenizer.tokenize(&text) {
            let token_len = token.text.chars().count();
            if token.is_word {
                let transduction = if traced {
                    let (transduction, stages) = chain.apply_with_trace(&token.text);
                    trace.push_word(token_len, &stages);
                    transduction
                } else {
                    chain.apply(&token.text)
                };
                alignment.append_offset(&transduction.alignment, input_offset, output_offset);
                output_offset += transduction.output.chars().count();
                output.push_str(&transduction.output);
            } else {
                trace.push_passthrough(&token.text, token_len);
                let identity = Alignment::identity(token_len);
                alignment.append_offset(&identity, input_offset, output_offset);
                output_offset += token_len;
                output.push_str(&token.text);
            }
            input_offset += token_len;
        }
        Ok(Conversion {
            output,
            alignment,
            stages: trace.finish(),
        })
    }
}

/// Assembles whole-text per-stage traces out of per-token stage results.
struct TraceAccumulator {
    stages: Option<Vec<TransductionStage>>,
    /// Running input length of each stage, in characters.
    input_offsets: Vec<usize>,
    /// Running output length of each stage, in characters.
    output_offsets: Vec<usize>,
}

impl TraceAccumulator {
    fn new(chain: &CompositeTransducer, traced: bool) -> TraceAccumulator {
        let stages = traced.then(|| {
            chain
                .transducers()
                .iter()
                .map(|transducer| TransductionStage {
                    out_lang: transducer.out_lang().unwrap_or_default().to_string(),
                    output: String::new(),
                    alignment: Alignment::new(),
                })
                .collect::<Vec<_>>()
        });
        let count = chain.len();
        TraceAccumulator {
            stages,
            input_offsets: vec![0; count],
            output_offsets: vec![0; count],
        }
    }

    fn push_word(&mut self, token_len: usize, token_stages: &[TransductionStage]) {
        let Some(stages) = self.stages.as_mut() else {
            return;
        };
        let mut stage_input_len = token_len;
        for (index, token_stage) in token_stages.iter().enumerate() {
            let stage = &mut stages[index];
            stage.alignment.append_offset(
                &token_stage.alignment,
                self.input_offsets[index],
                self.output_offsets[index],
            );
            let output_len = token_stage.output.chars().count();
            stage.output.push_str(&token_stage.output);
            self.input_offsets[index] += stage_input_len;
            self.output_offsets[index] += output_len;
            stage_input_len = output_len;
        }
    }

    fn push_passthrough(&mut self, text: &str, token_len: usize) {
        let Some(stages) = self.stages.as_mut() else {
            return;
        };
        for (index, stage) in stages.iter_mut().enumerate() {
            let identity = Alignment::identity(token_len);
            stage
                .alignment
                .append_offset(&identity, self.input_offsets[index], self.output_offsets[index]);
            stage.output.push_str(text);
            self.input_offsets[index] += token_len;
            self.output_offsets[index] += token_len;
        }
    }

    fn finish(self) -> Option<Vec<TransductionStage>> {
        self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{Mapping, MappingConfig};
    use crate::rule::Rule;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn mapping(in_lang: &str, out_lang: &str, rules: &[(&str, &str)]) -> Arc<Mapping> {
        let rules = rules
            .iter()
            .map(|&(input, output)| Rule {
                rule_input: input.to_string(),
                rule_output: output.to_string(),
                ..Default::default()
            })
            .collect();
        Arc::new(
            Mapping::compile(
                MappingConfig::rule_mapping(in_lang, out_lang),
                rules,
                IndexMap::new(),
                Vec::new(),
            )
            .unwrap(),
        )
    }

    fn converter() -> Converter {
        let mut network = Network::new();
        network.add_mapping(mapping("x", "y", &[("a", "b")]));
        network.add_mapping(mapping("y", "z", &[("b", "cc")]));
        Converter::new(network)
    }

    #[test]
    fn non_word_runs_pass_through() {
        let converter = converter();
        let conversion = converter.convert("a a!", "x", "z").unwrap();
        assert_eq!(conversion.output, "cc cc!");
        assert!(conversion.alignment.is_total(4, 6));
    }

    #[test]
    fn identity_conversion_for_same_notation() {
        let converter = converter();
        let conversion = converter.convert("abc", "x", "x").unwrap();
        assert_eq!(conversion.output, "abc");
        assert_eq!(conversion.alignment, Alignment::identity(3));
    }

    #[test]
    fn trace_covers_the_whole_text() {
        let converter = converter();
        let conversion = converter.convert_with_trace("a!", "x", "z").unwrap();
        let stages = conversion.stages.unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].out_lang, "y");
        assert_eq!(stages[0].output, "b!");
        assert_eq!(stages[1].out_lang, "z");
        assert_eq!(stages[1].output, "cc!");
        assert!(stages[1].alignment.is_total(2, 3));
    }

    #[test]
    fn untraced_conversion_has_no_stages() {
        let converter = converter();
        let conversion = converter.convert("a", "x", "z").unwrap();
        assert!(conversion.stages.is_none());
    }

    #[test]
    fn unknown_notation_errors() {
        let converter = converter();
        assert_eq!(
            converter.convert("a", "nope", "z"),
            Err(NetworkError::UnknownLang("nope".to_string()))
        );
    }
}
