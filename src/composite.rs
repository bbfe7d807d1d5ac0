//! Chains of transducers: the output of each stage feeds the next, and the
//! per-stage alignments compose relationally into one end-to-end alignment.
use crate::mapping::Mapping;
use crate::transducer::Transducer;
use crate::transducer_like::{sealed, Transduction, TransducerLike, TransductionStage};
use std::sync::Arc;

/// An ordered chain of [`Transducer`]s applied in sequence.
///
/// The composed alignment is the relational join of the per-stage alignments:
/// `(i, k)` survives iff some intermediate position `j` links `(i, j)` in one
/// stage to `(j, k)` in the next. A zero-length chain is the identity.
#[derive(Debug, Clone, Default)]
pub struct CompositeTransducer {
    transducers: Vec<Transducer>,
}

impl CompositeTransducer {
    /// Creates a composite from an ordered list of transducers.
    pub fn new(transducers: Vec<Transducer>) -> CompositeTransducer {
        CompositeTransducer { transducers }
    }

    /// Creates a composite over an ordered chain of compiled mappings.
    pub fn from_mappings<I>(mappings: I) -> CompositeTransducer
    where
        I: IntoIterator<Item = Arc<Mapping>>,
    {
        CompositeTransducer {
            transducers: mappings.into_iter().map(Transducer::new).collect(),
        }
    }

    /// The stages of the chain, in application order.
    #[inline]
    pub fn transducers(&self) -> &[Transducer] {
        &self.transducers
    }

    /// The number of stages.
    #[inline]
    pub fn len(&self) -> usize {
        self.transducers.len()
    }

    /// Whether the chain has no stages.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transducers.is_empty()
    }
}

impl sealed::Sealed for CompositeTransducer {}

impl TransducerLike for CompositeTransducer {
    fn apply(&self, input: &str) -> Transduction {
        let mut result = Transduction::identity(input);
        for transducer in &self.transducers {
            let stage = transducer.apply(&result.output);
            result.alignment = result.alignment.compose(&stage.alignment);
            result.output = stage.output;
        }
        result
    }

    fn apply_with_trace(&self, input: &str) -> (Transduction, Vec<TransductionStage>) {
        let mut result = Transduction::identity(input);
        let mut stages = Vec::with_capacity(self.transducers.len());
        for transducer in &self.transducers {
            let stage = transducer.apply(&result.output);
            stages.push(TransductionStage {
                out_lang: transducer
                    .out_lang()
                    .unwrap_or_default()
                    .to_string(),
                output: stage.output.clone(),
                alignment: stage.alignment.clone(),
            });
            result.alignment = result.alignment.compose(&stage.alignment);
            result.output = stage.output;
        }
        (result, stages)
    }

    fn in_lang(&self) -> Option<&str> {
        self.transducers.first().and_then(TransducerLike::in_lang)
    }

    fn out_lang(&self) -> Option<&str> {
        self.transducers.last().and_then(TransducerLike::out_lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingConfig;
    use crate::rule::Rule;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

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

    #[test]
    fn empty_chain_is_identity() {
        let chain = CompositeTransducer::default();
        let result = chain.apply("hello");
        assert_eq!(result, Transduction::identity("hello"));
    }

    #[test]
    fn two_stages_compose_output_and_alignment() {
        let chain = CompositeTransducer::from_mappings([
            mapping("a", "b", &[("x", "yy")]),
            mapping("b", "c", &[("yy", "z")]),
        ]);
        let result = chain.apply("x");
        assert_eq!(result.output, "z");
        assert_eq!(result.alignment.pairs(), &[(0, 0)]);
    }

    #[test]
    fn composition_is_associative() {
        let first = mapping("a", "b", &[("a", "bb")]);
        let second = mapping("b", "c", &[("b", "c")]);
        let third = mapping("c", "d", &[("cc", "d")]);
        let left = CompositeTransducer::from_mappings([
            Arc::clone(&first),
            Arc::clone(&second),
        ]);
        let full_left = {
            let inner = left.apply("a");
            let tail = Transducer::new(Arc::clone(&third)).apply(&inner.output);
            Transduction {
                alignment: inner.alignment.compose(&tail.alignment),
                output: tail.output,
            }
        };
        let full_right = {
            let head = Transducer::new(Arc::clone(&first)).apply("a");
            let right = CompositeTransducer::from_mappings([
                Arc::clone(&second),
                Arc::clone(&third),
            ]);
            let inner = right.apply(&head.output);
            Transduction {
                alignment: head.alignment.compose(&inner.alignment),
                output: inner.output,
            }
        };
        assert_eq!(full_left, full_right);
        assert_eq!(full_left.output, "d");
    }

    #[test]
    fn trace_records_every_stage() {
        let chain = CompositeTransducer::from_mappings([
            mapping("a", "b", &[("x", "y")]),
            mapping("b", "c", &[("y", "z")]),
        ]);
        let (result, stages) = chain.apply_with_trace("x");
        assert_eq!(result.output, "z");
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].out_lang, "b");
        assert_eq!(stages[0].output, "y");
        assert_eq!(stages[1].out_lang, "c");
        assert_eq!(stages[1].output, "z");
    }
}
