//! This module contains the [`Alignment`] struct, a many-to-many relation between
//! input and output character positions that survives rule application and composition.
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tinyvec::TinyVec;

/// A bipartite many-to-many relation between character positions in an input string
/// and character positions in an output string.
///
/// The relation is stored as a sorted sequence of `(input_index, output_index)` pairs,
/// ordered lexicographically by input index and then by output index. Indices count
/// Unicode scalar values, not bytes. An alignment answers the question
/// "which input character(s) produced each output character?" and is preserved
/// across arbitrarily many composed rewrites.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Alignment {
    pairs: Vec<(u32, u32)>,
}

impl Debug for Alignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.pairs.iter()).finish()
    }
}

impl Alignment {
    /// Creates an empty alignment, relating nothing to nothing.
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Creates the identity alignment `{(i, i) : 0 <= i < len}`.
    pub fn identity(len: usize) -> Self {
        Self {
            pairs: (0..len as u32).map(|i| (i, i)).collect(),
        }
    }

    /// Creates an alignment from raw pairs. The pairs are sorted and deduplicated.
    pub fn from_pairs(mut pairs: Vec<(u32, u32)>) -> Self {
        pairs.sort_unstable();
        pairs.dedup();
        Self { pairs }
    }

    /// The sorted `(input_index, output_index)` pairs of the relation.
    #[inline]
    pub fn pairs(&self) -> &[(u32, u32)] {
        &self.pairs
    }

    /// Whether the relation is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Adds a single pair, keeping the relation sorted and deduplicated.
    pub fn insert(&mut self, input: usize, output: usize) {
        let pair = (input as u32, output as u32);
        match self.pairs.binary_search(&pair) {
            Ok(_) => {}
            Err(idx) => self.pairs.insert(idx, pair),
        }
    }

    /// The set of input positions currently aligned to any output position in
    /// `span_start..span_end`, sorted ascending.
    pub(crate) fn inputs_for_output_span(
        &self,
        span_start: usize,
        span_end: usize,
    ) -> TinyVec<[u32; 8]> {
        let (s, e) = (span_start as u32, span_end as u32);
        let mut inputs: TinyVec<[u32; 8]> = TinyVec::default();
        for &(i, k) in &self.pairs {
            if k >= s && k < e && inputs.last() != Some(&i) && !inputs.contains(&i) {
                inputs.push(i);
            }
        }
        inputs.sort_unstable();
        inputs
    }

    /// Rewrites the relation after the output span `span_start..span_end` has been
    /// replaced by `replacement_len` characters.
    ///
    /// Every input position previously aligned into the span becomes aligned to every
    /// position of the replacement (a many-to-many block); pairs at or beyond the span
    /// end shift by the length difference. Pairs strictly inside the span are removed.
    pub(crate) fn replace_output_span(
        &mut self,
        span_start: usize,
        span_end: usize,
        replacement_len: usize,
    ) {
        let (s, e) = (span_start as u32, span_end as u32);
        let delta = replacement_len as i64 - (span_end - span_start) as i64;
        let inputs = self.inputs_for_output_span(span_start, span_end);
        self.pairs.retain(|&(_, k)| k < s || k >= e);
        for pair in self.pairs.iter_mut() {
            if pair.1 >= e {
                pair.1 = (pair.1 as i64 + delta) as u32;
            }
        }
        for &i in inputs.iter() {
            for l in 0..replacement_len as u32 {
                self.pairs.push((i, s + l));
            }
        }
        self.pairs.sort_unstable();
        self.pairs.dedup();
    }

    /// Removes all pairs whose output index is at or beyond `new_output_len`.
    /// Used when a trailing delimiter is trimmed from the output.
    pub(crate) fn truncate_output(&mut self, new_output_len: usize) {
        self.pairs.retain(|&(_, k)| (k as usize) < new_output_len);
    }

    /// Relational composition: `(i, k)` is in the result iff there is a `j` with
    /// `(i, j)` in `self` and `(j, k)` in `other`.
    ///
    /// Composition is associative, so a chain of transductions may be folded
    /// from either end with the same result.
    pub fn compose(&self, other: &Alignment) -> Alignment {
        // Group the right-hand relation by its input index for the join.
        let mut by_input: Vec<(u32, TinyVec<[u32; 8]>)> = Vec::new();
        for &(j, k) in other.pairs.iter() {
            match by_input.binary_search_by_key(&j, |entry| entry.0) {
                Ok(idx) => by_input[idx].1.push(k),
                Err(idx) => {
                    let mut outputs: TinyVec<[u32; 8]> = TinyVec::default();
                    outputs.push(k);
                    by_input.insert(idx, (j, outputs));
                }
            }
        }
        let mut pairs = Vec::with_capacity(self.pairs.len());
        for &(i, j) in self.pairs.iter() {
            if let Ok(idx) = by_input.binary_search_by_key(&j, |entry| entry.0) {
                for &k in by_input[idx].1.iter() {
                    pairs.push((i, k));
                }
            }
        }
        Alignment::from_pairs(pairs)
    }

    /// Appends another alignment at the given input and output offsets.
    /// Used to stitch per-token alignments into a whole-text alignment.
    pub fn append_offset(&mut self, other: &Alignment, input_offset: usize, output_offset: usize) {
        self.pairs.extend(
            other
                .pairs
                .iter()
                .map(|&(i, k)| (i + input_offset as u32, k + output_offset as u32)),
        );
        // Offsets are monotone across tokens, so order is preserved without resorting.
        debug_assert!(self.pairs.windows(2).all(|w| w[0] <= w[1]));
    }

    /// Checks the totality invariant: every input index below `input_len` is related
    /// to at least one output index, and the related output indices are exactly
    /// `0..output_len`.
    pub fn is_total(&self, input_len: usize, output_len: usize) -> bool {
        let mut seen_inputs = vec![false; input_len];
        let mut seen_outputs = vec![false; output_len];
        for &(i, k) in &self.pairs {
            if i as usize >= input_len || k as usize >= output_len {
                return false;
            }
            seen_inputs[i as usize] = true;
            seen_outputs[k as usize] = true;
        }
        seen_inputs.into_iter().all(|x| x) && seen_outputs.into_iter().all(|x| x)
    }
}
