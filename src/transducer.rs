//! The rule engine hot loop: applies one mapping's compiled rules to a string
//! while maintaining the character alignment and the protected-position mask.
use crate::alignment::Alignment;
use crate::mapping::Mapping;
use crate::transducer_like::{sealed, Transduction, TransducerLike, TransductionStage};
use crate::utils;
use fixedbitset_stack::FixedBitSet;
use std::sync::Arc;

/// A cheap view that applies one [`Mapping`] to strings. Transducers hold a
/// shared reference to their compiled mapping and may be created per request
/// without cost.
#[derive(Debug, Clone)]
pub struct Transducer {
    mapping: Arc<Mapping>,
}

impl Transducer {
    /// Creates a transducer over a compiled mapping.
    pub fn new(mapping: Arc<Mapping>) -> Transducer {
        Transducer { mapping }
    }

    /// The mapping driving this transducer.
    #[inline]
    pub fn mapping(&self) -> &Arc<Mapping> {
        &self.mapping
    }
}

impl sealed::Sealed for Transducer {}

impl TransducerLike for Transducer {
    fn apply(&self, input: &str) -> Transduction {
        let (output, alignment) = self.mapping.apply(input);
        Transduction { output, alignment }
    }

    fn apply_with_trace(&self, input: &str) -> (Transduction, Vec<TransductionStage>) {
        let transduction = self.apply(input);
        let stage = TransductionStage {
            out_lang: self.mapping.out_lang().to_string(),
            output: transduction.output.clone(),
            alignment: transduction.alignment.clone(),
        };
        (transduction, vec![stage])
    }

    fn in_lang(&self) -> Option<&str> {
        Some(self.mapping.in_lang())
    }

    fn out_lang(&self) -> Option<&str> {
        Some(self.mapping.out_lang())
    }
}

/// Applies a mapping's rules to an already-normalized string.
///
/// One pass: rules run in their compile-time order. For each rule, the working
/// string is scanned left to right for non-overlapping matches that do not touch
/// a protected position; every match is spliced in place, the alignment is
/// updated as a many-to-many block, and, when feeding prevention applies, the
/// replacement span (delimiter included) is protected from all later rules.
/// Contexts may look into protected spans; only match positions are checked.
pub(crate) fn apply_rules(mapping: &Mapping, input: &str) -> (String, Alignment) {
    let mut working = input.to_string();
    let mut char_len = working.chars().count();
    let mut alignment = Alignment::identity(char_len);
    let mut protected = FixedBitSet::with_capacity(char_len);
    let delimiter: Option<char> = mapping.config().out_delimiter.chars().next();
    let mut delimited = false;
    for rule in mapping.rules() {
        let protect = rule.prevent_feeding() || mapping.config().prevent_feeding;
        let mut search_from = 0usize;
        while search_from <= working.len() {
            let found = match rule.pattern().find_from_pos(&working, search_from) {
                Ok(found) => found,
                Err(error) => {
                    // Backtracking limits and the like; treated as "no match" so
                    // the conversion path stays infallible.
                    log::warn!(
                        "mapping {}->{}: match aborted for rule #{}: {}",
                        mapping.in_lang(),
                        mapping.out_lang(),
                        rule.source_index(),
                        error
                    );
                    None
                }
            };
            let Some(matched) = found else { break };
            if matched.start() == matched.end() {
                // A nullable pattern matched the empty string; it cannot rewrite
                // anything, so step over one character to guarantee progress.
                match working[matched.end()..].chars().next() {
                    Some(c) => {
                        search_from = matched.end() + c.len_utf8();
                        continue;
                    }
                    None => break,
                }
            }
            let char_start = working[..matched.start()].chars().count();
            let char_end = char_start + working[matched.start()..matched.end()].chars().count();
            if (char_start..char_end).any(|i| protected.contains(i)) {
                let first = working[matched.start()..]
                    .chars()
                    .next()
                    .expect("match is non-empty");
                search_from = matched.start() + first.len_utf8();
                continue;
            }
            let matched_text = &working[matched.start()..matched.end()];
            let mut replacement = if mapping.config().preserve_case {
                utils::transfer_case(matched_text, rule.replacement())
            } else {
                rule.replacement().to_string()
            };
            if let Some(d) = delimiter {
                replacement.push(d);
                delimited = true;
            }
            let replacement_chars = replacement.chars().count();
            let splice_start = matched.start();
            let splice_end = matched.end();
            working.replace_range(splice_start..splice_end, &replacement);
            alignment.replace_output_span(char_start, char_end, replacement_chars);
            char_len = char_len + replacement_chars - (char_end - char_start);
            protected = shift_protected(
                &protected,
                char_start,
                char_end,
                replacement_chars,
                protect,
                char_len,
            );
            search_from = splice_start + replacement.len();
        }
    }
    // Trim the one delimiter left dangling after the final application; input
    // that happened to end with the delimiter character stays intact.
    if let Some(d) = delimiter {
        if delimited && working.ends_with(d) {
            working.truncate(working.len() - d.len_utf8());
            alignment.truncate_output(char_len - 1);
        }
    }
    (working, alignment)
}

/// Rebuilds the protected mask after a span replacement: positions before the
/// span keep their bits, positions after it shift by the length difference, and
/// the fresh replacement span is protected when `protect_new` is set.
fn shift_protected(
    old: &FixedBitSet,
    span_start: usize,
    span_end: usize,
    replacement_len: usize,
    protect_new: bool,
    new_len: usize,
) -> FixedBitSet {
    let mut mask = FixedBitSet::with_capacity(new_len);
    for position in old.ones() {
        if position < span_start {
            mask.insert(position);
        } else if position >= span_end {
            mask.insert(position - span_end + span_start + replacement_len);
        }
    }
    if protect_new {
        for position in span_start..span_start + replacement_len {
            mask.insert(position);
        }
    }
    mask
}
