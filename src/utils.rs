//! Utility functions for the library.
use ahash::AHashSet;

/// Reapplies the case pattern of `matched` onto `replacement`, character by
/// character. Output characters beyond the matched length adopt the case of the
/// last matched character. The replacement is expected in its lowercase form,
/// which is how case-insensitive rules store it.
pub(crate) fn transfer_case(matched: &str, replacement: &str) -> String {
    let pattern: Vec<char> = matched.chars().collect();
    let mut out = String::with_capacity(replacement.len());
    for (index, c) in replacement.chars().enumerate() {
        let template = pattern.get(index).or_else(|| pattern.last());
        match template {
            Some(t) if t.is_uppercase() => out.extend(c.to_uppercase()),
            _ => out.push(c),
        }
    }
    out
}

/// Regex syntax characters that never denote themselves in an unescaped rule
/// pattern. Used when harvesting the literal characters of rule inputs for
/// tokenizer word-character sets.
pub(crate) fn is_regex_syntax(c: char) -> bool {
    matches!(
        c,
        '[' | ']' | '(' | ')' | '{' | '}' | '|' | '*' | '+' | '?' | '^' | '$' | '.' | '\\'
    )
}

/// A sorted display form of a character set, for deterministic debug output.
pub(crate) fn sorted_char_set(set: &AHashSet<char>) -> String {
    let mut chars: Vec<char> = set.iter().copied().collect();
    chars.sort_unstable();
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn transfer_case_follows_pattern() {
        assert_eq!(transfer_case("Hej", "hello"), "Hello");
        assert_eq!(transfer_case("HEJ", "hello"), "HELLO");
        assert_eq!(transfer_case("hej", "hello"), "hello");
    }

    #[test]
    fn transfer_case_tail_uses_last_character() {
        assert_eq!(transfer_case("aB", "xyz"), "xYZ");
    }
}
