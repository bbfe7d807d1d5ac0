/*!
# grafon

This crate provides a rule-based grapheme-to-phoneme (g2p) conversion engine:
an ordered set of context-sensitive rewrite rules is applied to a string while
a bidirectional character alignment is maintained, across arbitrarily many
composed mappings. Text goes in under one notation (say, a community
orthography) and comes out under another (say, IPA or ARPABET), together with
the relation telling you, for every output character, which input characters
produced it.

Here is a quick example of how this crate works:

```rust
use std::sync::Arc;
use grafon::{Converter, Mapping, MappingConfig, Network, Rule};

let mut network = Network::new();
network.add_mapping(Arc::new(
    Mapping::from_rules(
        MappingConfig::rule_mapping("xy", "xy-ipa"),
        vec![Rule {
            rule_input: "x".to_string(),
            rule_output: "ks".to_string(),
            ..Default::default()
        }],
    )
    .unwrap(),
));
let converter = Converter::new(network);
let conversion = converter.convert("x!", "xy", "xy-ipa").unwrap();
assert_eq!(conversion.output, "ks!");
// "x" produced both output characters; "!" passed through untouched.
assert_eq!(conversion.alignment.pairs(), &[(0, 0), (0, 1), (1, 2)]);
```

# Overview

The primary types in this crate are:

- [`Rule`] and [`Mapping`]: one rewrite `in -> out / context_before _
  context_after`, and an ordered, configured collection of compiled rules.
  Everything is validated and compiled once, at load time; compiled mappings
  are immutable.
- [`Transducer`] and [`CompositeTransducer`], both implementing
  [`TransducerLike`]: apply one mapping, or an ordered chain of mappings, to a
  string. Application is infallible — input that matches no rule passes
  through unchanged — and returns an [`Alignment`] along with the output.
- [`Network`]: a directed multigraph whose nodes are notation identifiers and
  whose edges are mappings. It resolves shortest conversion paths, derives
  per-language [`Tokenizer`]s from the rule alphabet, and can compose a path
  into a new mapping edge.
- [`Converter`]: the conversion API. It tokenizes input so that only word
  runs are transduced, threads them through the composite transducer and
  stitches the results back into one output string with one whole-text
  alignment.

Mappings are described by configuration documents (see [`config`]) and are
usually compiled ahead of time into a versioned index (see [`index`]) that is
loaded once per process. After loading, the network is read-only: conversions
are pure functions and may run concurrently without synchronization.

# Alignments

An [`Alignment`] is a sorted sequence of `(input_index, output_index)` pairs
over character positions. Rule applications update it in many-to-many blocks;
chains compose it relationally, so the end-to-end relation is exact no matter
how many intermediate notations a conversion passes through.
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
pub mod alignment;
pub mod composite;
pub mod config;
pub mod converter;
pub mod index;
pub mod lexicon;
pub mod mapping;
pub mod network;
pub mod rule;
pub mod tokenizer;
pub mod transducer;
pub mod transducer_like;
mod utils;
pub use alignment::Alignment;
pub use composite::CompositeTransducer;
pub use config::ConfigError;
pub use converter::{Conversion, Converter};
pub use index::{Index, IndexError};
pub use mapping::{
    CompileMappingError, Mapping, MappingConfig, MappingKind, NormForm, RuleOrdering,
};
pub use network::{GenerationMode, Network, NetworkError};
pub use rule::{CompileRuleError, Rule};
pub use tokenizer::{Token, Tokenizer};
pub use transducer::Transducer;
pub use transducer_like::{Transduction, TransducerLike, TransductionStage};

/// The classes of failure the engine can report. Conversion itself never
/// fails once a path exists; everything here surfaces at load or update time,
/// or when resolving a request's endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// Malformed configuration: unknown fields, invalid enum values,
    /// conflicting flags.
    Config,
    /// A rule or mapping failed to compile.
    Compile,
    /// The requested notations are not connected in the network.
    NoPath,
    /// A notation identifier is unknown.
    Lookup,
    /// A rules, abbreviations or index file could not be read.
    Io,
}

/// The crate-level error type, aggregating every load-time failure surface.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration or resource file failed to load.
    #[error("{0}")]
    Config(#[from] ConfigError),
    /// A mapping failed to compile.
    #[error("{0}")]
    Compile(#[from] CompileMappingError),
    /// The network could not satisfy a request.
    #[error("{0}")]
    Network(#[from] NetworkError),
    /// A compiled index failed to load or save.
    #[error("{0}")]
    Index(#[from] IndexError),
}

impl Error {
    /// The class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(ConfigError::Io { .. }) => ErrorKind::Io,
            Error::Config(_) => ErrorKind::Config,
            Error::Compile(_) => ErrorKind::Compile,
            Error::Network(NetworkError::NoPath(..)) => ErrorKind::NoPath,
            Error::Network(NetworkError::UnknownLang(..)) => ErrorKind::Lookup,
            Error::Index(IndexError::Io { .. }) => ErrorKind::Io,
            Error::Index(IndexError::Compile { .. }) => ErrorKind::Compile,
            Error::Index(_) => ErrorKind::Config,
        }
    }

    /// Where the error originated: a file path for load errors, a mapping or
    /// notation identity otherwise.
    pub fn location(&self) -> Option<String> {
        match self {
            Error::Config(
                ConfigError::Io { path, .. }
                | ConfigError::MalformedDocument { path, .. }
                | ConfigError::MalformedCsv { path, .. }
                | ConfigError::MalformedRules { path, .. }
                | ConfigError::MissingRuleInput { path, .. }
                | ConfigError::UnsupportedFormat { path },
            ) => Some(path.display().to_string()),
            Error::Config(ConfigError::LexiconWithoutEntries { in_lang, out_lang }) => {
                Some(format!("{in_lang}->{out_lang}"))
            }
            Error::Compile(error) => Some(match error {
                CompileMappingError::Rule { in_lang, out_lang, .. }
                | CompileMappingError::ConflictingCaseSettings { in_lang, out_lang }
                | CompileMappingError::DelimiterTooLong { in_lang, out_lang, .. }
                | CompileMappingError::LegacyRuleOrdering { in_lang, out_lang, .. }
                | CompileMappingError::InvalidCaseEquivalency { in_lang, out_lang, .. }
                | CompileMappingError::Lexicon { in_lang, out_lang, .. } => {
                    format!("{in_lang}->{out_lang}")
                }
            }),
            Error::Network(NetworkError::NoPath(in_lang, out_lang)) => {
                Some(format!("{in_lang}->{out_lang}"))
            }
            Error::Network(NetworkError::UnknownLang(lang)) => Some(lang.clone()),
            Error::Index(
                IndexError::Io { path, .. }
                | IndexError::Malformed { path, .. }
                | IndexError::SchemaVersion { path, .. }
                | IndexError::Compile { path, .. },
            ) => Some(path.display().to_string()),
        }
    }
}
