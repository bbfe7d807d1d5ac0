//! The mapping network: a directed multigraph whose nodes are notation
//! identifiers and whose edges are compiled mappings.
use crate::composite::CompositeTransducer;
use crate::mapping::{Mapping, MappingConfig, MappingKind, RuleOrdering};
use crate::rule::Rule;
use crate::tokenizer::Tokenizer;
use crate::transducer_like::TransducerLike;
use ahash::AHashMap;
use displaydoc::Display;
use indexmap::IndexMap;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, VecDeque};
use std::fmt::Debug;
use std::sync::Arc;
use string_interner::backend::StringBackend;
use string_interner::symbol::SymbolU32;
use string_interner::StringInterner;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
/// Represents the error when the network cannot satisfy a conversion request.
pub enum NetworkError {
    /// no path from {0} to {1} in the mapping network
    NoPath(String, String),
    /// unknown notation identifier {0}
    UnknownLang(String),
}

impl std::error::Error for NetworkError {}

/// How [`Network::generate_mapping`] picks the endpoints to compose between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum GenerationMode {
    /// Compose between the two named notations.
    #[default]
    Direct,
    /// Compose between the notations' IPA nodes (`<lang>-ipa`).
    Ipa,
}

/// The directed multigraph of mappings, loaded once per process and read-only
/// on the conversion path.
///
/// Notation identifiers are interned; nodes and edges are added when mappings
/// are registered. The graph may contain cycles (reversed mappings), so every
/// search runs breadth-first with a visited set.
#[derive(Default)]
pub struct Network {
    interner: StringInterner<StringBackend<SymbolU32>>,
    graph: DiGraph<SymbolU32, Arc<Mapping>>,
    nodes: AHashMap<SymbolU32, NodeIndex>,
}

impl Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("nodes", &self.graph.node_count())
            .field("mappings", &self.graph.edge_count())
            .finish()
    }
}

impl Network {
    /// Creates an empty network.
    pub fn new() -> Network {
        Network::default()
    }

    /// Installs a mapping, creating its endpoint nodes as needed. O(1).
    ///
    /// A mapping with the same `(in_lang, out_lang)` identity as an existing
    /// edge replaces it with a warning, keeping edge identities unique.
    pub fn add_mapping(&mut self, mapping: Arc<Mapping>) {
        let from = self.intern_node(mapping.in_lang());
        let to = self.intern_node(mapping.out_lang());
        let existing = self
            .graph
            .edges_connecting(from, to)
            .map(|edge| edge.id())
            .next();
        if let Some(edge) = existing {
            log::warn!(
                "mapping {}->{} is already registered; replacing the previous edge",
                mapping.in_lang(),
                mapping.out_lang()
            );
            self.graph[edge] = mapping;
        } else {
            self.graph.add_edge(from, to, mapping);
        }
    }

    fn intern_node(&mut self, lang: &str) -> NodeIndex {
        let symbol = self.interner.get_or_intern(lang);
        match self.nodes.get(&symbol) {
            Some(&node) => node,
            None => {
                let node = self.graph.add_node(symbol);
                self.nodes.insert(symbol, node);
                node
            }
        }
    }

    fn node(&self, lang: &str) -> Option<NodeIndex> {
        let symbol = self.interner.get(lang)?;
        self.nodes.get(&symbol).copied()
    }

    fn lang_name(&self, node: NodeIndex) -> &str {
        self.interner
            .resolve(self.graph[node])
            .expect("node symbols are always interned")
    }

    /// Whether `lang` names a node of the network.
    pub fn contains_lang(&self, lang: &str) -> bool {
        self.node(lang).is_some()
    }

    /// All notation identifiers, sorted.
    pub fn langs(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self
            .graph
            .node_indices()
            .map(|node| self.lang_name(node))
            .collect();
        langs.sort_unstable();
        langs
    }

    /// All registered mappings, in registration order.
    pub fn mappings(&self) -> impl Iterator<Item = &Arc<Mapping>> {
        self.graph.edge_weights()
    }

    /// Finds a shortest path (by edge count) from `in_lang` to `out_lang` and
    /// returns its mappings in application order.
    ///
    /// Ties are broken deterministically by edge registration order. Asking for
    /// a path from a notation to itself yields the empty chain.
    pub fn find_path(&self, in_lang: &str, out_lang: &str) -> Result<Vec<Arc<Mapping>>, NetworkError> {
        let source = self
            .node(in_lang)
            .ok_or_else(|| NetworkError::UnknownLang(in_lang.to_string()))?;
        let target = self
            .node(out_lang)
            .ok_or_else(|| NetworkError::UnknownLang(out_lang.to_string()))?;
        if source == target {
            return Ok(Vec::new());
        }
        let mut predecessor: AHashMap<NodeIndex, EdgeIndex> = AHashMap::new();
        let mut queue = VecDeque::from([source]);
        'search: while let Some(node) = queue.pop_front() {
            let mut edges: Vec<EdgeIndex> = self.graph.edges(node).map(|edge| edge.id()).collect();
            edges.sort_unstable();
            for edge in edges {
                let (_, next) = self
                    .graph
                    .edge_endpoints(edge)
                    .expect("edge indices come from the graph itself");
                if next == source || predecessor.contains_key(&next) {
                    continue;
                }
                predecessor.insert(next, edge);
                if next == target {
                    break 'search;
                }
                queue.push_back(next);
            }
        }
        if !predecessor.contains_key(&target) {
            return Err(NetworkError::NoPath(
                in_lang.to_string(),
                out_lang.to_string(),
            ));
        }
        let mut path = Vec::new();
        let mut node = target;
        while node != source {
            let edge = predecessor[&node];
            path.push(Arc::clone(&self.graph[edge]));
            let (from, _) = self.graph.edge_endpoints(edge).expect("edge exists");
            node = from;
        }
        path.reverse();
        Ok(path)
    }

    /// The notations reachable from `in_lang`, sorted, excluding `in_lang` itself.
    pub fn descendants(&self, in_lang: &str) -> Result<BTreeSet<String>, NetworkError> {
        let source = self
            .node(in_lang)
            .ok_or_else(|| NetworkError::UnknownLang(in_lang.to_string()))?;
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut visited: ahash::AHashSet<NodeIndex> = [source].into_iter().collect();
        let mut queue = VecDeque::from([source]);
        while let Some(node) = queue.pop_front() {
            for next in self.graph.neighbors(node) {
                if visited.insert(next) {
                    seen.insert(self.lang_name(next).to_string());
                    queue.push_back(next);
                }
            }
        }
        Ok(seen)
    }

    /// Builds the composite transducer for the shortest path between two notations.
    pub fn transducer(
        &self,
        in_lang: &str,
        out_lang: &str,
    ) -> Result<CompositeTransducer, NetworkError> {
        Ok(CompositeTransducer::from_mappings(
            self.find_path(in_lang, out_lang)?,
        ))
    }

    /// Derives the tokenizer for a notation from every mapping that consumes it.
    pub fn tokenizer(&self, lang: &str) -> Result<Tokenizer, NetworkError> {
        if !self.contains_lang(lang) {
            return Err(NetworkError::UnknownLang(lang.to_string()));
        }
        Ok(Tokenizer::for_language(
            self.mappings()
                .filter(|mapping| mapping.in_lang() == lang)
                .map(Arc::as_ref),
        ))
    }

    /// Composes the mappings along the path between two notations into a single
    /// new mapping edge.
    ///
    /// Every distinct rule input of the first hop is fed through the whole chain;
    /// the surviving `(input, output)` pairs become literal rules of the new
    /// mapping. In [`GenerationMode::Ipa`], the path is resolved between the
    /// notations' `-ipa` nodes instead.
    pub fn generate_mapping(
        &self,
        in_lang: &str,
        out_lang: &str,
        mode: GenerationMode,
    ) -> Result<Mapping, NetworkError> {
        let (source, target) = match mode {
            GenerationMode::Direct => (in_lang.to_string(), out_lang.to_string()),
            GenerationMode::Ipa => (format!("{in_lang}-ipa"), format!("{out_lang}-ipa")),
        };
        let path = self.find_path(&source, &target)?;
        let chain = CompositeTransducer::from_mappings(path.iter().cloned());
        let mut rules = Vec::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        if let Some(first) = path.first() {
            for rule in first.rules() {
                let input = rule.source().rule_input.clone();
                if !seen.insert(input.clone()) {
                    continue;
                }
                let output = chain.apply(&input).output;
                if output == input {
                    continue;
                }
                rules.push(Rule {
                    rule_input: input,
                    rule_output: output,
                    ..Default::default()
                });
            }
        }
        let mut config = MappingConfig::rule_mapping(&source, &target);
        config.display_name = Some(format!("generated from {source} to {target}"));
        config.kind = MappingKind::Rule;
        config.rule_ordering = RuleOrdering::ApplyLongestFirst;
        config.escape_special = true;
        Mapping::compile(config, rules, IndexMap::new(), Vec::new()).map_err(|error| {
            // Generated rules are literal pairs, so compilation cannot fail in
            // practice; surface it as a path problem if it somehow does.
            log::error!("generated mapping failed to compile: {error}");
            NetworkError::NoPath(source, target)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn sample_network() -> Network {
        let mut network = Network::new();
        network.add_mapping(mapping("dan", "dan-ipa", &[("h", "h")]));
        network.add_mapping(mapping("dan-ipa", "eng-ipa", &[("h", "h")]));
        network.add_mapping(mapping("eng-ipa", "eng-arpabet", &[("h", "HH")]));
        network.add_mapping(mapping("fra", "fra-ipa", &[("ou", "u")]));
        network
    }

    #[test]
    fn shortest_path_by_edge_count() {
        let network = sample_network();
        let path = network.find_path("dan", "eng-arpabet").unwrap();
        let hops: Vec<(&str, &str)> = path.iter().map(|m| m.id()).collect();
        assert_eq!(
            hops,
            vec![
                ("dan", "dan-ipa"),
                ("dan-ipa", "eng-ipa"),
                ("eng-ipa", "eng-arpabet")
            ]
        );
    }

    #[test]
    fn self_path_is_empty() {
        let network = sample_network();
        assert!(network.find_path("dan", "dan").unwrap().is_empty());
    }

    #[test]
    fn unconnected_nodes_report_no_path() {
        let network = sample_network();
        assert_eq!(
            network.find_path("fra", "eng-arpabet").unwrap_err(),
            NetworkError::NoPath("fra".to_string(), "eng-arpabet".to_string())
        );
    }

    #[test]
    fn unknown_lang_is_a_lookup_error() {
        let network = sample_network();
        assert_eq!(
            network.find_path("xyz", "dan").unwrap_err(),
            NetworkError::UnknownLang("xyz".to_string())
        );
    }

    #[test]
    fn cycles_terminate() {
        let mut network = sample_network();
        network.add_mapping(mapping("eng-ipa", "dan-ipa", &[("h", "h")]));
        // The reverse edge creates a cycle; search must still terminate.
        assert!(network.find_path("dan", "fra").is_err());
        let descendants = network.descendants("dan").unwrap();
        assert!(descendants.contains("eng-arpabet"));
    }

    #[test]
    fn descendants_are_reachable_notations() {
        let network = sample_network();
        let descendants = network.descendants("dan").unwrap();
        assert_eq!(
            descendants.into_iter().collect::<Vec<_>>(),
            vec!["dan-ipa", "eng-arpabet", "eng-ipa"]
        );
    }

    #[test]
    fn duplicate_identity_replaces_edge() {
        let mut network = sample_network();
        network.add_mapping(mapping("dan", "dan-ipa", &[("h", "X")]));
        let path = network.find_path("dan", "dan-ipa").unwrap();
        assert_eq!(path.len(), 1);
        let (output, _) = path[0].apply("h");
        assert_eq!(output, "X");
    }

    #[test]
    fn generated_mapping_composes_the_chain() {
        let network = sample_network();
        let generated = network
            .generate_mapping("dan", "eng-arpabet", GenerationMode::Direct)
            .unwrap();
        assert_eq!(generated.id(), ("dan", "eng-arpabet"));
        let (output, _) = generated.apply("h");
        assert_eq!(output, "HH");
    }

    #[test]
    fn ipa_mode_routes_between_ipa_nodes() {
        let network = sample_network();
        let generated = network
            .generate_mapping("dan", "eng", GenerationMode::Ipa)
            .unwrap();
        assert_eq!(generated.id(), ("dan-ipa", "eng-ipa"));
    }
}
