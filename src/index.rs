//! The compiled index: a schema-versioned, gzip-compressed serialization of a
//! whole mapping network, written by `update` and loaded once per process.
use crate::mapping::{CompileMappingError, Mapping, MappingConfig};
use crate::network::Network;
use crate::rule::Rule;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The schema version written into and expected from compiled indexes.
pub const SCHEMA_VERSION: &str = "2.0";

/// Everything needed to recompile one mapping: its configuration and the raw
/// sources of its rules, abbreviations and dictionary entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRecord {
    /// The mapping's configuration.
    pub config: MappingConfig,
    /// The rule sources, in document order.
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// The abbreviation table, in listed order.
    #[serde(default)]
    pub abbreviations: IndexMap<String, Vec<String>>,
    /// Dictionary entries of a `lexicon` mapping.
    #[serde(default)]
    pub lexicon: Vec<(String, String)>,
}

/// The on-disk form: the catalog of all mappings plus the adjacency description
/// of the network they induce.
#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    schema_version: String,
    catalog: Vec<MappingRecord>,
    adjacency: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
/// The error type for reading and writing compiled indexes.
pub enum IndexError {
    /// The index file could not be read or written.
    #[error("cannot access index {path}: {source}")]
    Io {
        /// The index path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The index payload did not parse.
    #[error("malformed index {path}: {source}")]
    Malformed {
        /// The index path.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The index was produced by an incompatible schema.
    #[error(
        "index {path} has schema version {found}, but this build expects {expected}; \
         regenerate it with `update`"
    )]
    SchemaVersion {
        /// The index path.
        path: PathBuf,
        /// The version found in the file.
        found: String,
        /// The version this build expects.
        expected: String,
    },
    /// A catalog entry failed to recompile.
    #[error("index {path}: {source}")]
    Compile {
        /// The index path.
        path: PathBuf,
        /// The mapping-level error.
        #[source]
        source: CompileMappingError,
    },
}

/// A compiled index in memory: the catalog of mapping records.
#[derive(Debug, Default)]
pub struct Index {
    records: Vec<MappingRecord>,
}

impl Index {
    /// Creates an index over a catalog of records.
    pub fn new(records: Vec<MappingRecord>) -> Index {
        Index { records }
    }

    /// The catalog, in registration order.
    #[inline]
    pub fn records(&self) -> &[MappingRecord] {
        &self.records
    }

    /// Reads and decompresses an index file, verifying its schema version.
    pub fn load(path: &Path) -> Result<Index, IndexError> {
        let file = std::fs::File::open(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut payload = String::new();
        GzDecoder::new(file)
            .read_to_string(&mut payload)
            .map_err(|source| IndexError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let file: IndexFile =
            serde_json::from_str(&payload).map_err(|source| IndexError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        if file.schema_version != SCHEMA_VERSION {
            return Err(IndexError::SchemaVersion {
                path: path.to_path_buf(),
                found: file.schema_version,
                expected: SCHEMA_VERSION.to_string(),
            });
        }
        Ok(Index {
            records: file.catalog,
        })
    }

    /// Serializes, compresses and writes the index, including the adjacency
    /// description of the network the catalog induces.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let mut adjacency: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for record in &self.records {
            adjacency
                .entry(record.config.in_lang.clone())
                .or_default()
                .push(record.config.out_lang.clone());
            adjacency.entry(record.config.out_lang.clone()).or_default();
        }
        for targets in adjacency.values_mut() {
            targets.sort_unstable();
        }
        let file = IndexFile {
            schema_version: SCHEMA_VERSION.to_string(),
            catalog: self.records.clone(),
            adjacency,
        };
        let payload = serde_json::to_string(&file).map_err(|source| IndexError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        let out = std::fs::File::create(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut encoder = GzEncoder::new(out, Compression::default());
        encoder
            .write_all(payload.as_bytes())
            .and_then(|_| encoder.finish().map(|_| ()))
            .map_err(|source| IndexError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Compiles every catalog entry and assembles the network.
    pub fn compile(&self, path: &Path) -> Result<Network, IndexError> {
        let mut network = Network::new();
        for record in &self.records {
            let mapping = Mapping::compile(
                record.config.clone(),
                record.rules.clone(),
                record.abbreviations.clone(),
                record.lexicon.clone(),
            )
            .map_err(|source| IndexError::Compile {
                path: path.to_path_buf(),
                source,
            })?;
            network.add_mapping(Arc::new(mapping));
        }
        Ok(network)
    }

    /// Loads and compiles an index file in one step.
    pub fn load_network(path: &Path) -> Result<Network, IndexError> {
        Index::load(path)?.compile(path)
    }
}
