//! Loading of mapping configuration documents, rules files and abbreviation
//! files from a language directory tree. All parsing happens at load or update
//! time; the conversion path never touches the filesystem.
use crate::index::MappingRecord;
use crate::mapping::MappingConfig;
use crate::rule::Rule;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The name of the per-language configuration document.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// One configuration document: an ordered list of mapping configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingDocument {
    /// The mappings declared by this document, in order.
    pub mappings: Vec<MappingConfig>,
}

#[derive(Debug, thiserror::Error)]
/// The error type for configuration loading.
pub enum ConfigError {
    /// A referenced file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A configuration document did not parse or used unknown fields.
    #[error("malformed configuration document {path}: {source}")]
    MalformedDocument {
        /// The offending document.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },
    /// A delimited rules or abbreviations file did not parse.
    #[error("malformed delimited file {path}: {source}")]
    MalformedCsv {
        /// The offending file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: csv::Error,
    },
    /// A structured rules file did not parse.
    #[error("malformed rules file {path}: {source}")]
    MalformedRules {
        /// The offending file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },
    /// A delimited rules file had a record with no `in` column.
    #[error("{path}: record {record} has no `in` column")]
    MissingRuleInput {
        /// The offending file.
        path: PathBuf,
        /// One-based record number.
        record: usize,
    },
    /// A rules file had an extension the loader does not recognize.
    #[error("{path}: unsupported rules file extension (expected .csv, .yaml or .json)")]
    UnsupportedFormat {
        /// The offending file.
        path: PathBuf,
    },
    /// A lexicon mapping declared no rules file to read its entries from.
    #[error("lexicon mapping {in_lang}->{out_lang} needs a `rules_path` with its entries")]
    LexiconWithoutEntries {
        /// The mapping's input notation.
        in_lang: String,
        /// The mapping's output notation.
        out_lang: String,
    },
}

fn read_to_string(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses one configuration document.
pub fn load_document(path: &Path) -> Result<MappingDocument, ConfigError> {
    let text = read_to_string(path)?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::MalformedDocument {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_bool_cell(cell: Option<&str>) -> bool {
    matches!(
        cell.map(str::trim),
        Some("true") | Some("True") | Some("1")
    )
}

/// Loads a rules file. Delimited files carry the columns
/// `in, out, context_before, context_after, prevent_feeding` (first two
/// required); structured files are a list of objects with the same field names.
pub fn load_rules(path: &Path) -> Result<Vec<Rule>, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_path(path)
                .map_err(|source| ConfigError::MalformedCsv {
                    path: path.to_path_buf(),
                    source,
                })?;
            let mut rules = Vec::new();
            for (number, record) in reader.records().enumerate() {
                let record = record.map_err(|source| ConfigError::MalformedCsv {
                    path: path.to_path_buf(),
                    source,
                })?;
                let rule_input = record
                    .get(0)
                    .filter(|cell| !cell.is_empty())
                    .ok_or(ConfigError::MissingRuleInput {
                        path: path.to_path_buf(),
                        record: number + 1,
                    })?
                    .to_string();
                rules.push(Rule {
                    rule_input,
                    rule_output: record.get(1).unwrap_or_default().to_string(),
                    context_before: record.get(2).unwrap_or_default().to_string(),
                    context_after: record.get(3).unwrap_or_default().to_string(),
                    prevent_feeding: parse_bool_cell(record.get(4)),
                    comment: None,
                });
            }
            Ok(rules)
        }
        Some("yaml") | Some("yml") | Some("json") => {
            let text = read_to_string(path)?;
            serde_yaml::from_str(&text).map_err(|source| ConfigError::MalformedRules {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Loads an abbreviations file: a delimited file whose first column is the
/// abbreviation name and whose remaining columns are its expansions, in order.
pub fn load_abbreviations(path: &Path) -> Result<IndexMap<String, Vec<String>>, ConfigError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|source| ConfigError::MalformedCsv {
            path: path.to_path_buf(),
            source,
        })?;
    let mut abbreviations = IndexMap::new();
    for record in reader.records() {
        let record = record.map_err(|source| ConfigError::MalformedCsv {
            path: path.to_path_buf(),
            source,
        })?;
        let Some(name) = record.get(0).filter(|cell| !cell.is_empty()) else {
            continue;
        };
        let expansions: Vec<String> = record
            .iter()
            .skip(1)
            .filter(|cell| !cell.is_empty())
            .map(str::to_string)
            .collect();
        if abbreviations.insert(name.to_string(), expansions).is_some() {
            log::warn!(
                "{}: abbreviation {:?} is defined more than once; keeping the last definition",
                path.display(),
                name
            );
        }
    }
    Ok(abbreviations)
}

/// Loads lexicon entries from a delimited file of `word, output` records.
pub fn load_lexicon(path: &Path) -> Result<Vec<(String, String)>, ConfigError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|source| ConfigError::MalformedCsv {
            path: path.to_path_buf(),
            source,
        })?;
    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| ConfigError::MalformedCsv {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(word) = record.get(0).filter(|cell| !cell.is_empty()) {
            entries.push((
                word.to_string(),
                record.get(1).unwrap_or_default().to_string(),
            ));
        }
    }
    Ok(entries)
}

/// Loads every mapping declared by one document, resolving referenced files
/// relative to the document's directory.
pub fn load_document_records(path: &Path) -> Result<Vec<MappingRecord>, ConfigError> {
    let document = load_document(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let mut records = Vec::with_capacity(document.mappings.len());
    for config in document.mappings {
        records.push(load_record(base, config)?);
    }
    Ok(records)
}

fn load_record(base: &Path, config: MappingConfig) -> Result<MappingRecord, ConfigError> {
    use crate::mapping::MappingKind;
    let rules_path = config.rules_path.as_ref().map(|p| base.join(p));
    let (rules, lexicon) = match config.kind {
        MappingKind::Lexicon => {
            let path = rules_path.ok_or_else(|| ConfigError::LexiconWithoutEntries {
                in_lang: config.in_lang.clone(),
                out_lang: config.out_lang.clone(),
            })?;
            (Vec::new(), load_lexicon(&path)?)
        }
        MappingKind::Unidecode => (Vec::new(), Vec::new()),
        MappingKind::Rule => (
            match &rules_path {
                Some(path) => load_rules(path)?,
                None => Vec::new(),
            },
            Vec::new(),
        ),
    };
    let abbreviations = match &config.abbreviations_path {
        Some(path) => load_abbreviations(&base.join(path))?,
        None => IndexMap::new(),
    };
    Ok(MappingRecord {
        config,
        rules,
        abbreviations,
        lexicon,
    })
}

/// Recursively scans a directory tree for configuration documents named
/// [`CONFIG_FILE_NAME`] and loads every mapping they declare, in a stable
/// (path-sorted) order.
pub fn load_dir(root: &Path) -> Result<Vec<MappingRecord>, ConfigError> {
    let mut documents = Vec::new();
    collect_documents(root, &mut documents)?;
    documents.sort();
    let mut records = Vec::new();
    for document in documents {
        log::debug!("loading {}", document.display());
        records.extend(load_document_records(&document)?);
    }
    Ok(records)
}

fn collect_documents(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_documents(&path, found)?;
        } else if path.file_name().and_then(|n| n.to_str()) == Some(CONFIG_FILE_NAME) {
            found.push(path);
        }
    }
    Ok(())
}
