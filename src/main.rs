//! The `grafon` command-line front end: convert text, rebuild the compiled
//! index, inspect tokenization and registered mappings.
use clap::{Parser, Subcommand};
use grafon::{Converter, ErrorKind, GenerationMode, Index};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "grafon", version, about = "Rule-based g2p conversion with character alignment")]
struct Cli {
    /// Path to the compiled index.
    #[arg(long, global = true, default_value = "index.json.gz")]
    index: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert text from one notation to another.
    Convert {
        /// The input notation.
        in_lang: String,
        /// The output notation.
        out_lang: String,
        /// The text to convert.
        text: String,
        /// Also print every intermediate stage and the final alignment.
        #[arg(long)]
        trace: bool,
    },
    /// Rebuild the compiled index from a directory of configuration documents.
    Update {
        /// The directory to scan for `config.yaml` documents.
        dir: PathBuf,
    },
    /// Split text into word and non-word tokens for a notation.
    Tokenize {
        /// The notation whose tokenizer to use.
        lang: String,
        /// The text to tokenize.
        text: String,
    },
    /// Compose the mappings along a path into a single new mapping and print it.
    GenerateMapping {
        /// The input notation.
        in_lang: String,
        /// The output notation.
        out_lang: String,
        /// Compose between the notations' IPA nodes instead.
        #[arg(long)]
        ipa: bool,
    },
    /// List the mappings registered in the index.
    ShowMappings {
        /// Also show per-mapping configuration details.
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            let code: u8 = match error.kind() {
                ErrorKind::NoPath => 3,
                ErrorKind::Config | ErrorKind::Compile => 4,
                ErrorKind::Lookup => 2,
                ErrorKind::Io => 1,
            };
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<(), grafon::Error> {
    match cli.command {
        Command::Convert {
            in_lang,
            out_lang,
            text,
            trace,
        } => {
            let converter = Converter::new(Index::load_network(&cli.index)?);
            let conversion = if trace {
                converter.convert_with_trace(&text, &in_lang, &out_lang)?
            } else {
                converter.convert(&text, &in_lang, &out_lang)?
            };
            if let Some(stages) = &conversion.stages {
                for stage in stages {
                    println!("{}: {}", stage.out_lang, stage.output);
                }
                println!("alignment: {:?}", conversion.alignment);
            }
            println!("{}", conversion.output);
            Ok(())
        }
        Command::Update { dir } => {
            let records = grafon::config::load_dir(&dir)?;
            let index = Index::new(records);
            // Compile before writing so a broken catalog never reaches disk.
            let network = index.compile(&cli.index)?;
            index.save(&cli.index)?;
            println!(
                "wrote {} ({} mappings, {} notations)",
                cli.index.display(),
                network.mappings().count(),
                network.langs().len()
            );
            Ok(())
        }
        Command::Tokenize { lang, text } => {
            let network = Index::load_network(&cli.index)?;
            let tokenizer = network.tokenizer(&lang)?;
            for token in tokenizer.tokenize(&text) {
                let kind = if token.is_word { "word" } else { "non-word" };
                println!("{kind}\t{}", token.text);
            }
            Ok(())
        }
        Command::GenerateMapping {
            in_lang,
            out_lang,
            ipa,
        } => {
            let network = Index::load_network(&cli.index)?;
            let mode = if ipa {
                GenerationMode::Ipa
            } else {
                GenerationMode::Direct
            };
            let mapping = network.generate_mapping(&in_lang, &out_lang, mode)?;
            let record = grafon::index::MappingRecord {
                config: mapping.config().clone(),
                rules: mapping.rules().iter().map(|r| r.source().clone()).collect(),
                abbreviations: mapping.abbreviations().clone(),
                lexicon: mapping.lexicon_entries().to_vec(),
            };
            print!(
                "{}",
                serde_yaml::to_string(&record).expect("mapping records always serialize")
            );
            Ok(())
        }
        Command::ShowMappings { verbose } => {
            let network = Index::load_network(&cli.index)?;
            for mapping in network.mappings() {
                println!(
                    "{} -> {} ({}, {} rules)",
                    mapping.in_lang(),
                    mapping.out_lang(),
                    mapping.config().kind,
                    mapping.rules().len()
                );
                if verbose {
                    println!("  display name:  {}", mapping.display_name());
                    println!("  rule ordering: {}", mapping.config().rule_ordering);
                    println!("  norm form:     {}", mapping.config().norm_form);
                    if !mapping.config().out_delimiter.is_empty() {
                        println!("  out delimiter: {:?}", mapping.config().out_delimiter);
                    }
                }
            }
            Ok(())
        }
    }
}
