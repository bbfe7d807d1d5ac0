#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use grafon::{
        config, Alignment, Converter, Index, Mapping, MappingConfig, Network, NetworkError, Rule,
        TransducerLike,
    };
    use pretty_assertions::assert_eq;

    fn fixture_network() -> Network {
        let records = config::load_dir(Path::new("tests/data")).unwrap();
        Index::new(records)
            .compile(Path::new("tests/data"))
            .unwrap()
    }

    fn fixture_converter() -> Converter {
        Converter::new(fixture_network())
    }

    #[test]
    fn danish_hej_reaches_arpabet() {
        let converter = fixture_converter();
        let conversion = converter.convert("hej", "dan", "eng-arpabet").unwrap();
        assert_eq!(conversion.output, "HH EH Y");
        assert!(conversion.alignment.is_total(3, 7));
    }

    #[test]
    fn alignment_pairs_stay_sorted_and_block_monotone() {
        let converter = fixture_converter();
        let conversion = converter.convert("hej hej", "dan", "eng-arpabet").unwrap();
        let pairs = conversion.alignment.pairs();
        assert!(pairs.windows(2).all(|w| w[0] <= w[1]));
        // The first input character only produces output in the first block.
        let max_out_of_first: u32 = pairs
            .iter()
            .filter(|&&(i, _)| i == 0)
            .map(|&(_, k)| k)
            .max()
            .unwrap();
        let min_out_of_last: u32 = pairs
            .iter()
            .filter(|&&(i, _)| i as usize == 6)
            .map(|&(_, k)| k)
            .min()
            .unwrap();
        assert!(max_out_of_first < min_out_of_last);
    }

    #[test]
    fn mohawk_apostrophe_stays_inside_the_word() {
        let network = fixture_network();
        let tokenizer = network.tokenizer("moh").unwrap();
        let tokens = tokenizer.tokenize("Kanien'kéha");
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_word);
        assert_eq!(tokens[0].text, "Kanien'kéha");
    }

    #[test]
    fn english_apostrophe_splits_the_word() {
        let network = fixture_network();
        let tokenizer = network.tokenizer("eng").unwrap();
        let texts: Vec<String> = tokenizer
            .tokenize("Kanien'kéha")
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["Kanien", "'", "kéha"]);
    }

    #[test]
    fn tokenization_closure_over_fixture_languages() {
        let network = fixture_network();
        let text = "hej, Kanien'kéha ... 42 ok\n";
        for lang in ["dan", "eng", "moh"] {
            let tokenizer = network.tokenizer(lang).unwrap();
            let rebuilt: String = tokenizer.tokenize(text).into_iter().map(|t| t.text).collect();
            assert_eq!(rebuilt, text, "tokenizer for {lang} lost characters");
        }
    }

    #[test]
    fn lexicon_feeds_the_rule_chain() {
        let converter = fixture_converter();
        let conversion = converter.convert("hello", "eng", "eng-arpabet").unwrap();
        assert_eq!(conversion.output, "HH EH L OW");
    }

    #[test]
    fn lexicon_miss_passes_through() {
        let converter = fixture_converter();
        let conversion = converter.convert("zzz", "eng", "eng-ipa").unwrap();
        assert_eq!(conversion.output, "zzz");
        assert_eq!(conversion.alignment, Alignment::identity(3));
    }

    #[test]
    fn single_rule_alignment_matches_specification() {
        let mut network = Network::new();
        network.add_mapping(Arc::new(
            Mapping::from_rules(
                MappingConfig::rule_mapping("custom", "custom-out"),
                vec![Rule {
                    rule_input: "a".to_string(),
                    rule_output: "b".to_string(),
                    ..Default::default()
                }],
            )
            .unwrap(),
        ));
        let converter = Converter::new(network);
        let conversion = converter.convert("a", "custom", "custom-out").unwrap();
        assert_eq!(conversion.output, "b");
        assert_eq!(conversion.alignment.pairs(), &[(0, 0)]);
    }

    #[test]
    fn contextual_rule_wins_over_general_one() {
        let mut network = Network::new();
        let rules = vec![
            Rule {
                rule_input: "a".to_string(),
                rule_output: "b".to_string(),
                context_before: "c".to_string(),
                context_after: "d".to_string(),
                ..Default::default()
            },
            Rule {
                rule_input: "a".to_string(),
                rule_output: "e".to_string(),
                ..Default::default()
            },
        ];
        network.add_mapping(Arc::new(
            Mapping::from_rules(MappingConfig::rule_mapping("custom", "custom-out"), rules)
                .unwrap(),
        ));
        let converter = Converter::new(network);
        let conversion = converter.convert("cad", "custom", "custom-out").unwrap();
        assert_eq!(conversion.output, "cbd");
        assert_eq!(conversion.alignment.pairs(), &[(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn descendants_reflect_reachability() {
        let network = fixture_network();
        let descendants = network.descendants("dan").unwrap();
        assert!(descendants.contains("dan-ipa"));
        assert!(descendants.contains("eng-ipa"));
        assert!(descendants.contains("eng-arpabet"));
        assert!(!descendants.contains("moh-ipa"));
    }

    #[test]
    fn no_path_between_disconnected_languages() {
        let converter = fixture_converter();
        assert_eq!(
            converter.convert("hej", "dan", "moh-ipa"),
            Err(NetworkError::NoPath(
                "dan".to_string(),
                "moh-ipa".to_string()
            ))
        );
    }

    #[test]
    fn trace_exposes_every_intermediate_notation() {
        let converter = fixture_converter();
        let conversion = converter
            .convert_with_trace("hej", "dan", "eng-arpabet")
            .unwrap();
        let stages = conversion.stages.unwrap();
        let langs: Vec<&str> = stages.iter().map(|s| s.out_lang.as_str()).collect();
        assert_eq!(langs, vec!["dan-ipa", "eng-ipa", "eng-arpabet"]);
        assert_eq!(stages[0].output, "hɛj");
        assert_eq!(stages[2].output, "HH EH Y");
    }

    #[test]
    fn composition_is_associative_end_to_end() {
        let network = fixture_network();
        let full = network.transducer("dan", "eng-arpabet").unwrap();
        let head = network.transducer("dan", "eng-ipa").unwrap();
        let tail = network.transducer("eng-ipa", "eng-arpabet").unwrap();
        let direct = full.apply("hej");
        let head_result = head.apply("hej");
        let tail_result = tail.apply(&head_result.output);
        assert_eq!(direct.output, tail_result.output);
        assert_eq!(
            direct.alignment,
            head_result.alignment.compose(&tail_result.alignment)
        );
    }

    #[test]
    fn update_round_trip_through_the_compiled_index() {
        let records = config::load_dir(Path::new("tests/data")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json.gz");
        Index::new(records).save(&path).unwrap();
        let network = Index::load_network(&path).unwrap();
        let converter = Converter::new(network);
        let conversion = converter.convert("hej", "dan", "eng-arpabet").unwrap();
        assert_eq!(conversion.output, "HH EH Y");
    }

    #[test]
    fn generated_mapping_shortcuts_the_chain() {
        let network = fixture_network();
        let generated = network
            .generate_mapping("dan", "eng-arpabet", grafon::GenerationMode::Direct)
            .unwrap();
        assert_eq!(generated.id(), ("dan", "eng-arpabet"));
        let (output, _) = generated.apply("e");
        assert_eq!(output, "EH");
    }

    #[test]
    fn punctuation_and_whitespace_pass_through_conversion() {
        let converter = fixture_converter();
        let conversion = converter.convert("hej, hej!", "dan", "eng-arpabet").unwrap();
        assert_eq!(conversion.output, "HH EH Y, HH EH Y!");
        assert!(conversion
            .alignment
            .is_total("hej, hej!".chars().count(), conversion.output.chars().count()));
    }
}
