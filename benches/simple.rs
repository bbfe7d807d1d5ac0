use criterion::{criterion_group, criterion_main, Criterion};
use grafon::{Converter, Mapping, MappingConfig, Network, Rule};
use std::sync::Arc;

fn mapping(in_lang: &str, out_lang: &str, rules: &[(&str, &str)]) -> Arc<Mapping> {
    let rules = rules
        .iter()
        .map(|&(input, output)| Rule {
            rule_input: input.to_string(),
            rule_output: output.to_string(),
            ..Default::default()
        })
        .collect();
    Arc::new(Mapping::from_rules(MappingConfig::rule_mapping(in_lang, out_lang), rules).unwrap())
}

fn bench_convert(c: &mut Criterion) {
    let mut network = Network::new();
    network.add_mapping(mapping(
        "dan",
        "dan-ipa",
        &[("h", "h"), ("e", "ɛ"), ("j", "j"), ("a", "æ"), ("d", "d"), ("n", "n")],
    ));
    network.add_mapping(mapping(
        "dan-ipa",
        "eng-ipa",
        &[("ɛ", "ɛ"), ("æ", "æ")],
    ));
    network.add_mapping(mapping(
        "eng-ipa",
        "eng-arpabet",
        &[("h", "HH"), ("ɛ", "EH"), ("j", "Y"), ("æ", "AE"), ("d", "D"), ("n", "N")],
    ));
    let converter = Converter::new(network);
    let paragraph = "hej hej hej, en dag en dag! hej den anden dag. ".repeat(8);
    c.bench_function("convert_paragraph_three_hops", |b| {
        b.iter(|| {
            converter
                .convert(&paragraph, "dan", "eng-arpabet")
                .unwrap()
                .output
        })
    });
}

criterion_group!(benches, bench_convert);
criterion_main!(benches);
