//! Annotation and term-sequence flattening on real parses.

use tomtit::annotate::annotate;
use tomtit::builtin_grammars::{demo_grammar, TableBuilder};
use tomtit::forest::{Forest, NodeId, SubProps};
use tomtit::grammar::{Grammar, RuleProps};
use tomtit::parser::Parser;
use tomtit::query::{Engine, ParseOptions};
use tomtit::text::TextSpec;
use tomtit::tokenizer::match_terminals;

fn annotated_forest(g: &Grammar, query: &str) -> (Forest, NodeId) {
    let mut forest = Forest::new();
    let matches = match_terminals(g, &mut forest, query, false);
    let mut parser = Parser::new(g);
    let root = parser.parse(&mut forest, &matches).expect("parse succeeds");
    annotate(&mut forest, g, root).expect("annotation succeeds");
    (forest, root)
}

fn find_node(g: &Grammar, forest: &Forest, symbol: &str, start: usize, size: usize) -> NodeId {
    let id = g.lookup(symbol).unwrap();
    forest
        .nodes()
        .find(|(_, nd)| nd.symbol == id && nd.start == start && nd.size == size)
        .map(|(nid, _)| nid)
        .unwrap_or_else(|| panic!("no node {symbol} {start}..{}", start + size))
}

#[test]
fn substitution_sequence_installs_replacement_text() {
    let g = demo_grammar();
    let (forest, _) = annotated_forest(&g, "my repos");
    let poss = find_node(&g, &forest, "[repos-poss]", 0, 2);
    let node = forest.node(poss);
    assert_eq!(node.subs.len(), 1);
    match &forest.sub(node.subs[0]).props {
        SubProps::Flat(f) => {
            assert_eq!(f.text.as_ref().unwrap().to_string(), "my repositories");
            assert_eq!(f.cost, 0.0);
            assert!(f.semantic.is_some(), "substitution keeps the rule semantic");
        }
        other => panic!("term sequence must flatten, got {other:?}"),
    }
}

#[test]
fn plain_sequence_merges_descendant_text() {
    let g = demo_grammar();
    let (forest, _) = annotated_forest(&g, "my pull requests");
    let noun = find_node(&g, &forest, "[pull-requests-noun]", 1, 2);
    match &forest.sub(forest.node(noun).subs[0]).props {
        SubProps::Flat(f) => {
            assert_eq!(f.text.as_ref().unwrap().to_string(), "pull requests");
            assert!(f.semantic.is_none());
        }
        other => panic!("term sequence must flatten, got {other:?}"),
    }
}

#[test]
fn pass_through_hides_descendants() {
    let g = demo_grammar();
    let (forest, _) = annotated_forest(&g, "repos of mine");
    let tail = find_node(&g, &forest, "[poss-tail]", 1, 2);
    match &forest.sub(forest.node(tail).subs[0]).props {
        SubProps::Flat(f) => {
            // "of mine" never surfaces; the rule's own text stands in
            assert_eq!(f.text.as_ref().unwrap().to_string(), "my");
            assert!(f.semantic.is_some());
        }
        other => panic!("pass-through must flatten, got {other:?}"),
    }
}

#[test]
fn every_node_carries_the_minimum_over_its_subs() {
    let g = demo_grammar();
    let (forest, _) = annotated_forest(&g, "companies with over 5 employees");
    for (_, node) in forest.nodes() {
        if node.is_leaf() {
            continue;
        }
        let node_min = node.min_cost.expect("annotated node has a min cost");
        let sub_costs: Vec<f64> = node
            .subs
            .iter()
            .map(|&s| forest.sub(s).min_cost.expect("annotated sub has a min cost"))
            .collect();
        let min = sub_costs.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!((node_min - min).abs() < 1e-9);
        for pair in sub_costs.windows(2) {
            assert!(pair[0] <= pair[1], "subs must be sorted by min cost");
        }
    }
}

fn word_props(display: &str) -> RuleProps {
    RuleProps { text: Some(TextSpec::literal(display)), ..Default::default() }
}

/// A minimal grammar with one term-sequence rule whose right descendant is
/// the interesting node: "[seq]" -> "[d-cat]" "[x-cat]".
fn sequence_grammar(configure: impl FnOnce(&mut TableBuilder)) -> Grammar {
    let mut b = TableBuilder::new();
    b.word("dd", "[d-cat]", word_props("dd"));
    b.rule(
        "[seq]",
        &["[d-cat]", "[x-cat]"],
        RuleProps { is_term_sequence: true, ..Default::default() },
    );
    b.rule("[start]", &["[seq]"], RuleProps::default());
    configure(&mut b);
    b.build("[start]").unwrap()
}

#[test]
fn deletion_only_ambiguity_under_a_term_sequence_is_legal() {
    // "[x-cat] 1..3" packs two alternatives and both pay one deletion:
    // "bb" widened back over deleted "aa", and "aa" widened forward over
    // deleted "bb" — node min 1, so flattening picks the cheapest quietly
    let g = sequence_grammar(|b| {
        b.word("aa", "[x-cat]", word_props("aa"));
        b.word("bb", "[x-cat]", word_props("bb"));
        b.deletable("aa");
        b.deletable("bb");
    });
    let engine = Engine::new(g);
    let opts = ParseOptions { costs: true, ..Default::default() };
    let reply = engine.parse("dd aa bb", &opts).unwrap();
    assert_eq!(reply.results.len(), 1);
    assert_eq!(reply.results[0].cost, Some(1.0));
}

#[test]
fn zero_cost_alternative_under_a_term_sequence_is_a_grammar_error() {
    // the bigram rule covers 1..3 at zero cost while the widened "aa"
    // covers the same span with one deletion: a deletion-free alternative
    // exists, so the ambiguity is a near-duplicate rule, not a deletion
    let g = sequence_grammar(|b| {
        b.word("aa", "[x-cat]", word_props("aa"));
        b.word("aa bb", "[x-cat]", word_props("aa bb"));
        b.deletable("bb");
    });
    let mut forest = Forest::new();
    let matches = match_terminals(&g, &mut forest, "dd aa bb", false);
    let mut parser = Parser::new(&g);
    let root = parser.parse(&mut forest, &matches).expect("parse succeeds");
    let err = annotate(&mut forest, &g, root).unwrap_err();
    assert_eq!(err.symbol, "[seq]");
}

#[test]
fn duplicate_single_word_rules_under_a_term_sequence_are_a_grammar_error() {
    // two terminal rules for the same word and category pack onto one
    // single-token node; a span of 1 can never contain a deletion
    let g = sequence_grammar(|b| {
        b.word("aa", "[x-cat]", word_props("aa"));
        b.word("aa", "[x-cat]", word_props("a"));
    });
    let engine = Engine::new(g);
    let err = engine.parse("dd aa", &ParseOptions::default()).unwrap_err();
    assert_eq!(err.symbol, "[seq]");
}

#[test]
fn flattened_sub_cost_matches_its_subtree() {
    // the widened integer under the deleted "over" carries its deletion
    // cost up through the flattened terminal forms
    let g = demo_grammar();
    let (forest, _) = annotated_forest(&g, "companies with over 5 employees");
    let clause = find_node(&g, &forest, "[emp-clause]", 2, 3);
    let node = forest.node(clause);
    let costs: Vec<f64> =
        node.subs.iter().map(|&s| forest.sub(s).min_cost.unwrap()).collect();
    assert_eq!(costs, vec![0.0, 1.0]);
}
