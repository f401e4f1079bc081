//! Tokenizer and chart-parser behavior against the bundled demo grammar.

use tomtit::builtin_grammars::demo_grammar;
use tomtit::forest::{Forest, SubProps};
use tomtit::parser::Parser;
use tomtit::tokenizer::match_terminals;

#[test]
fn literal_terminals_are_matched_by_end_position() {
    let g = demo_grammar();
    let mut forest = Forest::new();
    let matches = match_terminals(&g, &mut forest, "repos I like", false);
    assert_eq!(matches.token_count(), 3);

    let noun = g.lookup("[repositories-noun]").unwrap();
    let found = matches.ends[1]
        .iter()
        .flat_map(|tm| tm.nodes.iter())
        .any(|&n| forest.node(n).symbol == noun && forest.node(n).start == 0);
    assert!(found, "[repositories-noun] must end at boundary 1");
}

#[test]
fn multi_token_entity_matches_with_canonical_text() {
    let g = demo_grammar();
    let mut forest = Forest::new();
    let matches = match_terminals(&g, &mut forest, "Acme Corp", false);

    let cat = g.lookup("[company-cat]").unwrap();
    let node = matches.ends[2]
        .iter()
        .flat_map(|tm| tm.nodes.iter())
        .find(|&&n| forest.node(n).symbol == cat && forest.node(n).size == 2)
        .copied()
        .expect("bigram entity node");
    let sub = forest.sub(forest.node(node).subs[0]);
    match &sub.props {
        SubProps::Flat(f) => {
            assert_eq!(f.text.as_ref().unwrap().to_string(), "Acme Corp");
            assert_eq!(f.cost, 0.0);
        }
        other => panic!("entity sub must be flat, got {other:?}"),
    }
}

#[test]
fn integer_in_range_matches_out_of_range_does_not() {
    let g = demo_grammar();
    let int = g.lookup("[int]").unwrap();

    let mut forest = Forest::new();
    let matches = match_terminals(&g, &mut forest, "5", false);
    assert!(matches.ends[1]
        .iter()
        .flat_map(|tm| tm.nodes.iter())
        .any(|&n| forest.node(n).symbol == int));

    let mut forest = Forest::new();
    let matches = match_terminals(&g, &mut forest, "99999", false);
    assert!(!matches.ends[1]
        .iter()
        .flat_map(|tm| tm.nodes.iter())
        .any(|&n| forest.node(n).symbol == int));
}

#[test]
fn deletable_run_expands_backward_with_cost() {
    let g = demo_grammar();
    let mut forest = Forest::new();
    // "please" and "show" are deletable; "repos" matches at 2..3
    let matches = match_terminals(&g, &mut forest, "please show repos", false);

    let noun = g.lookup("[repositories-noun]").unwrap();
    let widened = matches.ends[3]
        .iter()
        .flat_map(|tm| tm.nodes.iter())
        .find(|&&n| {
            let nd = forest.node(n);
            nd.symbol == noun && nd.start == 0 && nd.size == 3
        })
        .copied()
        .expect("fully widened node covering both deletions");
    let sub = forest.sub(forest.node(widened).subs[0]);
    match &sub.props {
        SubProps::Rules(list) => assert_eq!(list[0].cost, 2.0),
        other => panic!("widened literal sub keeps its rule props, got {other:?}"),
    }
}

#[test]
fn trailing_deletable_run_expands_forward() {
    let g = demo_grammar();
    let mut forest = Forest::new();
    let matches = match_terminals(&g, &mut forest, "acme please", false);

    let cat = g.lookup("[company-cat]").unwrap();
    let widened = matches.ends[2]
        .iter()
        .flat_map(|tm| tm.nodes.iter())
        .find(|&&n| {
            let nd = forest.node(n);
            nd.symbol == cat && nd.start == 0 && nd.size == 2
        })
        .copied()
        .expect("entity widened over the trailing deletable");
    let sub = forest.sub(forest.node(widened).subs[0]);
    match &sub.props {
        SubProps::Flat(f) => assert_eq!(f.cost, 1.0),
        other => panic!("widened entity sub stays flat, got {other:?}"),
    }
}

#[test]
fn parse_builds_a_start_node_spanning_the_input() {
    let g = demo_grammar();
    let mut forest = Forest::new();
    let matches = match_terminals(&g, &mut forest, "repos I like", false);
    let mut parser = Parser::new(&g);
    let root = parser.parse(&mut forest, &matches).expect("parse succeeds");

    let node = forest.node(root);
    assert_eq!(node.symbol, g.start_symbol());
    assert_eq!(node.start, 0);
    assert_eq!(node.size, 3);
}

#[test]
fn ambiguous_span_packs_into_one_node() {
    let g = demo_grammar();
    let mut forest = Forest::new();
    // "[emp-clause] 2..5" derives two ways: via "over 5 employees" and via
    // "5 employees" with "over" deleted — one packed node, two subs
    let matches = match_terminals(&g, &mut forest, "companies with over 5 employees", false);
    let mut parser = Parser::new(&g);
    parser.parse(&mut forest, &matches).expect("parse succeeds");

    let clause = g.lookup("[emp-clause]").unwrap();
    let packed: Vec<_> = forest
        .nodes()
        .filter(|(_, nd)| nd.symbol == clause && nd.start == 2 && nd.size == 3)
        .collect();
    assert_eq!(packed.len(), 1, "exactly one packed node per (symbol, span)");
    assert_eq!(packed[0].1.subs.len(), 2, "both derivations attach as subs");
}

#[test]
fn unknown_token_yields_no_parse() {
    let g = demo_grammar();
    let mut forest = Forest::new();
    let matches = match_terminals(&g, &mut forest, "ppl I follow", false);
    let mut parser = Parser::new(&g);
    assert!(parser.parse(&mut forest, &matches).is_none());
}

#[test]
fn empty_query_yields_no_parse() {
    let g = demo_grammar();
    let mut forest = Forest::new();
    let matches = match_terminals(&g, &mut forest, "", false);
    let mut parser = Parser::new(&g);
    assert!(parser.parse(&mut forest, &matches).is_none());
}
