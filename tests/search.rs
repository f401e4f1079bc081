//! A* enumeration properties: ordering, dedup, determinism, admissibility,
//! bounding, and deadlines.

use tomtit::annotate::annotate;
use tomtit::builtin_grammars::demo_grammar;
use tomtit::forest::Forest;
use tomtit::parser::Parser;
use tomtit::query::{Engine, ParseOptions};
use tomtit::search::enumerate;
use tomtit::tokenizer::match_terminals;

fn options() -> ParseOptions {
    ParseOptions { semantics: true, costs: true, ..Default::default() }
}

#[test]
fn results_are_sorted_by_non_decreasing_cost() {
    let engine = Engine::new(demo_grammar());
    let reply = engine.parse("companies with over 5 employees", &options()).unwrap();
    assert!(reply.results.len() >= 2);
    let costs: Vec<f64> = reply.results.iter().map(|r| r.cost.unwrap()).collect();
    for pair in costs.windows(2) {
        assert!(pair[0] <= pair[1], "costs must be non-decreasing: {costs:?}");
    }
    assert!(costs.iter().all(|&c| c >= 0.0));
}

#[test]
fn no_two_results_share_a_semantic() {
    let engine = Engine::new(demo_grammar());
    let reply = engine.parse("companies with over 5 employees", &options()).unwrap();
    let mut seen = std::collections::HashSet::new();
    for result in &reply.results {
        assert!(
            seen.insert(result.semantic.clone().unwrap()),
            "duplicate semantic emitted: {:?}",
            result.semantic
        );
    }
}

#[test]
fn enumeration_is_deterministic() {
    let engine = Engine::new(demo_grammar());
    let collect = || {
        engine
            .parse("companies with over 5 employees", &options())
            .unwrap()
            .results
            .iter()
            .map(|r| (r.text.clone(), r.semantic.clone(), r.cost))
            .collect::<Vec<_>>()
    };
    assert_eq!(collect(), collect());
}

#[test]
fn k_bounds_the_result_count() {
    let engine = Engine::new(demo_grammar());
    let opts = ParseOptions { k: 1, ..options() };
    let reply = engine.parse("companies with over 5 employees", &opts).unwrap();
    assert_eq!(reply.results.len(), 1);
}

#[test]
fn expired_deadline_returns_partial() {
    let engine = Engine::new(demo_grammar());
    let opts = ParseOptions { deadline_ms: Some(0), ..options() };
    let reply = engine.parse("repos I like", &opts).unwrap();
    assert!(reply.partial);
    assert!(reply.results.is_empty());
}

#[test]
fn root_min_cost_is_the_top_result_cost() {
    // admissibility: the annotator's lower bound at the root is exact for
    // the cheapest completion
    let g = demo_grammar();
    let mut forest = Forest::new();
    let matches = match_terminals(&g, &mut forest, "companies with over 5 employees", false);
    let mut parser = Parser::new(&g);
    let root = parser.parse(&mut forest, &matches).unwrap();
    annotate(&mut forest, &g, root).unwrap();

    let outcome = enumerate(&forest, root, 7, None);
    assert!(!outcome.results.is_empty());
    let root_min = forest.node(root).min_cost.unwrap();
    assert!((root_min - outcome.results[0].cost).abs() < 1e-9);
}

#[test]
fn annotation_is_idempotent() {
    let g = demo_grammar();
    let mut forest = Forest::new();
    let matches = match_terminals(&g, &mut forest, "repos I like", false);
    let mut parser = Parser::new(&g);
    let root = parser.parse(&mut forest, &matches).unwrap();

    annotate(&mut forest, &g, root).unwrap();
    let snapshot: Vec<(usize, Option<f64>)> = forest
        .nodes()
        .map(|(_, nd)| (nd.subs.len(), nd.min_cost))
        .collect();

    annotate(&mut forest, &g, root).unwrap();
    let again: Vec<(usize, Option<f64>)> = forest
        .nodes()
        .map(|(_, nd)| (nd.subs.len(), nd.min_cost))
        .collect();
    assert_eq!(snapshot, again);
}

#[test]
fn insertion_alternatives_become_sibling_subs() {
    let g = demo_grammar();
    let mut forest = Forest::new();
    let matches = match_terminals(&g, &mut forest, "repos I like", false);
    let mut parser = Parser::new(&g);
    let root = parser.parse(&mut forest, &matches).unwrap();
    annotate(&mut forest, &g, root).unwrap();

    let relclause = g.lookup("[repos-relclause]").unwrap();
    let (_, node) = forest
        .nodes()
        .find(|(_, nd)| nd.symbol == relclause && nd.start == 1 && nd.size == 2)
        .expect("relative clause node");
    assert_eq!(node.subs.len(), 2, "one sub per insertion alternative");
    let first = forest.sub(node.subs[0]).min_cost.unwrap();
    let second = forest.sub(node.subs[1]).min_cost.unwrap();
    assert!(first < second, "subs sorted by min cost");
}

#[test]
fn insertion_duplicate_semantic_is_deduplicated() {
    // the "that"-restoring alternative reduces to the same semantic as the
    // verbatim parse, so only the cheaper result survives
    let engine = Engine::new(demo_grammar());
    let reply = engine.parse("repos I like", &options()).unwrap();
    assert_eq!(reply.results.len(), 1);
    assert_eq!(reply.results[0].cost, Some(0.0));
}

#[test]
fn search_trail_renders_a_tree_outline() {
    let engine = Engine::new(demo_grammar());
    let opts = ParseOptions {
        trees: true,
        tree_token_ranges: true,
        tree_node_costs: true,
        ..options()
    };
    let reply = engine.parse("repos I like", &opts).unwrap();
    let tree = reply.results[0].tree.as_ref().expect("tree outline");
    assert!(tree.contains("[start]"));
    assert!(tree.contains("[repositories]"));
    assert!(tree.contains("0..3"));
    assert!(tree.contains("\"repos\""));
}
